//! Networking utilities for the Umilax mobile client
//!
//! This crate provides the HTTP client used to talk to the REST backend,
//! connectivity state tracking, and backoff arithmetic for retry schedules.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod connectivity;
pub mod retry;

pub use client::{ApiRequest, ApiResponse, HttpClient, HttpClientConfig, HttpError, HttpMethod};
pub use connectivity::{ConnectivityMonitor, NetworkState};
pub use retry::BackoffConfig;
