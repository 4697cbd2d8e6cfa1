//! Storage layer for the Umilax mobile client
//!
//! This crate provides the durable key-value store that backs the offline
//! mutation queue, and the credential store capability used for bearer and
//! refresh tokens.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod credentials;
pub mod kv;

pub use credentials::{CredentialError, CredentialStore, KvCredentialStore};
pub use kv::{KvConfig, KvError, KvStore};
