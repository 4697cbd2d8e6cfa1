//! Umilax mobile client core
//!
//! Re-exports the workspace crates and wires up logging for host apps.

pub use networking;
pub use offline_queue;
pub use storage;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes priority; `default_filter` (e.g. `"offline_queue=debug"`)
/// applies when it is unset. Calling this more than once is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
