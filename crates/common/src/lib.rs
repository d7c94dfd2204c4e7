//! Shared utilities: logging setup, settings and retry policies.

mod retry;
mod settings;

pub use retry::{RetryDelay, RetryPolicy};
pub use settings::{ParseSettingError, Settings};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` (e.g. `RUST_LOG=order_engine=debug`), defaulting to `info`.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
