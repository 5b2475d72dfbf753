//! Development-time tracing for the pacemaker.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Diagnostics via `RUST_LOG`, output to stderr.
//!   Fallback levels, skipped log lines and operator input errors show up here.
//!
//! - **Performance log (`io/performance_log`)**: Product artifact in
//!   `.pacemaker/performance.jsonl`. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=pacemaker=debug cargo run -- budget --profile BUG_FIX
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
