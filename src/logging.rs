//! Logging setup.
use tracing_subscriber::EnvFilter;

/// Sets up logging of the events reported by the engine.
///
/// Use the RUST_LOG environment variable to override the defaults.
///
/// E.g. to enable debug level logging:
///   RUST_LOG=DEBUG
///
/// Or to log only the steps of record writes:
///   RUST_LOG=zonesync::sync=TRACE
///
/// Calling this more than once has no effect.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}
