//! Process-wide logging setup for catalog binaries.

/// Initialize process-wide tracing.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Subscriber construction (filter, output format).
pub mod tracing;
