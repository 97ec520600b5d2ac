//! Process-wide logging setup.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize logging using the format named by `AUTOFLOW_LOG_FORMAT`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}
