//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize logging from the environment (`RUST_LOG`, `LOG_FORMAT`).
///
/// Safe to call multiple times; later calls are no-ops. An unknown
/// `LOG_FORMAT` falls back to JSON with a warning.
pub fn init() {
    match LogFormat::from_env() {
        Ok(format) => {
            crate::tracing::init(format);
        }
        Err(raw) => {
            crate::tracing::init(LogFormat::default());
            ::tracing::warn!(value = %raw, "unknown LOG_FORMAT, expected json or pretty; using json");
        }
    }
}
