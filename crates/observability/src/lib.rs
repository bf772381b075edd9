//! Tracing/logging setup shared by the binaries.

/// Initialize process-wide logging from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init_with(&LogSettings::from_env());
}

pub use self::tracing::{LogFormat, LogSettings, init_with};

/// Subscriber configuration (filter, output format).
pub mod tracing;
