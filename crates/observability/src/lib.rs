//! Tracing and logging setup shared by every warden binary.

/// Initialize process-wide tracing with JSON output at `info`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::LogOptions::default());
}

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use self::tracing::{LogOptions, init as init_with};
