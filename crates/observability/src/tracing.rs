//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Output settings; `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub level: String,
    /// JSON lines when true, human-readable multi-line output otherwise.
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl LogOptions {
    pub fn new(level: impl Into<String>, json: bool) -> Self {
        Self {
            level: level.into(),
            json,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.level.trim()))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize tracing/logging for the process.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case the call has no effect.
pub fn init(options: &LogOptions) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(options.filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let installed = if options.json {
        builder.json().try_init()
    } else {
        builder.pretty().try_init()
    };
    installed.is_ok()
}
