use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Level used when `RUST_LOG` is unset or invalid.
const DEFAULT_DIRECTIVE: &str = "info";

/// Local logging for the command line tool.
pub struct Telemetry {
    filter: EnvFilter,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    /// Reads the filter from `RUST_LOG`, falling back to `info`.
    pub fn new() -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
        Self { filter }
    }

    /// Installs a global fmt subscriber writing to stderr, leaving stdout to command output.
    pub fn register(self) {
        tracing_subscriber::registry()
            .with(self.filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
