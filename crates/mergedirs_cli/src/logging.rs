//! Logging setup for the `mergedirs` binary.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding an `EnvFilter` directive that overrides the
/// level picked from `--verbose`.
pub const C_LOG_ENV: &str = "MERGEDIRS_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EnumLogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

fn default_directive(if_verbose: bool) -> String {
    let level = if if_verbose { "debug" } else { "info" };
    format!("mergedirs_io_fs={level},mergedirs_cli={level}")
}

/// Install the global subscriber writing to stderr.
pub fn init_logging(if_verbose: bool, log_format: EnumLogFormat) {
    let filter = EnvFilter::try_from_env(C_LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(if_verbose)));

    match log_format {
        EnumLogFormat::Json => {
            let layer = fmt::layer().with_writer(std::io::stderr).json();
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
        EnumLogFormat::Text => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false)
                .compact();
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::default_directive;

    #[test]
    fn verbose_raises_level_for_both_crates() {
        assert_eq!(
            default_directive(false),
            "mergedirs_io_fs=info,mergedirs_cli=info"
        );
        assert!(default_directive(true).contains("mergedirs_io_fs=debug"));
    }
}
