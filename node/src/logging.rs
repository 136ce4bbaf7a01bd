//! # Structured Logging
//!
//! `tracing` subscriber setup for the node. Engine crates only emit
//! events; the choice of format and filtering lives here, at the binary
//! boundary.
//!
//! Output goes to stderr — stdout is reserved for subcommand output like
//! `atrium-node version`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format, selected by `--log-format` / `ATRIUM_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local runs.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitively. Anything that is not
    /// `json` falls back to `Pretty` rather than failing startup over a
    /// cosmetic flag.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Installs the global subscriber. Call once from `main`; a second call
/// panics, which is the bug we want to hear about.
///
/// `default_filter` applies when `RUST_LOG` is unset; when set, `RUST_LOG`
/// wins, using the usual `EnvFilter` directive syntax
/// (`atrium_node=debug,atrium_engine=info,...`).
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}
