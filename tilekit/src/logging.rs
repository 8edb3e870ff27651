//! Logging setup for the tile service.
//!
//! `RUST_LOG` selects what gets logged and `TILEKIT_LOG_FORMAT` how it is printed.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "tilekit=info,tilekit_mbtiles=info,actix_web=info";

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Full,
    Compact,
    /// Multi-line, for local debugging
    Pretty,
    /// Newline-delimited JSON
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "full" => Self::Full,
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => {
                return Err(format!(
                    "unknown log format '{s}', expected one of full, compact, pretty, json"
                ));
            }
        })
    }
}

impl LogFormat {
    /// The configured format, or the default one if it is missing or unknown.
    #[must_use]
    pub fn resolve(value: Option<&str>) -> Self {
        value
            .and_then(|v| {
                v.parse()
                    .map_err(|e| eprintln!("Warning: {e}, using the default format"))
                    .ok()
            })
            .unwrap_or_default()
    }

    fn layer(self) -> OutputLayer {
        let output = fmt::layer();
        match self {
            Self::Full => output.boxed(),
            Self::Compact => output.compact().boxed(),
            Self::Pretty => output.pretty().boxed(),
            Self::Json => output.json().boxed(),
        }
    }
}

/// Install the global subscriber and route `log` records from dependencies into it.
///
/// An invalid `filter` logs everything at `debug`.
pub fn init_tracing(filter: &str, format: Option<&str>) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Warning: log records will not be captured: {e}");
    }

    let filter = EnvFilter::from_str(filter).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log filter '{filter}' ({e}), using debug");
        EnvFilter::new("debug")
    });
    let output = LogFormat::resolve(format).layer().with_filter(filter);

    if let Err(e) = Registry::default().with(output).try_init() {
        eprintln!("Warning: logging was already initialized: {e}");
    }
}
