//! # Observability
//!
//! Centralized tracing/logging layer for the control-plane workspace.
//!
//! ## Design Philosophy
//!
//! Services are **log producers**, not log consumers or streamers. They call
//! `observability::init_with_config()` once at startup and use standard `tracing`
//! macros throughout their code. They have zero knowledge of:
//!
//! - Where logs go (file, stdout, network)
//! - Who consumes logs (CLI tools, dashboards, aggregators)
//! - How logs are streamed (pull via tail, push via network)
//!
//! ## Dev mode
//!
//! Writes structured JSONL to a single central file (`<state-dir>/logs/dev.jsonl`),
//! human-readable and unredacted. Good for `tail -f | jq` during local development.
//!
//! ## Prod mode
//!
//! Writes structured JSONL to stdout, metadata-only: message bodies and free-form
//! fields are hashed or dropped before they leave the process (see [`remote`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "control-plane".into(),
//!         mode: observability::ObservabilityMode::ProdMetadataOnly,
//!         ..Default::default()
//!     });
//!     tracing::info!("control plane started");
//! }
//! ```

mod dev;
mod json_layer;
mod prod;
mod remote;

use std::path::PathBuf;

/// Which subscriber topology to install.
///
/// `DevVerbose` favors local inspectability (full messages, unredacted fields,
/// optional stderr mirror). `ProdMetadataOnly` favors safe, low-cardinality
/// output suitable for a shared log aggregator: message bodies and free-form
/// fields are hashed or stripped before anything leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservabilityMode {
    DevVerbose,
    ProdMetadataOnly,
}

/// Per-level sampling rates applied before a log entry is handed to a remote sink.
/// Rates are clamped to `[0.0, 1.0]`; `1.0` means "always export".
///
/// Sampling only governs the PostHog/Sentry export path (`remote::RemoteExporter`);
/// it never drops lines from the local JSONL/stdout stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub debug_rate: f64,
    pub info_rate: f64,
    pub warn_rate: f64,
    pub error_rate: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            debug_rate: 0.0,
            info_rate: 1.0,
            warn_rate: 1.0,
            error_rate: 1.0,
        }
    }
}

/// PostHog product-analytics sink configuration. Absent ⇒ no PostHog export.
#[derive(Debug, Clone)]
pub struct PosthogConfig {
    pub api_key: String,
    /// Defaults to the US PostHog cloud ingestion host when empty.
    pub host: String,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub flush_interval_ms: u64,
}

/// Sentry error-reporting sink configuration. Absent ⇒ no Sentry export.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: String,
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "control-plane", "disconnect-worker").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path. Only consulted in dev mode; defaults to
    /// `<state-dir>/logs/dev.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback. Dev mode only.
    pub also_stderr: bool,

    /// Dev vs. prod subscriber topology.
    pub mode: ObservabilityMode,

    /// Deployment environment tag attached to remote-exported events
    /// (e.g. "development", "staging", "production").
    pub environment: String,

    /// Per-level export sampling.
    pub sampling: SamplingConfig,

    /// Optional PostHog sink.
    pub posthog: Option<PosthogConfig>,

    /// Optional Sentry sink.
    pub sentry: Option<SentryConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
            mode: ObservabilityMode::DevVerbose,
            environment: "development".into(),
            sampling: SamplingConfig::default(),
            posthog: None,
            sentry: None,
        }
    }
}

/// Initialize the observability layer with default (dev) settings.
///
/// # Panics
///
/// Panics if the log file cannot be created or opened (dev mode only).
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the observability layer with custom configuration.
///
/// Installs a dev or prod subscriber depending on `config.mode`, and — if
/// `posthog` or `sentry` are configured — a background remote-export sink.
pub fn init_with_config(config: LogConfig) {
    match config.mode {
        ObservabilityMode::DevVerbose => dev::init_dev_subscriber(&config),
        ObservabilityMode::ProdMetadataOnly => prod::init_prod_subscriber(&config),
    }
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export the span macro for structured context.
pub use tracing::span;

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
        assert_eq!(config.mode, ObservabilityMode::DevVerbose);
    }

    #[test]
    fn test_sampling_default_favors_info_and_above() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.debug_rate, 0.0);
        assert_eq!(sampling.info_rate, 1.0);
        assert_eq!(sampling.error_rate, 1.0);
    }
}
