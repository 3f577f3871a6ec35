//! Production logging: structured JSONL to stdout, no dev-file side effects.
//!
//! Local output stays full-fidelity (an operator attached to the process's
//! stdout needs real messages); the redaction happens at the remote-export
//! boundary in [`crate::remote`], not here.

use crate::json_layer::JsonLayer;
use crate::remote::RemoteExporter;
use crate::LogConfig;
use std::io;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Clone, Copy)]
pub struct StdoutWriterFactory;

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for StdoutWriterFactory {
    type Writer = io::Stdout;

    fn make_writer(&'a self) -> Self::Writer {
        io::stdout()
    }
}

/// Initialize the prod subscriber: JSONL on stdout plus an optional remote sink.
pub fn init_prod_subscriber(config: &LogConfig) {
    let remote_exporter = RemoteExporter::from_config(config);
    let json_layer = JsonLayer::new(
        config.service_name.clone(),
        StdoutWriterFactory,
        remote_exporter,
    );

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter))
        .init();

    tracing::info!(mode = "prod", "observability initialized");
}
