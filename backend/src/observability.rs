//! Structured logging setup.
//!
//! Nothing here talks to an external trace collector, so this stays plain
//! `tracing` + `tracing-subscriber` rather than wiring an OTLP exporter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
