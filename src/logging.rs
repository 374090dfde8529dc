use crate::Result;
use crate::config::LoggingSettings;
use anyhow::anyhow;
use std::io;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if settings.json {
        let json_layer = fmt::layer()
            .with_target(true)
            .with_writer(io::stderr)
            .json()
            .flatten_event(true)
            .with_current_span(true);

        Registry::default()
            .with(env_filter)
            .with(json_layer)
            .try_init()
    } else {
        let compact_layer = fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
            .compact();

        Registry::default()
            .with(env_filter)
            .with(compact_layer)
            .try_init()
    };

    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e).into())
}
