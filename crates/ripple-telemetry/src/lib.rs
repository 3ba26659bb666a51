//! Tracing/logging initialization. Call once at startup.

use tracing_subscriber::EnvFilter;

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log filter. Overridden by RUST_LOG env var.
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls are no-ops (the first subscriber wins).
pub fn init(config: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_target(true)
            .with_env_filter(env_filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_env_filter(env_filter)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_info() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json);
    }

    #[test]
    fn init_is_idempotent() {
        let config = TelemetryConfig::default();
        init(&config);
        init(&config);
        tracing::info!("still alive after double init");
    }
}
