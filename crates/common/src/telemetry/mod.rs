//! Tracing setup for embedding applications
//!
//! The core itself only emits `tracing` events; an application embedding it
//! calls `init_tracing` once to install a subscriber configured from
//! `ObservabilityConfig`.

use crate::config::ObservabilityConfig;
use tracing_subscriber::EnvFilter;

/// Install a global tracing subscriber.
///
/// Honors `RUST_LOG` when set, otherwise the configured log level. Safe to
/// call more than once; later calls are no-ops.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json_logging {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_ok() {
        tracing::info!(
            service = %config.service_name,
            "Tracing initialized"
        );
    }
}
