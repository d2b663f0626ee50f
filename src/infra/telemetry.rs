use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quay_fetch_total",
            Unit::Count,
            "Routed requests by outcome (declined, cached, network, substitute)."
        );
        describe_counter!(
            "quay_cache_write_failed_total",
            Unit::Count,
            "Opportunistic cache writes that failed after a network hit."
        );
        describe_counter!(
            "quay_precache_failed_total",
            Unit::Count,
            "Install-time precache populations that failed."
        );
        describe_counter!(
            "quay_generations_deleted_total",
            Unit::Count,
            "Stale generations removed by activation sweeps."
        );
        describe_counter!(
            "quay_purge_total",
            Unit::Count,
            "Remote purges by result (purged, failed)."
        );
        describe_counter!(
            "quay_client_messages_total",
            Unit::Count,
            "Control-channel messages delivered to clients."
        );
        describe_histogram!(
            "quay_install_ms",
            Unit::Milliseconds,
            "Install latency in milliseconds, including precache population."
        );
    });
}
