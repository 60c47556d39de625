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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_provider_success_total",
            Unit::Count,
            "Provider calls that returned a fresh value during an aggregation run."
        );
        describe_counter!(
            "folio_provider_failure_total",
            Unit::Count,
            "Provider calls that timed out or panicked during an aggregation run."
        );
        describe_histogram!(
            "folio_profile_run_ms",
            Unit::Milliseconds,
            "Wall-clock duration of one profile aggregation run."
        );
        describe_counter!(
            "folio_profile_job_total",
            Unit::Count,
            "Completed profile update jobs, labelled by outcome."
        );
        describe_counter!(
            "folio_response_cache_hit_total",
            Unit::Count,
            "Public responses served from the response cache."
        );
        describe_counter!(
            "folio_response_cache_miss_total",
            Unit::Count,
            "Public responses rendered because the response cache had no entry."
        );
    });
}
