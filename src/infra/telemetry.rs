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
            "spacetraveling_content_requests_total",
            Unit::Count,
            "Total number of requests sent to the content source."
        );
        describe_counter!(
            "spacetraveling_content_failures_total",
            Unit::Count,
            "Total number of content source requests that failed."
        );
        describe_histogram!(
            "spacetraveling_content_request_ms",
            Unit::Milliseconds,
            "Content source request latency in milliseconds."
        );
        describe_counter!(
            "spacetraveling_pagination_loads_total",
            Unit::Count,
            "Total number of pages appended to a post listing."
        );
        describe_counter!(
            "spacetraveling_prerender_hits_total",
            Unit::Count,
            "Total number of post pages served from the prerendered set."
        );
        describe_counter!(
            "spacetraveling_prerender_misses_total",
            Unit::Count,
            "Total number of post pages rendered on first request."
        );
    });
}
