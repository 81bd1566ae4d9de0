use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::thumbnails;
use crate::config::{LogFormat, LoggingSettings};

use super::{error::InfraError, tryton};

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
            thumbnails::CACHE_HIT_TOTAL,
            Unit::Count,
            "Thumbnail requests answered from an existing artifact."
        );
        describe_counter!(
            thumbnails::CACHE_MISS_TOTAL,
            Unit::Count,
            "Thumbnail requests that had to render a new artifact."
        );
        describe_counter!(
            thumbnails::PLACEHOLDER_TOTAL,
            Unit::Count,
            "Thumbnail requests answered with the placeholder image."
        );
        describe_counter!(
            thumbnails::RENDER_FAILURE_TOTAL,
            Unit::Count,
            "Thumbnail renders that failed to encode or write."
        );
        describe_histogram!(
            thumbnails::RENDER_MS,
            Unit::Milliseconds,
            "Thumbnail decode, transform and write latency in milliseconds."
        );
        describe_counter!(
            tryton::CALL_TOTAL,
            Unit::Count,
            "JSON-RPC calls issued to the backend."
        );
        describe_counter!(
            tryton::CALL_ERROR_TOTAL,
            Unit::Count,
            "JSON-RPC calls that failed in transport or were rejected."
        );
    });
}
