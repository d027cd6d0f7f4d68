use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, filter::LevelFilter, fmt,
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
        .with_default_directive(LevelFilter::from(logging.level).into())
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
            "pressroom_cache_hit_total",
            Unit::Count,
            "Total number of response-cache hits."
        );
        describe_counter!(
            "pressroom_cache_miss_total",
            Unit::Count,
            "Total number of response-cache misses."
        );
        describe_counter!(
            "pressroom_cache_revalidate_total",
            Unit::Count,
            "Total number of stale entries refreshed after a source check."
        );
        describe_counter!(
            "pressroom_cache_expire_total",
            Unit::Count,
            "Total number of entries dropped as stale."
        );
        describe_counter!(
            "pressroom_cache_evict_total",
            Unit::Count,
            "Total number of entries evicted for capacity."
        );
        describe_counter!(
            "pressroom_cache_invalidate_total",
            Unit::Count,
            "Total number of entries removed by tag invalidation."
        );
        describe_counter!(
            "pressroom_dispatch_handled_total",
            Unit::Count,
            "Requests answered by the site dispatcher, by handler."
        );
        describe_counter!(
            "pressroom_dispatch_unhandled_total",
            Unit::Count,
            "Requests no site handler claimed."
        );
    });
}
