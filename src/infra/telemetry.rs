use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
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
            "docbatch_rows_processed_total",
            Unit::Count,
            "Dataset rows rendered, labelled by job kind."
        );
        describe_counter!(
            "docbatch_conversion_failures_total",
            Unit::Count,
            "Documents no conversion backend could convert."
        );
        describe_histogram!(
            "docbatch_conversion_ms",
            Unit::Milliseconds,
            "Per-backend conversion latency in milliseconds."
        );
        describe_counter!(
            "docbatch_emails_sent_total",
            Unit::Count,
            "Messages accepted by the mail transport."
        );
        describe_counter!(
            "docbatch_emails_failed_total",
            Unit::Count,
            "Messages the mail transport rejected or could not send."
        );
        describe_counter!(
            "docbatch_jobs_evicted_total",
            Unit::Count,
            "Jobs discarded after the idle TTL."
        );
        describe_gauge!(
            "docbatch_jobs_active",
            Unit::Count,
            "Jobs currently running or paused."
        );
    });
}
