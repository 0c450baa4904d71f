//! Prometheus metrics handler

use crate::application::metrics::{
    CONFIG_CREATED, PARTICIPANT_DISPATCH_SECONDS, PARTICIPANT_REQUESTS, VALIDATION_REJECTIONS,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DISPATCH_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0];

/// Initialize the Prometheus metrics exporter and install it as the global recorder
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(PARTICIPANT_DISPATCH_SECONDS.to_string()),
            DISPATCH_BUCKETS,
        )?
        .install_recorder()?;

    describe_counter!(CONFIG_CREATED, "SIP trunks and dispatch rules committed");
    describe_counter!(
        VALIDATION_REJECTIONS,
        "SIP configuration rejected by conflict validation"
    );
    describe_counter!(
        PARTICIPANT_REQUESTS,
        "Outbound SIP participant requests by outcome"
    );
    describe_histogram!(
        PARTICIPANT_DISPATCH_SECONDS,
        Unit::Seconds,
        "Time spent waiting for the SIP process to place a call"
    );

    Ok(handle)
}

/// HTTP metrics handler
pub async fn metrics_handler(State(prometheus_handle): State<PrometheusHandle>) -> Response {
    (StatusCode::OK, prometheus_handle.render()).into_response()
}
