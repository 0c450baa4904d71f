//! Metric recording for SIP configuration and call requests

use metrics::{counter, histogram};
use std::time::Duration;

pub const CONFIG_CREATED: &str = "sip_config_created_total";
pub const VALIDATION_REJECTIONS: &str = "sip_validation_rejections_total";
pub const PARTICIPANT_REQUESTS: &str = "sip_participant_requests_total";
pub const PARTICIPANT_DISPATCH_SECONDS: &str = "sip_participant_dispatch_seconds";

/// Record a committed trunk or dispatch rule
pub fn record_config_created(kind: &'static str) {
    counter!(CONFIG_CREATED, "kind" => kind).increment(1);
}

/// Record a candidate rejected by validation
pub fn record_validation_rejection(kind: &'static str) {
    counter!(VALIDATION_REJECTIONS, "kind" => kind).increment(1);
}

/// Record the outcome of a forwarded participant request
pub fn record_participant_request(outcome: &'static str, duration: Duration) {
    counter!(PARTICIPANT_REQUESTS, "outcome" => outcome).increment(1);
    histogram!(PARTICIPANT_DISPATCH_SECONDS).record(duration.as_secs_f64());
}
