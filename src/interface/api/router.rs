//! API Router configuration

use super::metrics_handler::metrics_handler;
use super::sip_handler::{
    create_sip_dispatch_rule, create_sip_inbound_trunk, create_sip_outbound_trunk,
    create_sip_participant, create_sip_trunk, delete_sip_dispatch_rule, delete_sip_trunk,
    get_sip_inbound_trunk, get_sip_outbound_trunk, health_check, list_sip_dispatch_rule,
    list_sip_inbound_trunk, list_sip_outbound_trunk, list_sip_trunk, SipApiState,
};
use axum::{
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: SipApiState, prometheus_handle: PrometheusHandle) -> Router {
    // Health check route (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    // Trunk routes
    let trunk_routes = Router::new()
        .route("/sip/trunks", post(create_sip_trunk).get(list_sip_trunk))
        .route("/sip/trunks/:id", delete(delete_sip_trunk))
        .route(
            "/sip/trunks/inbound",
            post(create_sip_inbound_trunk).get(list_sip_inbound_trunk),
        )
        .route("/sip/trunks/inbound/:id", get(get_sip_inbound_trunk))
        .route(
            "/sip/trunks/outbound",
            post(create_sip_outbound_trunk).get(list_sip_outbound_trunk),
        )
        .route("/sip/trunks/outbound/:id", get(get_sip_outbound_trunk));

    // Dispatch rule routes
    let rule_routes = Router::new()
        .route(
            "/sip/dispatch-rules",
            post(create_sip_dispatch_rule).get(list_sip_dispatch_rule),
        )
        .route("/sip/dispatch-rules/:id", delete(delete_sip_dispatch_rule));

    // Outbound call routes
    let participant_routes = Router::new().route("/sip/participants", post(create_sip_participant));

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    Router::new()
        .merge(health_routes)
        .merge(trunk_routes)
        .merge(rule_routes)
        .merge(participant_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
