//! SIP trunk, dispatch rule and participant API handlers

use super::dto::{ApiResponse, HealthResponse, ListDispatchRulesQuery};
use super::error::ApiError;
use super::extract::ApiContext;
use crate::application::SipService;
use crate::domain::auth::ApiKeyAuthenticator;
use crate::domain::dispatch_rule::{CreateSipDispatchRuleRequest, SipDispatchRuleInfo};
use crate::domain::participant::{
    CreateSipParticipantRequest, ParticipantRequestOptions, SipParticipantInfo,
};
use crate::domain::sip_trunk::{
    CreateSipInboundTrunkRequest, CreateSipOutboundTrunkRequest, CreateSipTrunkRequest,
    SipInboundTrunkInfo, SipOutboundTrunkInfo, SipTrunkInfo,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

/// Application state
#[derive(Clone)]
pub struct SipApiState {
    pub service: Arc<SipService>,
    pub authenticator: Arc<ApiKeyAuthenticator>,
    /// Node-level fields added to every outbound call request
    pub participant_options: ParticipantRequestOptions,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type ApiCreated<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn created<T>(data: T) -> ApiCreated<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Health check endpoint
pub async fn health_check(State(state): State<SipApiState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        sip_configured: state.service.is_configured(),
    }))
}

/// Create a legacy combined trunk
pub async fn create_sip_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Json(req): Json<CreateSipTrunkRequest>,
) -> ApiCreated<SipTrunkInfo> {
    info!("API: Creating SIP trunk {:?}", req.name);
    created(state.service.create_sip_trunk(&ctx, req).await?)
}

pub async fn list_sip_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
) -> ApiResult<Vec<SipTrunkInfo>> {
    ok(state.service.list_sip_trunk(&ctx).await?)
}

pub async fn create_sip_inbound_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Json(req): Json<CreateSipInboundTrunkRequest>,
) -> ApiCreated<SipInboundTrunkInfo> {
    info!("API: Creating inbound SIP trunk");
    created(state.service.create_sip_inbound_trunk(&ctx, req).await?)
}

pub async fn list_sip_inbound_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
) -> ApiResult<Vec<SipInboundTrunkInfo>> {
    ok(state.service.list_sip_inbound_trunk(&ctx).await?)
}

pub async fn get_sip_inbound_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Path(id): Path<String>,
) -> ApiResult<SipInboundTrunkInfo> {
    ok(state.service.get_sip_inbound_trunk(&ctx, &id).await?)
}

pub async fn create_sip_outbound_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Json(req): Json<CreateSipOutboundTrunkRequest>,
) -> ApiCreated<SipOutboundTrunkInfo> {
    info!("API: Creating outbound SIP trunk");
    created(state.service.create_sip_outbound_trunk(&ctx, req).await?)
}

pub async fn list_sip_outbound_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
) -> ApiResult<Vec<SipOutboundTrunkInfo>> {
    ok(state.service.list_sip_outbound_trunk(&ctx).await?)
}

pub async fn get_sip_outbound_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Path(id): Path<String>,
) -> ApiResult<SipOutboundTrunkInfo> {
    ok(state.service.get_sip_outbound_trunk(&ctx, &id).await?)
}

/// Delete a trunk of any kind
pub async fn delete_sip_trunk(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Path(id): Path<String>,
) -> ApiResult<SipTrunkInfo> {
    info!("API: Deleting SIP trunk {}", id);
    ok(state.service.delete_sip_trunk(&ctx, &id).await?)
}

pub async fn create_sip_dispatch_rule(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Json(req): Json<CreateSipDispatchRuleRequest>,
) -> ApiCreated<SipDispatchRuleInfo> {
    info!("API: Creating SIP dispatch rule");
    created(state.service.create_sip_dispatch_rule(&ctx, req).await?)
}

/// List dispatch rules, optionally for one trunk (`?trunk_id=`)
pub async fn list_sip_dispatch_rule(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Query(query): Query<ListDispatchRulesQuery>,
) -> ApiResult<Vec<SipDispatchRuleInfo>> {
    ok(state
        .service
        .list_sip_dispatch_rule(&ctx, query.trunk_id.as_deref())
        .await?)
}

pub async fn delete_sip_dispatch_rule(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Path(id): Path<String>,
) -> ApiResult<SipDispatchRuleInfo> {
    info!("API: Deleting SIP dispatch rule {}", id);
    ok(state.service.delete_sip_dispatch_rule(&ctx, &id).await?)
}

/// Dial out and bring the callee into a room
pub async fn create_sip_participant(
    State(state): State<SipApiState>,
    ApiContext(ctx): ApiContext,
    Json(req): Json<CreateSipParticipantRequest>,
) -> ApiCreated<SipParticipantInfo> {
    info!(
        "API: Creating SIP participant in room {:?} via trunk {}",
        req.room_name, req.sip_trunk_id
    );
    let mut opts = state.participant_options.clone();
    if let Some(auth) = ctx.auth() {
        if opts.project_id.is_empty() {
            opts.project_id = auth.subject.clone();
        }
    }
    created(state.service.create_sip_participant(&ctx, req, &opts).await?)
}
