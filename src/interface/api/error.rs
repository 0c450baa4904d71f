//! Mapping of domain errors to HTTP responses

use super::dto::ApiResponse;
use crate::domain::shared::DomainError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Handler error: a domain error rendered as an `ApiResponse`
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::Unauthorized(e) if e.is_forbidden() => StatusCode::FORBIDDEN,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DomainError::RemoteCall(_) => StatusCode::BAD_GATEWAY,
            DomainError::RemoteTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DomainError::Storage(_) | DomainError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()>::error(self.0.to_string());
        (status, Json(body)).into_response()
    }
}
