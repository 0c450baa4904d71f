//! Request/response types for the HTTP API

use serde::{Deserialize, Serialize};

/// Envelope for every API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Query parameters for listing dispatch rules
#[derive(Debug, Default, Deserialize)]
pub struct ListDispatchRulesQuery {
    /// Only rules that apply to this trunk
    pub trunk_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub sip_configured: bool,
}
