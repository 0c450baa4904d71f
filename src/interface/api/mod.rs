//! API interface implementations

pub mod dto;
pub mod error;
pub mod extract;
pub mod metrics_handler;
pub mod router;
pub mod sip_handler;

pub use dto::ApiResponse;
pub use error::ApiError;
pub use metrics_handler::init_metrics;
pub use router::build_router;
pub use sip_handler::SipApiState;
