//! sipdesk - SIP trunk and dispatch rule administration
//!
//! Validates SIP configuration against what is already stored before committing it,
//! and forwards outbound call requests to the SIP process.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::Result;
