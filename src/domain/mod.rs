//! Domain layer - Core business logic and rules
//!
//! This layer contains:
//! - Value objects for trunks, dispatch rules and outbound calls
//! - The conflict validators
//! - Ports for persistence, permissions and the SIP call peer

pub mod auth;
pub mod context;
pub mod dispatch_rule;
pub mod participant;
pub mod shared;
pub mod sip_store;
pub mod sip_trunk;
pub mod validation;

// Re-export commonly used types
pub use shared::{DomainError, Result};
