//! Application layer - Use cases and application services
//!
//! Orchestrates the domain validators, the configuration store and the SIP call peer.

pub mod log_context;
pub mod metrics;
pub mod sip_service;

pub use sip_service::{SipService, DEFAULT_PARTICIPANT_TIMEOUT};
