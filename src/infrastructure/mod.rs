//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - SipStore implementations (in-memory, PostgreSQL)
//! - The JSON-RPC client for the SIP call process

pub mod persistence;
pub mod rpc;
