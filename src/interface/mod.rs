//! Interface layer - External interfaces
//!
//! HTTP API over the SIP configuration service.

pub mod api;
