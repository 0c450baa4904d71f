//! RPC clients for the SIP call process

pub mod sip_client;

pub use sip_client::JsonRpcSipClient;
