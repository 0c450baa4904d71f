//! Shared kernel - errors and identifiers used across the SIP configuration contexts

pub mod error;
pub mod value_objects;

pub use error::{DomainError, Result};
pub use value_objects::*;
