//! Identifier value objects shared by trunks, dispatch rules and calls

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Printed in place of an identifier that has not been allocated yet
pub const PLACEHOLDER_ID: &str = "<new>";

const GUID_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const GUID_SIZE: usize = 12;

/// Entity kind tag carried by every generated identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdPrefix {
    SipTrunk,
    SipDispatchRule,
    SipCall,
}

impl IdPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::SipTrunk => "ST_",
            IdPrefix::SipDispatchRule => "SDR_",
            IdPrefix::SipCall => "SCL_",
        }
    }
}

impl fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a prefixed, collision-resistant identifier.
///
/// The random part is a v4 UUID re-encoded in base57 and cut to 12 characters.
pub fn new_guid(prefix: IdPrefix) -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut id = String::with_capacity(prefix.as_str().len() + GUID_SIZE);
    id.push_str(prefix.as_str());
    for _ in 0..GUID_SIZE {
        let digit = (n % GUID_ALPHABET.len() as u128) as usize;
        n /= GUID_ALPHABET.len() as u128;
        id.push(GUID_ALPHABET[digit] as char);
    }
    id
}

/// Human-readable form of a possibly unallocated identifier
pub fn print_id(id: &str) -> &str {
    if id.is_empty() {
        PLACEHOLDER_ID
    } else {
        id
    }
}

/// Identifier allocator
#[cfg_attr(test, mockall::automock)]
pub trait IdGenerator: Send + Sync {
    fn generate(&self, prefix: IdPrefix) -> String;
}

/// Production allocator backed by [`new_guid`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GuidGenerator;

impl IdGenerator for GuidGenerator {
    fn generate(&self, prefix: IdPrefix) -> String {
        new_guid(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_guid_prefix_and_length() {
        let id = new_guid(IdPrefix::SipTrunk);
        assert!(id.starts_with("ST_"));
        assert_eq!(id.len(), 3 + GUID_SIZE);

        let id = new_guid(IdPrefix::SipDispatchRule);
        assert!(id.starts_with("SDR_"));
        assert!(id[4..].bytes().all(|b| GUID_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_guid_uniqueness() {
        let ids: HashSet<String> = (0..1000).map(|_| new_guid(IdPrefix::SipCall)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_print_id_placeholder() {
        assert_eq!(print_id(""), "<new>");
        assert_eq!(print_id("ST_abc"), "ST_abc");
    }
}
