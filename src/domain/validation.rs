//! Conflict detection for inbound trunks and dispatch rules.
//!
//! Both validators take the complete collection (existing entries plus the candidate) and
//! check it as a whole. They are pure: the verdict does not depend on input order, and the
//! reported pair is the first one found scanning in input order, so repeated calls with the
//! same input fail identically. Every create re-scans the whole collection, which is O(n²)
//! pairs for trunks. That is fine for the expected tens to hundreds of entries.

use crate::domain::dispatch_rule::{SipDispatchRule, SipDispatchRuleInfo};
use crate::domain::shared::print_id;
use crate::domain::sip_trunk::SipInboundTrunkInfo;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use thiserror::Error;

/// Matches any number or address
pub const WILDCARD: &str = "*";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `number` is a called number both trunks accept, when they are not both unrestricted
    #[error("Conflicting inbound SIP trunks: \"{first}\" and \"{second}\"{}", shared_number(.number))]
    ConflictingTrunks {
        first: String,
        second: String,
        number: Option<String>,
    },

    #[error("Conflicting SIP dispatch rules: same trunk+number+PIN combination for \"{first}\" and \"{second}\"")]
    ConflictingDispatchRules { first: String, second: String },

    #[error("Trunks with inbound_numbers_regex are deprecated. Use inbound_numbers instead.")]
    DeprecatedNumbersRegex,

    #[error("SIP dispatch rule \"{0}\" has no rule")]
    MissingRule(String),

    #[error("SIP dispatch rule \"{0}\" must name a room")]
    MissingRoomName(String),
}

fn shared_number(number: &Option<String>) -> String {
    match number {
        Some(number) => format!(" (number \"{}\")", number),
        None => String::new(),
    }
}

impl ValidationError {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ValidationError::ConflictingTrunks { .. }
                | ValidationError::ConflictingDispatchRules { .. }
        )
    }
}

/// Normalize a phone number for comparison.
///
/// Formatting characters are dropped and purely numeric values get a leading `+`.
/// Non-numeric values (SIP user parts) are kept as-is apart from formatting.
pub fn normalize_number(number: &str) -> String {
    let cleaned: String = number
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '(' | ')'))
        .collect();
    if !cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_digit()) {
        format!("+{}", cleaned)
    } else {
        cleaned
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NumberScope {
    Any,
    Only(BTreeSet<String>),
}

impl NumberScope {
    fn from_list(numbers: &[String]) -> Self {
        let mut set = BTreeSet::new();
        for number in numbers {
            let number = number.trim();
            if number == WILDCARD {
                return NumberScope::Any;
            }
            let number = normalize_number(number);
            if !number.is_empty() {
                set.insert(number);
            }
        }
        if set.is_empty() {
            NumberScope::Any
        } else {
            NumberScope::Only(set)
        }
    }

    fn overlaps(&self, other: &NumberScope) -> bool {
        match (self, other) {
            (NumberScope::Any, _) | (_, NumberScope::Any) => true,
            (NumberScope::Only(a), NumberScope::Only(b)) => !a.is_disjoint(b),
        }
    }

    /// Lowest number accepted by both scopes. `None` when both accept anything.
    fn shared(&self, other: &NumberScope) -> Option<String> {
        match (self, other) {
            (NumberScope::Any, NumberScope::Any) => None,
            (NumberScope::Any, NumberScope::Only(set))
            | (NumberScope::Only(set), NumberScope::Any) => set.first().cloned(),
            (NumberScope::Only(a), NumberScope::Only(b)) => a.intersection(b).next().cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AddressMatcher {
    Net { addr: IpAddr, prefix: u8 },
    Host(String),
}

impl AddressMatcher {
    /// `None` for the wildcard
    fn parse(address: &str) -> Option<Self> {
        let address = address.trim();
        if address.is_empty() || address == WILDCARD {
            return None;
        }
        if let Some((ip, prefix)) = address.split_once('/') {
            if let (Ok(addr), Ok(prefix)) = (ip.parse::<IpAddr>(), prefix.parse::<u8>()) {
                if prefix <= max_prefix(&addr) {
                    return Some(AddressMatcher::Net { addr, prefix });
                }
            }
        } else if let Ok(addr) = address.parse::<IpAddr>() {
            let prefix = max_prefix(&addr);
            return Some(AddressMatcher::Net { addr, prefix });
        }
        Some(AddressMatcher::Host(address.to_ascii_lowercase()))
    }

    fn overlaps(&self, other: &AddressMatcher) -> bool {
        match (self, other) {
            (AddressMatcher::Host(a), AddressMatcher::Host(b)) => a == b,
            (
                AddressMatcher::Net { addr: a, prefix: pa },
                AddressMatcher::Net { addr: b, prefix: pb },
            ) => nets_overlap(*a, *b, (*pa).min(*pb)),
            _ => false,
        }
    }
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Two networks overlap iff they agree on the shorter of their prefixes
fn nets_overlap(a: IpAddr, b: IpAddr, prefix: u8) -> bool {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            u32::from(a) & mask == u32::from(b) & mask
        }
        (IpAddr::V6(a), IpAddr::V6(b)) => {
            let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
            u128::from(a) & mask == u128::from(b) & mask
        }
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AddressScope {
    Any,
    Only(Vec<AddressMatcher>),
}

impl AddressScope {
    fn from_list(addresses: &[String]) -> Self {
        let mut matchers = Vec::with_capacity(addresses.len());
        for address in addresses {
            match AddressMatcher::parse(address) {
                Some(matcher) => matchers.push(matcher),
                None if address.trim() == WILDCARD => return AddressScope::Any,
                None => {}
            }
        }
        if matchers.is_empty() {
            AddressScope::Any
        } else {
            AddressScope::Only(matchers)
        }
    }

    fn overlaps(&self, other: &AddressScope) -> bool {
        match (self, other) {
            (AddressScope::Any, _) | (_, AddressScope::Any) => true,
            (AddressScope::Only(a), AddressScope::Only(b)) => {
                a.iter().any(|x| b.iter().any(|y| x.overlaps(y)))
            }
        }
    }
}

/// Routing scope of one inbound trunk
#[derive(Debug, Clone)]
struct TrunkScope {
    numbers: NumberScope,
    addresses: AddressScope,
    callers: NumberScope,
}

impl TrunkScope {
    fn of(trunk: &SipInboundTrunkInfo) -> Self {
        Self {
            numbers: NumberScope::from_list(&trunk.numbers),
            addresses: AddressScope::from_list(&trunk.allowed_addresses),
            callers: NumberScope::from_list(&trunk.allowed_numbers),
        }
    }

    /// An inbound call could match both trunks
    fn overlaps(&self, other: &TrunkScope) -> bool {
        self.numbers.overlaps(&other.numbers)
            && self.addresses.overlaps(&other.addresses)
            && self.callers.overlaps(&other.callers)
    }
}

/// Check that no inbound call could be matched by two different trunks.
pub fn validate_trunks(trunks: &[SipInboundTrunkInfo]) -> Result<(), ValidationError> {
    if trunks.iter().any(|t| !t.numbers_regex.is_empty()) {
        return Err(ValidationError::DeprecatedNumbersRegex);
    }

    let scopes: Vec<TrunkScope> = trunks.iter().map(TrunkScope::of).collect();
    for (i, a) in scopes.iter().enumerate() {
        for (j, b) in scopes.iter().enumerate().skip(i + 1) {
            if a.overlaps(b) {
                return Err(ValidationError::ConflictingTrunks {
                    first: print_id(&trunks[i].sip_trunk_id).to_string(),
                    second: print_id(&trunks[j].sip_trunk_id).to_string(),
                    number: a.numbers.shared(&b.numbers),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DispatchKey<'a> {
    pin: &'a str,
    trunk: &'a str,
    number: String,
}

/// Check that no (trunk, number, PIN) combination is claimed by two dispatch rules.
///
/// A rule with no trunks (or no numbers) is a default for all of them. Dispatch prefers
/// specific rules over defaults, so a default only collides with another default.
pub fn validate_dispatch_rules(rules: &[SipDispatchRuleInfo]) -> Result<(), ValidationError> {
    let mut by_key: HashMap<DispatchKey<'_>, usize> = HashMap::new();
    for (i, info) in rules.iter().enumerate() {
        let id = print_id(&info.sip_dispatch_rule_id);
        let rule = info
            .rule
            .as_ref()
            .ok_or_else(|| ValidationError::MissingRule(id.to_string()))?;
        if let SipDispatchRule::Direct { room_name, .. } = rule {
            if room_name.trim().is_empty() {
                return Err(ValidationError::MissingRoomName(id.to_string()));
            }
        }

        let mut trunks: BTreeSet<&str> = info
            .trunk_ids
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if trunks.is_empty() {
            trunks.insert("");
        }
        let mut numbers: BTreeSet<String> = info
            .inbound_numbers
            .iter()
            .map(|n| n.trim())
            .filter(|n| *n != WILDCARD)
            .map(normalize_number)
            .filter(|n| !n.is_empty())
            .collect();
        if numbers.is_empty() {
            numbers.insert(String::new());
        }

        let pin = rule.pin().trim();
        for &trunk in &trunks {
            for number in &numbers {
                let key = DispatchKey {
                    pin,
                    trunk,
                    number: number.clone(),
                };
                if let Some(&prev) = by_key.get(&key) {
                    return Err(ValidationError::ConflictingDispatchRules {
                        first: print_id(&rules[prev].sip_dispatch_rule_id).to_string(),
                        second: id.to_string(),
                    });
                }
                by_key.insert(key, i);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(id: &str) -> SipInboundTrunkInfo {
        SipInboundTrunkInfo {
            sip_trunk_id: id.to_string(),
            ..Default::default()
        }
    }

    fn direct(id: &str, room: &str) -> SipDispatchRuleInfo {
        let mut rule = SipDispatchRuleInfo::new(SipDispatchRule::Direct {
            room_name: room.to_string(),
            pin: String::new(),
        });
        rule.sip_dispatch_rule_id = id.to_string();
        rule
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("+1 (555) 010-0100"), "+15550100100");
        assert_eq!(normalize_number("15550100"), "+15550100");
        assert_eq!(normalize_number("alice"), "alice");
        assert_eq!(normalize_number("  "), "");
    }

    #[test]
    fn test_wildcard_trunk_conflicts_with_new() {
        let existing = inbound("ST_existing").with_numbers(["*"]);
        let candidate = inbound("").with_numbers(["+15550100"]);

        let err = validate_trunks(&[existing, candidate]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ConflictingTrunks {
                first: "ST_existing".to_string(),
                second: "<new>".to_string(),
                number: Some("+15550100".to_string()),
            }
        );
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "Conflicting inbound SIP trunks: \"ST_existing\" and \"<new>\" (number \"+15550100\")"
        );
    }

    #[test]
    fn test_conflict_names_shared_number() {
        let a = inbound("ST_a").with_numbers(["+15550100", "+1 555 0102"]);
        let b = inbound("").with_numbers(["15550102", "+15550103"]);
        let err = validate_trunks(&[a, b]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflicting inbound SIP trunks: \"ST_a\" and \"<new>\" (number \"+15550102\")"
        );

        let c = inbound("ST_c").with_allowed_addresses(["10.0.0.1"]);
        let d = inbound("").with_allowed_addresses(["10.0.0.0/24"]);
        let err = validate_trunks(&[c, d]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflicting inbound SIP trunks: \"ST_c\" and \"<new>\""
        );
    }

    #[test]
    fn test_distinct_numbers_do_not_conflict() {
        let a = inbound("ST_a").with_numbers(["+15550100"]);
        let b = inbound("ST_b").with_numbers(["+15550101"]);
        assert!(validate_trunks(&[a, b]).is_ok());
    }

    #[test]
    fn test_same_number_after_normalization_conflicts() {
        let a = inbound("ST_a").with_numbers(["+1 555 0100"]);
        let b = inbound("").with_numbers(["15550100"]);
        assert!(validate_trunks(&[a, b]).is_err());
    }

    #[test]
    fn test_disjoint_addresses_do_not_conflict() {
        let a = inbound("ST_a")
            .with_numbers(["+15550100"])
            .with_allowed_addresses(["10.0.0.0/24"]);
        let b = inbound("ST_b")
            .with_numbers(["+15550100"])
            .with_allowed_addresses(["10.0.1.0/24", "sip.carrier.net"]);
        assert!(validate_trunks(&[a, b]).is_ok());
    }

    #[test]
    fn test_overlapping_cidr_conflicts() {
        let a = inbound("ST_a")
            .with_numbers(["+15550100"])
            .with_allowed_addresses(["10.0.0.0/16"]);
        let b = inbound("ST_b")
            .with_numbers(["+15550100"])
            .with_allowed_addresses(["10.0.42.7"]);
        assert!(validate_trunks(&[a, b]).is_err());
    }

    #[test]
    fn test_ipv6_and_hostnames() {
        let a = inbound("ST_a").with_allowed_addresses(["2001:db8::/32", "SIP.Carrier.net"]);
        let b = inbound("ST_b").with_allowed_addresses(["2001:db9::1"]);
        assert!(validate_trunks(&[a.clone(), b]).is_ok());

        let c = inbound("ST_c").with_allowed_addresses(["sip.carrier.net"]);
        assert!(validate_trunks(&[a, c]).is_err());
    }

    #[test]
    fn test_address_families_never_overlap() {
        let a = inbound("ST_a").with_allowed_addresses(["0.0.0.0/0"]);
        let b = inbound("ST_b").with_allowed_addresses(["::1"]);
        assert!(validate_trunks(&[a, b]).is_ok());
    }

    #[test]
    fn test_distinct_callers_do_not_conflict() {
        let a = inbound("ST_a")
            .with_numbers(["+15550100"])
            .with_allowed_numbers(["+15559000"]);
        let b = inbound("ST_b")
            .with_numbers(["+15550100"])
            .with_allowed_numbers(["+15559001"]);
        assert!(validate_trunks(&[a, b]).is_ok());
    }

    #[test]
    fn test_unrestricted_trunk_conflicts_with_everything() {
        let open = inbound("ST_open");
        let narrow = inbound("ST_narrow")
            .with_numbers(["+15550100"])
            .with_allowed_addresses(["192.168.1.10"])
            .with_allowed_numbers(["+15559000"]);
        assert!(validate_trunks(&[open, narrow]).is_err());
    }

    #[test]
    fn test_trunk_order_independence() {
        let a = inbound("ST_a").with_numbers(["+15550100", "+15550101"]);
        let b = inbound("ST_b").with_numbers(["+15550101"]);
        let c = inbound("ST_c").with_numbers(["+15550102"]);

        assert!(validate_trunks(&[a.clone(), b.clone()]).is_err());
        assert!(validate_trunks(&[b.clone(), a.clone()]).is_err());
        assert!(validate_trunks(&[a.clone(), c.clone()]).is_ok());
        assert!(validate_trunks(&[c, a]).is_ok());
    }

    #[test]
    fn test_trunk_rejection_is_idempotent() {
        let list = vec![
            inbound("ST_a").with_numbers(["*"]),
            inbound("ST_b").with_numbers(["+15550100"]),
            inbound("").with_numbers(["+15550101"]),
        ];
        let first = validate_trunks(&list).unwrap_err();
        let second = validate_trunks(&list).unwrap_err();
        assert_eq!(first, second);
        assert_eq!(
            first,
            ValidationError::ConflictingTrunks {
                first: "ST_a".to_string(),
                second: "ST_b".to_string(),
                number: Some("+15550100".to_string()),
            }
        );
    }

    #[test]
    fn test_deprecated_regex_rejected() {
        let mut trunk = inbound("");
        trunk.numbers_regex = vec!["^\\+1.*".to_string()];
        let err = validate_trunks(&[trunk]).unwrap_err();
        assert_eq!(err, ValidationError::DeprecatedNumbersRegex);
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_empty_collections_are_valid() {
        assert!(validate_trunks(&[]).is_ok());
        assert!(validate_dispatch_rules(&[]).is_ok());
    }

    #[test]
    fn test_default_dispatch_rules_conflict() {
        let err = validate_dispatch_rules(&[direct("SDR_a", "lobby"), direct("", "other")])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::ConflictingDispatchRules {
                first: "SDR_a".to_string(),
                second: "<new>".to_string(),
            }
        );
    }

    #[test]
    fn test_specific_rule_does_not_conflict_with_default() {
        let default = direct("SDR_a", "lobby");
        let specific = direct("", "sales").with_trunks(["ST_a"]);
        let by_number = direct("", "support").with_numbers(["+15550100"]);
        assert!(validate_dispatch_rules(&[default, specific, by_number]).is_ok());
    }

    #[test]
    fn test_shared_trunk_and_number_conflicts() {
        let a = direct("SDR_a", "a")
            .with_trunks(["ST_a", "ST_b"])
            .with_numbers(["+15550100"]);
        let b = direct("", "b")
            .with_trunks(["ST_b"])
            .with_numbers(["1 555 0100", "+15550101"]);
        assert!(validate_dispatch_rules(&[a.clone(), b.clone()]).is_err());
        assert!(validate_dispatch_rules(&[b, a]).is_err());
    }

    #[test]
    fn test_different_pins_do_not_conflict() {
        let a = SipDispatchRuleInfo::new(SipDispatchRule::Individual {
            room_prefix: "call-".to_string(),
            pin: "1111".to_string(),
        });
        let b = SipDispatchRuleInfo::new(SipDispatchRule::Individual {
            room_prefix: "call-".to_string(),
            pin: "2222".to_string(),
        });
        assert!(validate_dispatch_rules(&[a, b]).is_ok());
    }

    #[test]
    fn test_repeated_trunk_in_one_rule_is_not_a_conflict() {
        let rule = direct("", "lobby").with_trunks(["ST_a", "ST_a"]);
        assert!(validate_dispatch_rules(&[rule]).is_ok());
    }

    #[test]
    fn test_rule_is_required() {
        let rule = SipDispatchRuleInfo::default();
        let err = validate_dispatch_rules(&[rule]).unwrap_err();
        assert_eq!(err, ValidationError::MissingRule("<new>".to_string()));
    }

    #[test]
    fn test_direct_rule_needs_room() {
        let err = validate_dispatch_rules(&[direct("", " ")]).unwrap_err();
        assert_eq!(err, ValidationError::MissingRoomName("<new>".to_string()));
    }
}
