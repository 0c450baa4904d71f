//! SIP dispatch rules: map an inbound call to a room

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an inbound call is mapped to a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SipDispatchRule {
    /// Every caller joins the same room
    Direct {
        room_name: String,
        #[serde(default)]
        pin: String,
    },
    /// Each caller gets a new room named `<room_prefix><caller>`
    Individual {
        #[serde(default)]
        room_prefix: String,
        #[serde(default)]
        pin: String,
    },
    /// Room named after the called number
    Callee {
        #[serde(default)]
        room_prefix: String,
        #[serde(default)]
        pin: String,
        #[serde(default)]
        randomize: bool,
    },
}

impl SipDispatchRule {
    pub fn pin(&self) -> &str {
        match self {
            SipDispatchRule::Direct { pin, .. }
            | SipDispatchRule::Individual { pin, .. }
            | SipDispatchRule::Callee { pin, .. } => pin,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipDispatchRuleInfo {
    pub sip_dispatch_rule_id: String,
    pub rule: Option<SipDispatchRule>,
    /// Trunks this rule applies to. Empty applies to every trunk.
    pub trunk_ids: Vec<String>,
    /// Called numbers this rule applies to. Empty applies to every number.
    pub inbound_numbers: Vec<String>,
    pub hide_phone_number: bool,
    pub name: String,
    pub metadata: String,
    pub attributes: HashMap<String, String>,
}

impl SipDispatchRuleInfo {
    pub fn new(rule: SipDispatchRule) -> Self {
        Self {
            rule: Some(rule),
            ..Default::default()
        }
    }

    pub fn with_trunks<I, S>(mut self, trunk_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trunk_ids = trunk_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inbound_numbers = numbers.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this rule applies to calls arriving on the given trunk
    pub fn applies_to_trunk(&self, trunk_id: &str) -> bool {
        self.trunk_ids.is_empty() || self.trunk_ids.iter().any(|t| t == trunk_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateSipDispatchRuleRequest {
    pub rule: Option<SipDispatchRule>,
    pub trunk_ids: Vec<String>,
    pub inbound_numbers: Vec<String>,
    pub hide_phone_number: bool,
    pub name: String,
    pub metadata: String,
    pub attributes: HashMap<String, String>,
}

impl CreateSipDispatchRuleRequest {
    /// Build the candidate rule. The ID stays empty until validation passes.
    pub fn into_info(self) -> SipDispatchRuleInfo {
        SipDispatchRuleInfo {
            sip_dispatch_rule_id: String::new(),
            rule: self.rule,
            trunk_ids: self.trunk_ids,
            inbound_numbers: self.inbound_numbers,
            hide_phone_number: self.hide_phone_number,
            name: self.name,
            metadata: self.metadata,
            attributes: self.attributes,
        }
    }
}
