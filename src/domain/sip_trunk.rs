/// SIP trunk configuration
use serde::{Deserialize, Serialize};

/// Signalling transport used towards an outbound trunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SipTransport {
    #[default]
    Auto,
    Udp,
    Tcp,
    Tls,
}

/// Which API created a trunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrunkKind {
    #[default]
    Legacy,
    Inbound,
    Outbound,
}

/// Inbound trunk: who may call in, and on which numbers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipInboundTrunkInfo {
    pub sip_trunk_id: String,
    pub name: String,
    pub metadata: String,

    /// Called numbers this trunk answers for. Empty or `*` accepts any.
    pub numbers: Vec<String>,
    /// Source IPs, CIDRs or hostnames. Empty or `*` accepts any.
    pub allowed_addresses: Vec<String>,
    /// Caller numbers. Empty or `*` accepts any.
    pub allowed_numbers: Vec<String>,

    pub auth_username: String,
    pub auth_password: String,

    /// Deprecated, only present on legacy trunks. Always rejected.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub numbers_regex: Vec<String>,
}

impl SipInboundTrunkInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numbers = numbers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_numbers = numbers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.auth_username = username;
        self.auth_password = password;
        self
    }

    /// Legacy view of this trunk. Lossy: the legacy shape holds a single number, so only
    /// the first of `numbers` is kept.
    pub fn as_trunk(&self) -> SipTrunkInfo {
        SipTrunkInfo {
            sip_trunk_id: self.sip_trunk_id.clone(),
            kind: TrunkKind::Inbound,
            inbound_addresses: self.allowed_addresses.clone(),
            outbound_number: self.numbers.first().cloned().unwrap_or_default(),
            inbound_numbers: self.allowed_numbers.clone(),
            inbound_numbers_regex: self.numbers_regex.clone(),
            inbound_username: self.auth_username.clone(),
            inbound_password: self.auth_password.clone(),
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            ..Default::default()
        }
    }
}

/// Outbound trunk: where outgoing calls are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipOutboundTrunkInfo {
    pub sip_trunk_id: String,
    pub name: String,
    pub metadata: String,

    /// Destination host, optionally with port
    pub address: String,
    pub transport: SipTransport,
    /// Calling numbers used for outgoing calls
    pub numbers: Vec<String>,

    pub auth_username: String,
    pub auth_password: String,
}

impl SipOutboundTrunkInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numbers = numbers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.auth_username = username;
        self.auth_password = password;
        self
    }

    /// Legacy view. Only the first calling number survives.
    pub fn as_trunk(&self) -> SipTrunkInfo {
        SipTrunkInfo {
            sip_trunk_id: self.sip_trunk_id.clone(),
            kind: TrunkKind::Outbound,
            outbound_address: self.address.clone(),
            outbound_number: self.numbers.first().cloned().unwrap_or_default(),
            outbound_username: self.auth_username.clone(),
            outbound_password: self.auth_password.clone(),
            transport: self.transport,
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            ..Default::default()
        }
    }
}

/// Combined trunk from the first-generation API, serving both directions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipTrunkInfo {
    pub sip_trunk_id: String,
    pub kind: TrunkKind,

    pub inbound_addresses: Vec<String>,
    pub outbound_address: String,
    pub outbound_number: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inbound_numbers_regex: Vec<String>,
    pub inbound_numbers: Vec<String>,

    pub inbound_username: String,
    pub inbound_password: String,
    pub outbound_username: String,
    pub outbound_password: String,

    pub transport: SipTransport,
    pub name: String,
    pub metadata: String,
}

impl SipTrunkInfo {
    /// Inbound view: the trunk answers for its outbound number
    pub fn as_inbound(&self) -> SipInboundTrunkInfo {
        let numbers = if self.outbound_number.is_empty() {
            Vec::new()
        } else {
            vec![self.outbound_number.clone()]
        };
        SipInboundTrunkInfo {
            sip_trunk_id: self.sip_trunk_id.clone(),
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            numbers,
            allowed_addresses: self.inbound_addresses.clone(),
            allowed_numbers: self.inbound_numbers.clone(),
            auth_username: self.inbound_username.clone(),
            auth_password: self.inbound_password.clone(),
            numbers_regex: self.inbound_numbers_regex.clone(),
        }
    }

    pub fn as_outbound(&self) -> SipOutboundTrunkInfo {
        let numbers = if self.outbound_number.is_empty() {
            Vec::new()
        } else {
            vec![self.outbound_number.clone()]
        };
        SipOutboundTrunkInfo {
            sip_trunk_id: self.sip_trunk_id.clone(),
            name: self.name.clone(),
            metadata: self.metadata.clone(),
            address: self.outbound_address.clone(),
            transport: self.transport,
            numbers,
            auth_username: self.outbound_username.clone(),
            auth_password: self.outbound_password.clone(),
        }
    }
}

/// Legacy trunk creation request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateSipTrunkRequest {
    pub inbound_addresses: Vec<String>,
    pub outbound_address: String,
    pub outbound_number: String,
    pub inbound_numbers_regex: Vec<String>,
    pub inbound_numbers: Vec<String>,
    pub inbound_username: String,
    pub inbound_password: String,
    pub outbound_username: String,
    pub outbound_password: String,
    pub name: String,
    pub metadata: String,
}

impl CreateSipTrunkRequest {
    /// Build the candidate trunk. The ID stays empty until validation passes.
    pub fn to_info(&self) -> SipTrunkInfo {
        SipTrunkInfo {
            sip_trunk_id: String::new(),
            kind: TrunkKind::Legacy,
            inbound_addresses: self.inbound_addresses.clone(),
            outbound_address: self.outbound_address.clone(),
            outbound_number: self.outbound_number.clone(),
            inbound_numbers_regex: Vec::new(),
            inbound_numbers: self.inbound_numbers.clone(),
            inbound_username: self.inbound_username.clone(),
            inbound_password: self.inbound_password.clone(),
            outbound_username: self.outbound_username.clone(),
            outbound_password: self.outbound_password.clone(),
            transport: SipTransport::Auto,
            name: self.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSipInboundTrunkRequest {
    pub trunk: Option<SipInboundTrunkInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSipOutboundTrunkRequest {
    pub trunk: Option<SipOutboundTrunkInfo>,
}
