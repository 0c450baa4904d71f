//! Outbound SIP participants: call requests forwarded to the SIP peer

use crate::domain::shared::Result;
use crate::domain::sip_trunk::{SipOutboundTrunkInfo, SipTransport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// External request to dial a phone number into a room
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateSipParticipantRequest {
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    /// Calling number. Defaults to one of the trunk's numbers.
    pub sip_number: String,
    pub room_name: String,
    pub participant_identity: String,
    pub participant_name: String,
    pub participant_metadata: String,
    pub participant_attributes: HashMap<String, String>,
    pub dtmf: String,
    pub play_ringtone: bool,
    pub hide_phone_number: bool,
}

/// Enrichment supplied by the caller of the service, not by the API client
#[derive(Debug, Clone, Default)]
pub struct ParticipantRequestOptions {
    pub project_id: String,
    pub host: String,
    pub ws_url: String,
    pub token: String,
}

/// Request sent to the SIP peer, resolved against the outbound trunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalCreateSipParticipantRequest {
    pub project_id: String,
    pub sip_call_id: String,
    pub sip_trunk_id: String,
    pub address: String,
    pub transport: SipTransport,
    pub number: String,
    pub call_to: String,
    pub username: String,
    pub password: String,
    pub room_name: String,
    pub participant_identity: String,
    pub participant_name: String,
    pub participant_metadata: String,
    pub participant_attributes: HashMap<String, String>,
    pub host: String,
    pub ws_url: String,
    pub token: String,
    pub dtmf: String,
    pub play_ringtone: bool,
    pub hide_phone_number: bool,
}

impl InternalCreateSipParticipantRequest {
    /// Combine an API request with its outbound trunk.
    ///
    /// `number` is the calling number already chosen for this call.
    pub fn new(
        call_id: String,
        req: &CreateSipParticipantRequest,
        trunk: &SipOutboundTrunkInfo,
        number: String,
        opts: &ParticipantRequestOptions,
    ) -> Self {
        let participant_identity = if req.participant_identity.is_empty() {
            format!("sip_{}", req.sip_call_to)
        } else {
            req.participant_identity.clone()
        };
        Self {
            project_id: opts.project_id.clone(),
            sip_call_id: call_id,
            sip_trunk_id: trunk.sip_trunk_id.clone(),
            address: trunk.address.clone(),
            transport: trunk.transport,
            number,
            call_to: req.sip_call_to.clone(),
            username: trunk.auth_username.clone(),
            password: trunk.auth_password.clone(),
            room_name: req.room_name.clone(),
            participant_identity,
            participant_name: req.participant_name.clone(),
            participant_metadata: req.participant_metadata.clone(),
            participant_attributes: req.participant_attributes.clone(),
            host: opts.host.clone(),
            ws_url: opts.ws_url.clone(),
            token: opts.token.clone(),
            dtmf: req.dtmf.clone(),
            play_ringtone: req.play_ringtone,
            hide_phone_number: req.hide_phone_number,
        }
    }
}

/// What the SIP peer reports once the participant joined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalCreateSipParticipantResponse {
    pub participant_id: String,
    pub participant_identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipParticipantInfo {
    pub participant_id: String,
    pub participant_identity: String,
    pub room_name: String,
    pub sip_call_id: String,
}

/// RPC peer that places SIP calls
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SipCallClient: Send + Sync {
    /// Place the call. `timeout` is the budget the peer may use for the request.
    async fn create_sip_participant(
        &self,
        req: InternalCreateSipParticipantRequest,
        timeout: Duration,
    ) -> Result<InternalCreateSipParticipantResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trunk() -> SipOutboundTrunkInfo {
        let mut trunk = SipOutboundTrunkInfo::new("Carrier", "sip.carrier.net")
            .with_numbers(["+15550100"])
            .with_credentials("user".to_string(), "pass".to_string());
        trunk.sip_trunk_id = "ST_out".to_string();
        trunk.transport = SipTransport::Tls;
        trunk
    }

    #[test]
    fn test_internal_request_from_trunk() {
        let req = CreateSipParticipantRequest {
            sip_trunk_id: "ST_out".to_string(),
            sip_call_to: "+15559000".to_string(),
            room_name: "support".to_string(),
            ..Default::default()
        };
        let opts = ParticipantRequestOptions {
            project_id: "p_1".to_string(),
            ..Default::default()
        };

        let internal = InternalCreateSipParticipantRequest::new(
            "SCL_abc".to_string(),
            &req,
            &trunk(),
            "+15550100".to_string(),
            &opts,
        );

        assert_eq!(internal.sip_call_id, "SCL_abc");
        assert_eq!(internal.address, "sip.carrier.net");
        assert_eq!(internal.transport, SipTransport::Tls);
        assert_eq!(internal.username, "user");
        assert_eq!(internal.password, "pass");
        assert_eq!(internal.number, "+15550100");
        assert_eq!(internal.participant_identity, "sip_+15559000");
        assert_eq!(internal.project_id, "p_1");
    }

    #[test]
    fn test_explicit_identity_is_kept() {
        let req = CreateSipParticipantRequest {
            sip_call_to: "+15559000".to_string(),
            participant_identity: "caller-1".to_string(),
            ..Default::default()
        };
        let internal = InternalCreateSipParticipantRequest::new(
            "SCL_abc".to_string(),
            &req,
            &trunk(),
            "+15550100".to_string(),
            &ParticipantRequestOptions::default(),
        );
        assert_eq!(internal.participant_identity, "caller-1");
    }
}
