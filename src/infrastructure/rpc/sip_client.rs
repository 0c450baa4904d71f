//! JSON-RPC over HTTP client for placing SIP calls

use crate::domain::participant::{
    InternalCreateSipParticipantRequest, InternalCreateSipParticipantResponse, SipCallClient,
};
use crate::domain::shared::{DomainError, Result};
use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};

pub const CREATE_SIP_PARTICIPANT_METHOD: &str = "sip_createSipParticipant";

/// Transport-level limit. Calls are bounded by their own timeout, which is always shorter.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub struct JsonRpcSipClient {
    client: HttpClient,
    url: String,
}

impl JsonRpcSipClient {
    pub fn new(url: &str) -> std::result::Result<Self, ClientError> {
        let client = HttpClientBuilder::default()
            .request_timeout(TRANSPORT_TIMEOUT)
            .build(url)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl SipCallClient for JsonRpcSipClient {
    async fn create_sip_participant(
        &self,
        req: InternalCreateSipParticipantRequest,
        timeout: Duration,
    ) -> Result<InternalCreateSipParticipantResponse> {
        let call_id = req.sip_call_id.clone();

        let encode_err =
            |e: serde_json::Error| DomainError::Internal(format!("cannot encode request: {}", e));
        let mut params = ArrayParams::new();
        params.insert(&req).map_err(encode_err)?;
        params.insert(timeout_millis(timeout)).map_err(encode_err)?;

        debug!(
            "Sending {} for call {} to {}",
            CREATE_SIP_PARTICIPANT_METHOD, call_id, self.url
        );
        let call = self.client.request::<InternalCreateSipParticipantResponse, _>(
            CREATE_SIP_PARTICIPANT_METHOD,
            params,
        );

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(ClientError::RequestTimeout)) | Err(_) => {
                warn!("SIP call {} timed out after {:?}", call_id, timeout);
                Err(DomainError::RemoteTimeout(timeout))
            }
            Ok(Err(ClientError::Call(err))) => {
                Err(DomainError::RemoteCall(err.message().to_string()))
            }
            Ok(Err(e)) => Err(DomainError::RemoteCall(e.to_string())),
        }
    }
}
