//! Persistence port for trunks and dispatch rules

use crate::domain::dispatch_rule::SipDispatchRuleInfo;
use crate::domain::shared::Result;
use crate::domain::sip_trunk::{SipInboundTrunkInfo, SipOutboundTrunkInfo, SipTrunkInfo};
use async_trait::async_trait;

/// Storage for SIP configuration.
///
/// Every method is an independent round-trip; nothing spans a list and a later store.
/// Legacy trunks are visible through the inbound and outbound views as well.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SipStore: Send + Sync {
    /// All trunks, converted to the legacy combined form
    async fn list_sip_trunk(&self) -> Result<Vec<SipTrunkInfo>>;

    /// Inbound trunks plus the inbound view of legacy trunks
    async fn list_sip_inbound_trunk(&self) -> Result<Vec<SipInboundTrunkInfo>>;

    /// Outbound trunks plus the outbound view of legacy trunks
    async fn list_sip_outbound_trunk(&self) -> Result<Vec<SipOutboundTrunkInfo>>;

    async fn load_sip_inbound_trunk(&self, sip_trunk_id: &str)
        -> Result<Option<SipInboundTrunkInfo>>;

    async fn load_sip_outbound_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Option<SipOutboundTrunkInfo>>;

    async fn store_sip_trunk(&self, info: &SipTrunkInfo) -> Result<()>;

    async fn store_sip_inbound_trunk(&self, info: &SipInboundTrunkInfo) -> Result<()>;

    async fn store_sip_outbound_trunk(&self, info: &SipOutboundTrunkInfo) -> Result<()>;

    /// Delete a trunk of any kind. Returns false if it did not exist.
    async fn delete_sip_trunk(&self, sip_trunk_id: &str) -> Result<bool>;

    async fn list_sip_dispatch_rule(&self) -> Result<Vec<SipDispatchRuleInfo>>;

    /// Rules that apply to the given trunk, including rules for all trunks
    async fn list_sip_dispatch_rule_by_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Vec<SipDispatchRuleInfo>>;

    async fn load_sip_dispatch_rule(
        &self,
        sip_dispatch_rule_id: &str,
    ) -> Result<Option<SipDispatchRuleInfo>>;

    async fn store_sip_dispatch_rule(&self, info: &SipDispatchRuleInfo) -> Result<()>;

    /// Delete a rule. Takes the full rule so trunk indexes can be cleaned up.
    async fn delete_sip_dispatch_rule(&self, info: &SipDispatchRuleInfo) -> Result<()>;
}
