//! In-memory implementation of SipStore

use crate::domain::dispatch_rule::SipDispatchRuleInfo;
use crate::domain::shared::{DomainError, Result};
use crate::domain::sip_store::SipStore;
use crate::domain::sip_trunk::{SipInboundTrunkInfo, SipOutboundTrunkInfo, SipTrunkInfo};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// Index key for rules that apply to every trunk
const ALL_TRUNKS: &str = "";

#[derive(Debug, Default)]
struct State {
    trunks: BTreeMap<String, SipTrunkInfo>,
    inbound: BTreeMap<String, SipInboundTrunkInfo>,
    outbound: BTreeMap<String, SipOutboundTrunkInfo>,
    rules: BTreeMap<String, SipDispatchRuleInfo>,
    rules_by_trunk: HashMap<String, BTreeSet<String>>,
}

impl State {
    fn index_keys(info: &SipDispatchRuleInfo) -> Vec<&str> {
        if info.trunk_ids.is_empty() {
            vec![ALL_TRUNKS]
        } else {
            info.trunk_ids.iter().map(String::as_str).collect()
        }
    }

    fn unindex_rule(&mut self, info: &SipDispatchRuleInfo) {
        for trunk in Self::index_keys(info) {
            if let Some(ids) = self.rules_by_trunk.get_mut(trunk) {
                ids.remove(&info.sip_dispatch_rule_id);
                if ids.is_empty() {
                    self.rules_by_trunk.remove(trunk);
                }
            }
        }
    }

    fn index_rule(&mut self, info: &SipDispatchRuleInfo) {
        for trunk in Self::index_keys(info) {
            self.rules_by_trunk
                .entry(trunk.to_string())
                .or_default()
                .insert(info.sip_dispatch_rule_id.clone());
        }
    }
}

/// Process-local store, used for tests and single-node deployments
#[derive(Debug, Default)]
pub struct InMemorySipStore {
    state: RwLock<State>,
}

impl InMemorySipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn require_id(id: &str, what: &str) -> Result<()> {
    if id.is_empty() {
        Err(DomainError::InvalidInput(format!("{} ID is required", what)))
    } else {
        Ok(())
    }
}

#[async_trait]
impl SipStore for InMemorySipStore {
    async fn list_sip_trunk(&self) -> Result<Vec<SipTrunkInfo>> {
        let state = self.state.read().await;
        Ok(state
            .trunks
            .values()
            .cloned()
            .chain(state.inbound.values().map(SipInboundTrunkInfo::as_trunk))
            .chain(state.outbound.values().map(SipOutboundTrunkInfo::as_trunk))
            .collect())
    }

    async fn list_sip_inbound_trunk(&self) -> Result<Vec<SipInboundTrunkInfo>> {
        let state = self.state.read().await;
        Ok(state
            .trunks
            .values()
            .map(SipTrunkInfo::as_inbound)
            .chain(state.inbound.values().cloned())
            .collect())
    }

    async fn list_sip_outbound_trunk(&self) -> Result<Vec<SipOutboundTrunkInfo>> {
        let state = self.state.read().await;
        Ok(state
            .trunks
            .values()
            .map(SipTrunkInfo::as_outbound)
            .chain(state.outbound.values().cloned())
            .collect())
    }

    async fn load_sip_inbound_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Option<SipInboundTrunkInfo>> {
        let state = self.state.read().await;
        Ok(state
            .inbound
            .get(sip_trunk_id)
            .cloned()
            .or_else(|| state.trunks.get(sip_trunk_id).map(SipTrunkInfo::as_inbound)))
    }

    async fn load_sip_outbound_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Option<SipOutboundTrunkInfo>> {
        let state = self.state.read().await;
        Ok(state
            .outbound
            .get(sip_trunk_id)
            .cloned()
            .or_else(|| state.trunks.get(sip_trunk_id).map(SipTrunkInfo::as_outbound)))
    }

    async fn store_sip_trunk(&self, info: &SipTrunkInfo) -> Result<()> {
        require_id(&info.sip_trunk_id, "SIP trunk")?;
        let mut state = self.state.write().await;
        state.trunks.insert(info.sip_trunk_id.clone(), info.clone());
        debug!("Stored SIP trunk: {}", info.sip_trunk_id);
        Ok(())
    }

    async fn store_sip_inbound_trunk(&self, info: &SipInboundTrunkInfo) -> Result<()> {
        require_id(&info.sip_trunk_id, "SIP trunk")?;
        let mut state = self.state.write().await;
        state.inbound.insert(info.sip_trunk_id.clone(), info.clone());
        debug!("Stored inbound SIP trunk: {}", info.sip_trunk_id);
        Ok(())
    }

    async fn store_sip_outbound_trunk(&self, info: &SipOutboundTrunkInfo) -> Result<()> {
        require_id(&info.sip_trunk_id, "SIP trunk")?;
        let mut state = self.state.write().await;
        state.outbound.insert(info.sip_trunk_id.clone(), info.clone());
        debug!("Stored outbound SIP trunk: {}", info.sip_trunk_id);
        Ok(())
    }

    async fn delete_sip_trunk(&self, sip_trunk_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.trunks.remove(sip_trunk_id).is_some()
            | state.inbound.remove(sip_trunk_id).is_some()
            | state.outbound.remove(sip_trunk_id).is_some();
        if removed {
            debug!("Deleted SIP trunk: {}", sip_trunk_id);
        }
        Ok(removed)
    }

    async fn list_sip_dispatch_rule(&self) -> Result<Vec<SipDispatchRuleInfo>> {
        let state = self.state.read().await;
        Ok(state.rules.values().cloned().collect())
    }

    async fn list_sip_dispatch_rule_by_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Vec<SipDispatchRuleInfo>> {
        let state = self.state.read().await;
        let ids: BTreeSet<&String> = [sip_trunk_id, ALL_TRUNKS]
            .iter()
            .filter_map(|trunk| state.rules_by_trunk.get(*trunk))
            .flatten()
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| state.rules.get(id).cloned())
            .collect())
    }

    async fn load_sip_dispatch_rule(
        &self,
        sip_dispatch_rule_id: &str,
    ) -> Result<Option<SipDispatchRuleInfo>> {
        let state = self.state.read().await;
        Ok(state.rules.get(sip_dispatch_rule_id).cloned())
    }

    async fn store_sip_dispatch_rule(&self, info: &SipDispatchRuleInfo) -> Result<()> {
        require_id(&info.sip_dispatch_rule_id, "SIP dispatch rule")?;
        let mut state = self.state.write().await;
        if let Some(previous) = state.rules.remove(&info.sip_dispatch_rule_id) {
            state.unindex_rule(&previous);
        }
        state.index_rule(info);
        state
            .rules
            .insert(info.sip_dispatch_rule_id.clone(), info.clone());
        debug!("Stored SIP dispatch rule: {}", info.sip_dispatch_rule_id);
        Ok(())
    }

    async fn delete_sip_dispatch_rule(&self, info: &SipDispatchRuleInfo) -> Result<()> {
        let mut state = self.state.write().await;
        state.rules.remove(&info.sip_dispatch_rule_id);
        state.unindex_rule(info);
        debug!("Deleted SIP dispatch rule: {}", info.sip_dispatch_rule_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dispatch_rule::SipDispatchRule;
    use crate::domain::sip_trunk::CreateSipTrunkRequest;

    fn rule(id: &str, trunks: &[&str]) -> SipDispatchRuleInfo {
        let mut rule = SipDispatchRuleInfo::new(SipDispatchRule::Direct {
            room_name: "lobby".to_string(),
            pin: String::new(),
        })
        .with_trunks(trunks.iter().copied());
        rule.sip_dispatch_rule_id = id.to_string();
        rule
    }

    #[tokio::test]
    async fn test_legacy_trunk_visible_in_all_views() {
        let store = InMemorySipStore::new();
        let mut legacy = CreateSipTrunkRequest {
            outbound_address: "sip.provider.com".to_string(),
            outbound_number: "+15550100".to_string(),
            ..Default::default()
        }
        .to_info();
        legacy.sip_trunk_id = "ST_legacy".to_string();
        store.store_sip_trunk(&legacy).await.unwrap();

        let mut inbound = SipInboundTrunkInfo::new("in").with_numbers(["+15550200"]);
        inbound.sip_trunk_id = "ST_in".to_string();
        store.store_sip_inbound_trunk(&inbound).await.unwrap();

        assert_eq!(store.list_sip_trunk().await.unwrap().len(), 2);
        assert_eq!(store.list_sip_inbound_trunk().await.unwrap().len(), 2);
        assert_eq!(store.list_sip_outbound_trunk().await.unwrap().len(), 1);

        let outbound = store.load_sip_outbound_trunk("ST_legacy").await.unwrap().unwrap();
        assert_eq!(outbound.address, "sip.provider.com");
        assert!(store.load_sip_outbound_trunk("ST_in").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_requires_id() {
        let store = InMemorySipStore::new();
        let err = store
            .store_sip_inbound_trunk(&SipInboundTrunkInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_trunk() {
        let store = InMemorySipStore::new();
        let mut outbound = SipOutboundTrunkInfo::new("out", "sip.carrier.net");
        outbound.sip_trunk_id = "ST_out".to_string();
        store.store_sip_outbound_trunk(&outbound).await.unwrap();

        assert!(store.delete_sip_trunk("ST_out").await.unwrap());
        assert!(!store.delete_sip_trunk("ST_out").await.unwrap());
        assert!(store.list_sip_outbound_trunk().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_rule_trunk_index() {
        let store = InMemorySipStore::new();
        store.store_sip_dispatch_rule(&rule("SDR_a", &["ST_1"])).await.unwrap();
        store.store_sip_dispatch_rule(&rule("SDR_b", &["ST_1", "ST_2"])).await.unwrap();
        store.store_sip_dispatch_rule(&rule("SDR_all", &[])).await.unwrap();

        let ids = |rules: Vec<SipDispatchRuleInfo>| {
            rules
                .into_iter()
                .map(|r| r.sip_dispatch_rule_id)
                .collect::<Vec<_>>()
        };

        assert_eq!(
            ids(store.list_sip_dispatch_rule_by_trunk("ST_1").await.unwrap()),
            vec!["SDR_a", "SDR_all", "SDR_b"]
        );
        assert_eq!(
            ids(store.list_sip_dispatch_rule_by_trunk("ST_2").await.unwrap()),
            vec!["SDR_all", "SDR_b"]
        );

        let b = store.load_sip_dispatch_rule("SDR_b").await.unwrap().unwrap();
        store.delete_sip_dispatch_rule(&b).await.unwrap();

        assert_eq!(
            ids(store.list_sip_dispatch_rule_by_trunk("ST_2").await.unwrap()),
            vec!["SDR_all"]
        );
        assert!(store.load_sip_dispatch_rule("SDR_b").await.unwrap().is_none());
        assert!(!store.state.read().await.rules_by_trunk.contains_key("ST_2"));
    }

    #[tokio::test]
    async fn test_restore_rule_reindexes() {
        let store = InMemorySipStore::new();
        store.store_sip_dispatch_rule(&rule("SDR_a", &["ST_1"])).await.unwrap();
        store.store_sip_dispatch_rule(&rule("SDR_a", &["ST_2"])).await.unwrap();

        assert!(store
            .list_sip_dispatch_rule_by_trunk("ST_1")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.list_sip_dispatch_rule_by_trunk("ST_2").await.unwrap().len(), 1);
    }
}
