//! PostgreSQL implementation of SipStore
//!
//! Trunks and rules are stored as JSONB documents. Dispatch rules keep a
//! separate trunk index table so rules for one trunk can be listed without a scan.

use crate::domain::dispatch_rule::SipDispatchRuleInfo;
use crate::domain::shared::{DomainError, Result};
use crate::domain::sip_store::SipStore;
use crate::domain::sip_trunk::{
    SipInboundTrunkInfo, SipOutboundTrunkInfo, SipTrunkInfo, TrunkKind,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};

const ALL_TRUNKS: &str = "";

#[derive(FromRow)]
struct TrunkRow {
    id: String,
    kind: String,
    info: Json<serde_json::Value>,
}

#[derive(FromRow)]
struct RuleRow {
    id: String,
    info: Json<serde_json::Value>,
}

/// A trunk row decoded according to its kind column
enum StoredTrunk {
    Legacy(SipTrunkInfo),
    Inbound(SipInboundTrunkInfo),
    Outbound(SipOutboundTrunkInfo),
}

impl StoredTrunk {
    fn as_trunk(&self) -> SipTrunkInfo {
        match self {
            StoredTrunk::Legacy(t) => t.clone(),
            StoredTrunk::Inbound(t) => t.as_trunk(),
            StoredTrunk::Outbound(t) => t.as_trunk(),
        }
    }

    fn into_inbound(self) -> Option<SipInboundTrunkInfo> {
        match self {
            StoredTrunk::Legacy(t) => Some(t.as_inbound()),
            StoredTrunk::Inbound(t) => Some(t),
            StoredTrunk::Outbound(_) => None,
        }
    }

    fn into_outbound(self) -> Option<SipOutboundTrunkInfo> {
        match self {
            StoredTrunk::Legacy(t) => Some(t.as_outbound()),
            StoredTrunk::Inbound(_) => None,
            StoredTrunk::Outbound(t) => Some(t),
        }
    }
}

fn kind_str(kind: TrunkKind) -> &'static str {
    match kind {
        TrunkKind::Legacy => "legacy",
        TrunkKind::Inbound => "inbound",
        TrunkKind::Outbound => "outbound",
    }
}

fn decode<T: DeserializeOwned>(id: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        error!("Corrupt SIP config document {}: {}", id, e);
        DomainError::Storage(format!("corrupt document {}: {}", id, e))
    })
}

impl TryFrom<TrunkRow> for StoredTrunk {
    type Error = DomainError;

    fn try_from(row: TrunkRow) -> Result<Self> {
        let TrunkRow { id, kind, info } = row;
        match kind.as_str() {
            "legacy" => Ok(StoredTrunk::Legacy(decode(&id, info.0)?)),
            "inbound" => Ok(StoredTrunk::Inbound(decode(&id, info.0)?)),
            "outbound" => Ok(StoredTrunk::Outbound(decode(&id, info.0)?)),
            other => Err(DomainError::Storage(format!(
                "unknown trunk kind {:?} for {}",
                other, id
            ))),
        }
    }
}

fn db_error(e: sqlx::Error) -> DomainError {
    error!("Database error: {}", e);
    DomainError::Storage(e.to_string())
}

pub struct PgSipStore {
    pool: PgPool,
}

impl PgSipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_trunks(&self, kinds: &[&str]) -> Result<Vec<StoredTrunk>> {
        let kinds: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        let rows = sqlx::query_as::<_, TrunkRow>(
            "SELECT id, kind, info FROM sip_trunks WHERE kind = ANY($1) ORDER BY id",
        )
        .bind(kinds)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(StoredTrunk::try_from).collect()
    }

    async fn fetch_trunk(&self, id: &str) -> Result<Option<StoredTrunk>> {
        let row = sqlx::query_as::<_, TrunkRow>(
            "SELECT id, kind, info FROM sip_trunks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(StoredTrunk::try_from).transpose()
    }

    async fn upsert_trunk<T: serde::Serialize + Sync>(
        &self,
        id: &str,
        kind: TrunkKind,
        info: &T,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(DomainError::InvalidInput(
                "SIP trunk ID is required".to_string(),
            ));
        }
        debug!("Storing {} SIP trunk: {}", kind_str(kind), id);

        sqlx::query(
            r#"
            INSERT INTO sip_trunks (id, kind, info)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET kind = EXCLUDED.kind, info = EXCLUDED.info
            "#,
        )
        .bind(id)
        .bind(kind_str(kind))
        .bind(Json(info))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

fn rule_index_keys(info: &SipDispatchRuleInfo) -> Vec<String> {
    if info.trunk_ids.is_empty() {
        vec![ALL_TRUNKS.to_string()]
    } else {
        info.trunk_ids.clone()
    }
}

#[async_trait]
impl SipStore for PgSipStore {
    async fn list_sip_trunk(&self) -> Result<Vec<SipTrunkInfo>> {
        let trunks = self.fetch_trunks(&["legacy", "inbound", "outbound"]).await?;
        Ok(trunks.iter().map(StoredTrunk::as_trunk).collect())
    }

    async fn list_sip_inbound_trunk(&self) -> Result<Vec<SipInboundTrunkInfo>> {
        let trunks = self.fetch_trunks(&["legacy", "inbound"]).await?;
        Ok(trunks.into_iter().filter_map(StoredTrunk::into_inbound).collect())
    }

    async fn list_sip_outbound_trunk(&self) -> Result<Vec<SipOutboundTrunkInfo>> {
        let trunks = self.fetch_trunks(&["legacy", "outbound"]).await?;
        Ok(trunks.into_iter().filter_map(StoredTrunk::into_outbound).collect())
    }

    async fn load_sip_inbound_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Option<SipInboundTrunkInfo>> {
        Ok(self
            .fetch_trunk(sip_trunk_id)
            .await?
            .and_then(StoredTrunk::into_inbound))
    }

    async fn load_sip_outbound_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Option<SipOutboundTrunkInfo>> {
        Ok(self
            .fetch_trunk(sip_trunk_id)
            .await?
            .and_then(StoredTrunk::into_outbound))
    }

    async fn store_sip_trunk(&self, info: &SipTrunkInfo) -> Result<()> {
        self.upsert_trunk(&info.sip_trunk_id, TrunkKind::Legacy, info)
            .await
    }

    async fn store_sip_inbound_trunk(&self, info: &SipInboundTrunkInfo) -> Result<()> {
        self.upsert_trunk(&info.sip_trunk_id, TrunkKind::Inbound, info)
            .await
    }

    async fn store_sip_outbound_trunk(&self, info: &SipOutboundTrunkInfo) -> Result<()> {
        self.upsert_trunk(&info.sip_trunk_id, TrunkKind::Outbound, info)
            .await
    }

    async fn delete_sip_trunk(&self, sip_trunk_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sip_trunks WHERE id = $1")
            .bind(sip_trunk_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_sip_dispatch_rule(&self) -> Result<Vec<SipDispatchRuleInfo>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, info FROM sip_dispatch_rules ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(|r| decode(&r.id, r.info.0)).collect()
    }

    async fn list_sip_dispatch_rule_by_trunk(
        &self,
        sip_trunk_id: &str,
    ) -> Result<Vec<SipDispatchRuleInfo>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT r.id, r.info
            FROM sip_dispatch_rules r
            WHERE r.id IN (
                SELECT rule_id FROM sip_dispatch_rule_trunks
                WHERE trunk_id = $1 OR trunk_id = $2
            )
            ORDER BY r.id
            "#,
        )
        .bind(sip_trunk_id)
        .bind(ALL_TRUNKS)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(|r| decode(&r.id, r.info.0)).collect()
    }

    async fn load_sip_dispatch_rule(
        &self,
        sip_dispatch_rule_id: &str,
    ) -> Result<Option<SipDispatchRuleInfo>> {
        let row = sqlx::query_as::<_, RuleRow>(
            "SELECT id, info FROM sip_dispatch_rules WHERE id = $1",
        )
        .bind(sip_dispatch_rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(|r| decode(&r.id, r.info.0)).transpose()
    }

    async fn store_sip_dispatch_rule(&self, info: &SipDispatchRuleInfo) -> Result<()> {
        let id = &info.sip_dispatch_rule_id;
        if id.is_empty() {
            return Err(DomainError::InvalidInput(
                "SIP dispatch rule ID is required".to_string(),
            ));
        }
        debug!("Storing SIP dispatch rule: {}", id);

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO sip_dispatch_rules (id, info)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET info = EXCLUDED.info
            "#,
        )
        .bind(id)
        .bind(Json(info))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM sip_dispatch_rule_trunks WHERE rule_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO sip_dispatch_rule_trunks (rule_id, trunk_id)
            SELECT $1, trunk_id FROM UNNEST($2::text[]) AS trunk_id
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(rule_index_keys(info))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn delete_sip_dispatch_rule(&self, info: &SipDispatchRuleInfo) -> Result<()> {
        let id = &info.sip_dispatch_rule_id;
        debug!("Deleting SIP dispatch rule: {}", id);

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            "DELETE FROM sip_dispatch_rule_trunks WHERE rule_id = $1 AND trunk_id = ANY($2)",
        )
        .bind(id)
        .bind(rule_index_keys(info))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM sip_dispatch_rules WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}
