//! SIP configuration service
//!
//! Admin operations on trunks and dispatch rules follow the same order:
//! authorize, check the store, reject malformed input, validate the candidate
//! against everything already stored, and only then allocate an ID and commit.

use crate::application::log_context::LogContext;
use crate::application::metrics::{
    record_config_created, record_participant_request, record_validation_rejection,
};
use crate::domain::auth::PermissionChecker;
use crate::domain::context::RequestContext;
use crate::domain::dispatch_rule::{CreateSipDispatchRuleRequest, SipDispatchRuleInfo};
use crate::domain::participant::{
    CreateSipParticipantRequest, InternalCreateSipParticipantRequest, ParticipantRequestOptions,
    SipCallClient, SipParticipantInfo,
};
use crate::domain::shared::{
    print_id, DomainError, GuidGenerator, IdGenerator, IdPrefix, Result,
};
use crate::domain::sip_store::SipStore;
use crate::domain::sip_trunk::{
    CreateSipInboundTrunkRequest, CreateSipOutboundTrunkRequest, CreateSipTrunkRequest,
    SipInboundTrunkInfo, SipOutboundTrunkInfo, SipTrunkInfo,
};
use crate::domain::validation::{validate_dispatch_rules, validate_trunks, ValidationError};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Used when the request carries no deadline
pub const DEFAULT_PARTICIPANT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SipService {
    store: Option<Arc<dyn SipStore>>,
    client: Arc<dyn SipCallClient>,
    permissions: Arc<dyn PermissionChecker>,
    ids: Arc<dyn IdGenerator>,
    participant_timeout: Duration,
    // Held from list to store so two creates cannot both pass validation
    inbound_trunk_lock: Mutex<()>,
    dispatch_rule_lock: Mutex<()>,
}

impl SipService {
    /// `store` may be absent when SIP is not configured; admin calls then fail
    /// with `StoreUnavailable`.
    pub fn new(
        store: Option<Arc<dyn SipStore>>,
        client: Arc<dyn SipCallClient>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> Self {
        Self {
            store,
            client,
            permissions,
            ids: Arc::new(GuidGenerator),
            participant_timeout: DEFAULT_PARTICIPANT_TIMEOUT,
            inbound_trunk_lock: Mutex::new(()),
            dispatch_rule_lock: Mutex::new(()),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_participant_timeout(mut self, timeout: Duration) -> Self {
        self.participant_timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    fn admin_store(&self, ctx: &RequestContext) -> Result<&Arc<dyn SipStore>> {
        self.permissions.ensure_sip_admin(ctx)?;
        self.store.as_ref().ok_or(DomainError::StoreUnavailable)
    }

    fn check(
        &self,
        result: std::result::Result<(), ValidationError>,
        kind: &'static str,
        log: &LogContext,
    ) -> Result<()> {
        result.map_err(|err| {
            record_validation_rejection(kind);
            log.warn("rejected SIP configuration", &err);
            DomainError::from(err)
        })
    }

    /// Create a trunk in the legacy combined form
    pub async fn create_sip_trunk(
        &self,
        ctx: &RequestContext,
        req: CreateSipTrunkRequest,
    ) -> Result<SipTrunkInfo> {
        let store = self.admin_store(ctx)?;
        if !req.inbound_numbers_regex.is_empty() {
            return Err(ValidationError::DeprecatedNumbersRegex.into());
        }

        let mut info = req.to_info();
        let log = LogContext::new().with("trunkName", &info.name);

        let _guard = self.inbound_trunk_lock.lock().await;
        let mut trunks = store.list_sip_inbound_trunk().await.map_err(|err| {
            log.error("cannot list SIP trunks", &err);
            err
        })?;
        trunks.push(info.as_inbound());
        self.check(validate_trunks(&trunks), "trunk", &log)?;

        info.sip_trunk_id = self.ids.generate(IdPrefix::SipTrunk);
        let log = log.with("sipTrunk", &info.sip_trunk_id);
        store.store_sip_trunk(&info).await.map_err(|err| {
            log.error("cannot store SIP trunk", &err);
            err
        })?;

        record_config_created("trunk");
        log.info("created SIP trunk");
        Ok(info)
    }

    pub async fn create_sip_inbound_trunk(
        &self,
        ctx: &RequestContext,
        req: CreateSipInboundTrunkRequest,
    ) -> Result<SipInboundTrunkInfo> {
        let store = self.admin_store(ctx)?;
        let mut info = req
            .trunk
            .ok_or_else(|| DomainError::InvalidInput("trunk info is required".to_string()))?;
        if !info.sip_trunk_id.is_empty() {
            return Err(DomainError::InvalidInput(
                "trunk ID must not be set".to_string(),
            ));
        }
        let log = LogContext::new().with("trunkName", &info.name);

        let _guard = self.inbound_trunk_lock.lock().await;
        let mut trunks = store.list_sip_inbound_trunk().await.map_err(|err| {
            log.error("cannot list SIP trunks", &err);
            err
        })?;
        trunks.push(info.clone());
        self.check(validate_trunks(&trunks), "inbound_trunk", &log)?;

        info.sip_trunk_id = self.ids.generate(IdPrefix::SipTrunk);
        let log = log.with("sipTrunk", &info.sip_trunk_id);
        store.store_sip_inbound_trunk(&info).await.map_err(|err| {
            log.error("cannot store SIP trunk", &err);
            err
        })?;

        record_config_created("inbound_trunk");
        log.info("created inbound SIP trunk");
        Ok(info)
    }

    /// Outbound trunks are not cross-validated; several may share a destination.
    pub async fn create_sip_outbound_trunk(
        &self,
        ctx: &RequestContext,
        req: CreateSipOutboundTrunkRequest,
    ) -> Result<SipOutboundTrunkInfo> {
        let store = self.admin_store(ctx)?;
        let mut info = req
            .trunk
            .ok_or_else(|| DomainError::InvalidInput("trunk info is required".to_string()))?;
        if !info.sip_trunk_id.is_empty() {
            return Err(DomainError::InvalidInput(
                "trunk ID must not be set".to_string(),
            ));
        }

        info.sip_trunk_id = self.ids.generate(IdPrefix::SipTrunk);
        let log = LogContext::new()
            .with("trunkName", &info.name)
            .with("sipTrunk", &info.sip_trunk_id);
        store.store_sip_outbound_trunk(&info).await.map_err(|err| {
            log.error("cannot store SIP trunk", &err);
            err
        })?;

        record_config_created("outbound_trunk");
        log.info("created outbound SIP trunk");
        Ok(info)
    }

    pub async fn get_sip_inbound_trunk(
        &self,
        ctx: &RequestContext,
        sip_trunk_id: &str,
    ) -> Result<SipInboundTrunkInfo> {
        let store = self.admin_store(ctx)?;
        store
            .load_sip_inbound_trunk(sip_trunk_id)
            .await?
            .ok_or_else(|| trunk_not_found(sip_trunk_id))
    }

    pub async fn get_sip_outbound_trunk(
        &self,
        ctx: &RequestContext,
        sip_trunk_id: &str,
    ) -> Result<SipOutboundTrunkInfo> {
        let store = self.admin_store(ctx)?;
        store
            .load_sip_outbound_trunk(sip_trunk_id)
            .await?
            .ok_or_else(|| trunk_not_found(sip_trunk_id))
    }

    pub async fn list_sip_trunk(&self, ctx: &RequestContext) -> Result<Vec<SipTrunkInfo>> {
        self.admin_store(ctx)?.list_sip_trunk().await
    }

    pub async fn list_sip_inbound_trunk(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<SipInboundTrunkInfo>> {
        self.admin_store(ctx)?.list_sip_inbound_trunk().await
    }

    pub async fn list_sip_outbound_trunk(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<SipOutboundTrunkInfo>> {
        self.admin_store(ctx)?.list_sip_outbound_trunk().await
    }

    /// Delete a trunk of any kind. Dispatch rules that name it are left alone.
    pub async fn delete_sip_trunk(
        &self,
        ctx: &RequestContext,
        sip_trunk_id: &str,
    ) -> Result<SipTrunkInfo> {
        let store = self.admin_store(ctx)?;
        if !store.delete_sip_trunk(sip_trunk_id).await? {
            return Err(trunk_not_found(sip_trunk_id));
        }
        LogContext::new()
            .with("sipTrunk", sip_trunk_id)
            .info("deleted SIP trunk");
        Ok(SipTrunkInfo {
            sip_trunk_id: sip_trunk_id.to_string(),
            ..Default::default()
        })
    }

    pub async fn create_sip_dispatch_rule(
        &self,
        ctx: &RequestContext,
        req: CreateSipDispatchRuleRequest,
    ) -> Result<SipDispatchRuleInfo> {
        let store = self.admin_store(ctx)?;
        let mut info = req.into_info();
        let log = LogContext::new()
            .with("ruleName", &info.name)
            .with("trunkIDs", info.trunk_ids.join(","));

        let _guard = self.dispatch_rule_lock.lock().await;
        let mut rules = store.list_sip_dispatch_rule().await.map_err(|err| {
            log.error("cannot list SIP dispatch rules", &err);
            err
        })?;
        rules.push(info.clone());
        self.check(validate_dispatch_rules(&rules), "dispatch_rule", &log)?;

        info.sip_dispatch_rule_id = self.ids.generate(IdPrefix::SipDispatchRule);
        let log = log.with("sipDispatchRule", &info.sip_dispatch_rule_id);
        store.store_sip_dispatch_rule(&info).await.map_err(|err| {
            log.error("cannot store SIP dispatch rule", &err);
            err
        })?;

        record_config_created("dispatch_rule");
        log.info("created SIP dispatch rule");
        Ok(info)
    }

    /// List rules, optionally only those that apply to one trunk
    pub async fn list_sip_dispatch_rule(
        &self,
        ctx: &RequestContext,
        sip_trunk_id: Option<&str>,
    ) -> Result<Vec<SipDispatchRuleInfo>> {
        let store = self.admin_store(ctx)?;
        match sip_trunk_id {
            Some(trunk) if !trunk.is_empty() => store.list_sip_dispatch_rule_by_trunk(trunk).await,
            _ => store.list_sip_dispatch_rule().await,
        }
    }

    /// Delete a rule, returning it as it was stored
    pub async fn delete_sip_dispatch_rule(
        &self,
        ctx: &RequestContext,
        sip_dispatch_rule_id: &str,
    ) -> Result<SipDispatchRuleInfo> {
        let store = self.admin_store(ctx)?;
        let info = store
            .load_sip_dispatch_rule(sip_dispatch_rule_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "SIP dispatch rule {} not found",
                    sip_dispatch_rule_id
                ))
            })?;
        store.delete_sip_dispatch_rule(&info).await?;
        LogContext::new()
            .with("sipDispatchRule", sip_dispatch_rule_id)
            .info("deleted SIP dispatch rule");
        Ok(info)
    }

    /// Dial out and join the callee to a room.
    ///
    /// The remote call gets whatever is left of the request deadline, or the
    /// configured default when there is none.
    pub async fn create_sip_participant(
        &self,
        ctx: &RequestContext,
        req: CreateSipParticipantRequest,
        opts: &ParticipantRequestOptions,
    ) -> Result<SipParticipantInfo> {
        let log = LogContext::new()
            .with("room", &req.room_name)
            .with("sipTrunk", &req.sip_trunk_id)
            .with("toUser", &req.sip_call_to);
        let ireq = self
            .create_sip_participant_request(ctx, &req, opts)
            .await
            .map_err(|err| {
                log.error("cannot create SIP participant request", &err);
                err
            })?;

        let log = log
            .with("callID", &ireq.sip_call_id)
            .with("fromUser", &ireq.number)
            .with("toHost", &ireq.address);
        let sip_call_id = ireq.sip_call_id.clone();
        let room_name = ireq.room_name.clone();

        let timeout = ctx.remaining().unwrap_or(self.participant_timeout);
        let started = Instant::now();
        // Past the caller's deadline: the call must not be placed at all.
        let result = if timeout.is_zero() {
            Err(DomainError::RemoteTimeout(timeout))
        } else {
            tokio::time::timeout(timeout, self.client.create_sip_participant(ireq, timeout))
                .await
                .unwrap_or(Err(DomainError::RemoteTimeout(timeout)))
        };

        match result {
            Ok(resp) => {
                record_participant_request("success", started.elapsed());
                log.with("participant", &resp.participant_identity)
                    .info("SIP participant created");
                Ok(SipParticipantInfo {
                    participant_id: resp.participant_id,
                    participant_identity: resp.participant_identity,
                    room_name,
                    sip_call_id,
                })
            }
            Err(err) => {
                record_participant_request(err.kind(), started.elapsed());
                log.error("cannot create SIP participant", &err);
                Err(err)
            }
        }
    }

    /// Resolve an API request against its outbound trunk.
    ///
    /// A fresh call ID is allocated on every call, before the trunk lookup.
    pub async fn create_sip_participant_request(
        &self,
        ctx: &RequestContext,
        req: &CreateSipParticipantRequest,
        opts: &ParticipantRequestOptions,
    ) -> Result<InternalCreateSipParticipantRequest> {
        self.permissions.ensure_sip_call(ctx)?;
        let store = self.store.as_ref().ok_or(DomainError::StoreUnavailable)?;

        let call_id = self.ids.generate(IdPrefix::SipCall);
        let log = LogContext::new()
            .with("callID", &call_id)
            .with("room", &req.room_name)
            .with("sipTrunk", &req.sip_trunk_id)
            .with("toUser", &req.sip_call_to)
            .with("projectID", &opts.project_id);

        if req.sip_call_to.is_empty() {
            return Err(DomainError::InvalidInput(
                "sip_call_to is required".to_string(),
            ));
        }

        let trunk = store
            .load_sip_outbound_trunk(&req.sip_trunk_id)
            .await
            .map_err(|err| {
                log.error("cannot get trunk to update sip participant", &err);
                err
            })?
            .ok_or_else(|| trunk_not_found(&req.sip_trunk_id))?;

        let number = pick_number(req, &trunk)?;
        log.info("resolved SIP participant request");
        Ok(InternalCreateSipParticipantRequest::new(
            call_id, req, &trunk, number, opts,
        ))
    }
}

fn trunk_not_found(sip_trunk_id: &str) -> DomainError {
    DomainError::NotFound(format!("SIP trunk {} not found", print_id(sip_trunk_id)))
}

/// Calling number for an outbound call: the explicit one, else any trunk number
fn pick_number(req: &CreateSipParticipantRequest, trunk: &SipOutboundTrunkInfo) -> Result<String> {
    if !req.sip_number.is_empty() {
        return Ok(req.sip_number.clone());
    }
    let numbers: Vec<&String> = trunk.numbers.iter().filter(|n| !n.is_empty()).collect();
    numbers
        .choose(&mut rand::thread_rng())
        .map(|n| n.to_string())
        .ok_or_else(|| {
            DomainError::InvalidInput(format!(
                "no number specified and trunk {} has no numbers",
                trunk.sip_trunk_id
            ))
        })
}
