// src/modules/upgrade.rs

//! Scheduled software upgrades.
//!
//! At most one plan is pending. When the chain reaches the plan's height
//! the BeginBlock hook runs the handler registered under the plan's name
//! and records the upgrade as applied. Without a handler the hook fails
//! with [`NmxError::UpgradeNeeded`] and the node halts until a binary that
//! knows the upgrade is installed.

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::genesis::AppState;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::{id_key, names};
use crate::tx::Msg;
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

const PLAN: &[u8] = &[0x00];
const DONE: u8 = 0x01;
const AUTHORITY: &[u8] = &[0x02];

/// Upgrade plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Name the handler is registered under
    pub name: String,
    /// Height whose BeginBlock applies the upgrade
    pub height: u64,
    /// Free-form operator information
    #[serde(default)]
    pub info: String,
}

impl Plan {
    /// Stateless checks
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(NmxError::InvalidMessage("upgrade plan name is required".into()));
        }
        if self.height == 0 {
            return Err(NmxError::InvalidMessage(format!("upgrade {} at height 0", self.name)));
        }
        Ok(())
    }

    /// Whether the plan applies in a block at `height`
    pub fn is_due(&self, height: u64) -> bool {
        height >= self.height
    }
}

/// Applied upgrade and the height it ran at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedUpgrade {
    /// Plan name
    pub name: String,
    /// Height of the block that applied it
    pub height: u64,
}

/// Migration run when a plan of the same name comes due
pub type UpgradeHandler = Arc<dyn Fn(&mut Context<'_>, &Plan) -> Result<()> + Send + Sync>;

/// Upgrade genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeGenesis {
    /// Account allowed to schedule and cancel plans; none disables both
    #[serde(default)]
    pub authority: Option<AccAddress>,
    /// Pending plan
    #[serde(default)]
    pub plan: Option<Plan>,
    /// Upgrades applied so far
    #[serde(default)]
    pub done: Vec<AppliedUpgrade>,
}

/// Schedules an upgrade, replacing any pending plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgScheduleUpgrade {
    /// Upgrade authority
    pub authority: AccAddress,
    /// Plan to schedule
    pub plan: Plan,
}

impl MsgScheduleUpgrade {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.authority
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        self.plan.validate()
    }
}

/// Drops the pending plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCancelUpgrade {
    /// Upgrade authority
    pub authority: AccAddress,
}

impl MsgCancelUpgrade {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.authority
    }

    /// Stateless checks; the message carries nothing beyond its signer
    pub fn validate_basic(&self) -> Result<()> {
        Ok(())
    }
}

/// Upgrade keeper
#[derive(Clone, Default)]
pub struct UpgradeKeeper {
    handlers: Arc<BTreeMap<String, UpgradeHandler>>,
}

impl fmt::Debug for UpgradeKeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeKeeper")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl UpgradeKeeper {
    /// Keeper with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for plan `name`
    pub fn with_handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>, &Plan) -> Result<()> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.handlers).insert(name.into(), Arc::new(handler));
        self
    }

    /// Whether a handler for `name` is registered
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Pending plan
    pub fn plan(&self, ctx: &mut Context<'_>) -> Result<Option<Plan>> {
        ctx.kv(names::UPGRADE).get(PLAN)
    }

    /// Height `name` was applied at
    pub fn applied_height(&self, ctx: &mut Context<'_>, name: &str) -> Result<Option<u64>> {
        let applied: Option<AppliedUpgrade> = ctx.kv(names::UPGRADE).get(&id_key(DONE, name))?;
        Ok(applied.map(|a| a.height))
    }

    /// Every applied upgrade, by name
    pub fn applied(&self, ctx: &mut Context<'_>) -> Result<Vec<AppliedUpgrade>> {
        ctx.kv(names::UPGRADE).values(&[DONE])
    }

    fn authority(&self, ctx: &mut Context<'_>) -> Result<Option<AccAddress>> {
        ctx.kv(names::UPGRADE).get(AUTHORITY)
    }

    fn require_authority(&self, ctx: &mut Context<'_>, signer: &AccAddress) -> Result<()> {
        match self.authority(ctx)? {
            Some(authority) if authority == *signer => Ok(()),
            _ => Err(NmxError::Unauthorized(format!("{} is not the upgrade authority", signer))),
        }
    }

    /// Executes [`MsgScheduleUpgrade`]
    pub fn schedule(&self, ctx: &mut Context<'_>, msg: &MsgScheduleUpgrade) -> Result<()> {
        self.require_authority(ctx, &msg.authority)?;
        if msg.plan.height <= ctx.height() {
            return Err(NmxError::InvalidState(format!(
                "upgrade {} at height {} is not after the current height {}",
                msg.plan.name,
                msg.plan.height,
                ctx.height()
            )));
        }
        if self.applied_height(ctx, &msg.plan.name)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("upgrade {} was already applied", msg.plan.name)));
        }
        ctx.kv(names::UPGRADE).set(PLAN, &msg.plan)?;
        info!("scheduled upgrade {} at height {}", msg.plan.name, msg.plan.height);
        Ok(())
    }

    /// Executes [`MsgCancelUpgrade`]
    pub fn cancel(&self, ctx: &mut Context<'_>, msg: &MsgCancelUpgrade) -> Result<()> {
        self.require_authority(ctx, &msg.authority)?;
        let plan = self
            .plan(ctx)?
            .ok_or_else(|| NmxError::NotFound("pending upgrade plan".into()))?;
        ctx.kv(names::UPGRADE).delete(PLAN)?;
        info!("cancelled upgrade {}", plan.name);
        Ok(())
    }

    fn mark_done(&self, ctx: &mut Context<'_>, name: &str, height: u64) -> Result<()> {
        let applied = AppliedUpgrade {
            name: name.to_string(),
            height,
        };
        ctx.kv(names::UPGRADE).set(&id_key(DONE, name), &applied)
    }

    /// Applies the pending plan once its height is reached
    ///
    /// # Returns
    /// Name of the upgrade applied in this block
    pub fn begin_block(&self, ctx: &mut Context<'_>) -> Result<Option<String>> {
        let plan = match self.plan(ctx)? {
            Some(plan) if plan.is_due(ctx.height()) => plan,
            _ => return Ok(None),
        };
        let handler = match self.handlers.get(&plan.name) {
            Some(handler) => handler.clone(),
            None => {
                error!(
                    "UPGRADE \"{}\" NEEDED at height {}: {}",
                    plan.name,
                    ctx.height(),
                    plan.info
                );
                return Err(NmxError::UpgradeNeeded {
                    name: plan.name,
                    height: ctx.height(),
                });
            }
        };
        handler(ctx, &plan)?;
        let height = ctx.height();
        self.mark_done(ctx, &plan.name, height)?;
        ctx.kv(names::UPGRADE).delete(PLAN)?;
        ctx.emit(
            Event::new(types::UPGRADE)
                .attr("name", &plan.name)
                .attr("height", height),
        );
        info!("applied upgrade {} at height {}", plan.name, height);
        Ok(Some(plan.name))
    }

    /// Writes the upgrade genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &UpgradeGenesis) -> Result<()> {
        if let Some(authority) = &genesis.authority {
            ctx.kv(names::UPGRADE).set(AUTHORITY, authority)?;
        }
        if let Some(plan) = &genesis.plan {
            ctx.kv(names::UPGRADE).set(PLAN, plan)?;
        }
        for applied in &genesis.done {
            self.mark_done(ctx, &applied.name, applied.height)?;
        }
        Ok(())
    }

    /// Reads the upgrade genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<UpgradeGenesis> {
        Ok(UpgradeGenesis {
            authority: self.authority(ctx)?,
            plan: self.plan(ctx)?,
            done: self.applied(ctx)?,
        })
    }
}

/// Stateless checks of the upgrade section
pub fn validate_genesis(genesis: &UpgradeGenesis) -> Result<()> {
    let mut names = BTreeSet::new();
    for applied in &genesis.done {
        if applied.name.is_empty() || !names.insert(applied.name.as_str()) {
            return Err(NmxError::InvalidState(format!("duplicate or empty applied upgrade {:?}", applied.name)));
        }
    }
    if let Some(plan) = &genesis.plan {
        plan.validate()?;
        if names.contains(plan.name.as_str()) {
            return Err(NmxError::InvalidState(format!("pending upgrade {} was already applied", plan.name)));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct AppliedQuery {
    name: String,
}

/// Upgrade module
#[derive(Debug, Clone)]
pub struct UpgradeModule {
    keeper: UpgradeKeeper,
}

impl UpgradeModule {
    /// Wraps a keeper
    pub fn new(keeper: UpgradeKeeper) -> Self {
        Self { keeper }
    }
}

impl AppModule for UpgradeModule {
    fn name(&self) -> &'static str {
        names::UPGRADE
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        validate_genesis(&state.upgrade)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.upgrade)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.upgrade = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.begin_block(ctx).map(|_| ())
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::ScheduleUpgrade(m) => {
                self.keeper.schedule(ctx, m)?;
                msg_result(&())
            }
            Msg::CancelUpgrade(m) => {
                self.keeper.cancel(ctx, m)?;
                msg_result(&())
            }
            other => Err(NmxError::UnknownRequest(format!("upgrade cannot handle {}", other.type_name()))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "plan" => query_result(&self.keeper.plan(ctx)?),
            "applied" => {
                let q: AppliedQuery = query_params(data)?;
                query_result(&self.keeper.applied_height(ctx, &q.name)?)
            }
            _ => Err(NmxError::UnknownRequest(format!("upgrade/{}", endpoint))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use crate::context::ExecMode;

    fn create_test_authority() -> AccAddress {
        AccAddress::new([9u8; 20])
    }

    fn create_test_plan(name: &str, height: u64) -> Plan {
        Plan {
            name: name.to_string(),
            height,
            info: String::new(),
        }
    }

    fn create_test_keeper(ctx: &mut Context<'_>, keeper: &UpgradeKeeper) {
        keeper
            .init_genesis(
                ctx,
                &UpgradeGenesis {
                    authority: Some(create_test_authority()),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn test_missing_handler_halts_at_height() {
        let mut store = create_test_store();
        let keeper = UpgradeKeeper::new();
        {
            let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
            create_test_keeper(&mut ctx, &keeper);
            let msg = MsgScheduleUpgrade {
                authority: create_test_authority(),
                plan: create_test_plan("v2", 3),
            };
            keeper.schedule(&mut ctx, &msg).unwrap();
        }
        {
            let mut ctx = Context::new(&mut store, create_test_header(2), ExecMode::BeginBlock);
            assert_eq!(keeper.begin_block(&mut ctx).unwrap(), None);
        }
        let mut ctx = Context::new(&mut store, create_test_header(3), ExecMode::BeginBlock);
        let err = keeper.begin_block(&mut ctx).unwrap_err();
        assert_eq!(
            err,
            NmxError::UpgradeNeeded {
                name: "v2".into(),
                height: 3
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_registered_handler_runs_once() {
        let mut store = create_test_store();
        let keeper = UpgradeKeeper::new().with_handler("v2", |ctx, plan| {
            ctx.kv(names::UPGRADE).set(b"migrated", &plan.height)
        });
        let mut ctx = Context::new(&mut store, create_test_header(5), ExecMode::BeginBlock);
        keeper
            .init_genesis(
                &mut ctx,
                &UpgradeGenesis {
                    authority: None,
                    plan: Some(create_test_plan("v2", 5)),
                    done: Vec::new(),
                },
            )
            .unwrap();
        assert_eq!(keeper.begin_block(&mut ctx).unwrap(), Some("v2".to_string()));
        assert_eq!(ctx.kv(names::UPGRADE).get::<u64>(b"migrated").unwrap(), Some(5));
        assert_eq!(keeper.plan(&mut ctx).unwrap(), None);
        assert_eq!(keeper.applied_height(&mut ctx, "v2").unwrap(), Some(5));
        assert_eq!(keeper.begin_block(&mut ctx).unwrap(), None);
        assert!(ctx.events().iter().any(|e| e.kind == types::UPGRADE));
    }

    #[test]
    fn test_schedule_checks() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(10), ExecMode::Deliver);
        let keeper = UpgradeKeeper::new();
        keeper
            .init_genesis(
                &mut ctx,
                &UpgradeGenesis {
                    authority: Some(create_test_authority()),
                    plan: None,
                    done: vec![AppliedUpgrade {
                        name: "v1".into(),
                        height: 4,
                    }],
                },
            )
            .unwrap();

        let stranger = MsgScheduleUpgrade {
            authority: AccAddress::new([1u8; 20]),
            plan: create_test_plan("v2", 20),
        };
        assert!(matches!(keeper.schedule(&mut ctx, &stranger), Err(NmxError::Unauthorized(_))));

        let past = MsgScheduleUpgrade {
            authority: create_test_authority(),
            plan: create_test_plan("v2", 10),
        };
        assert!(matches!(keeper.schedule(&mut ctx, &past), Err(NmxError::InvalidState(_))));

        let repeat = MsgScheduleUpgrade {
            authority: create_test_authority(),
            plan: create_test_plan("v1", 20),
        };
        assert!(matches!(keeper.schedule(&mut ctx, &repeat), Err(NmxError::AlreadyExists(_))));

        let ok = MsgScheduleUpgrade {
            authority: create_test_authority(),
            plan: create_test_plan("v2", 20),
        };
        keeper.schedule(&mut ctx, &ok).unwrap();
        let cancel = MsgCancelUpgrade {
            authority: create_test_authority(),
        };
        keeper.cancel(&mut ctx, &cancel).unwrap();
        assert_eq!(keeper.plan(&mut ctx).unwrap(), None);
        assert!(matches!(keeper.cancel(&mut ctx, &cancel), Err(NmxError::NotFound(_))));
    }

    #[test]
    fn test_genesis_rejects_applied_plan() {
        let genesis = UpgradeGenesis {
            authority: None,
            plan: Some(create_test_plan("v1", 9)),
            done: vec![AppliedUpgrade {
                name: "v1".into(),
                height: 4,
            }],
        };
        assert!(validate_genesis(&genesis).is_err());
    }
}
