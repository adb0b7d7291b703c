// src/modules/crisis.rs

//! Invariant registry and periodic invariant checks.
//!
//! A broken invariant is consensus-critical: the check returns
//! [`NmxError::InvariantBroken`], which the driver treats as fatal.

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::{msg_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Invariant check; `Some(detail)` names the violating entity
pub type InvariantFn = Box<dyn Fn(&mut Context<'_>) -> Result<Option<String>> + Send + Sync>;

struct Invariant {
    module: &'static str,
    route: &'static str,
    check: InvariantFn,
}

/// Ordered list of registered invariants
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Invariant>,
}

impl fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.invariants.iter().map(|i| format!("{}/{}", i.module, i.route)))
            .finish()
    }
}

impl InvariantRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module/route`
    pub fn register<F>(&mut self, module: &'static str, route: &'static str, check: F)
    where
        F: Fn(&mut Context<'_>) -> Result<Option<String>> + Send + Sync + 'static,
    {
        self.invariants.push(Invariant {
            module,
            route,
            check: Box::new(check),
        });
    }

    /// Registered routes as `module/route`
    pub fn routes(&self) -> Vec<String> {
        self.invariants
            .iter()
            .map(|i| format!("{}/{}", i.module, i.route))
            .collect()
    }

    /// Runs one invariant
    pub fn check(&self, ctx: &mut Context<'_>, module: &str, route: &str) -> Result<()> {
        let invariant = self
            .invariants
            .iter()
            .find(|i| i.module == module && i.route == route)
            .ok_or_else(|| NmxError::NotFound(format!("invariant {}/{}", module, route)))?;
        Self::run(invariant, ctx)
    }

    /// Runs every invariant in registration order
    pub fn assert_all(&self, ctx: &mut Context<'_>) -> Result<()> {
        for invariant in &self.invariants {
            Self::run(invariant, ctx)?;
        }
        debug!("{} invariants hold at height {}", self.invariants.len(), ctx.height());
        Ok(())
    }

    fn run(invariant: &Invariant, ctx: &mut Context<'_>) -> Result<()> {
        if let Some(detail) = (invariant.check)(ctx)? {
            error!(
                "invariant {}/{} broken at height {}: {}",
                invariant.module,
                invariant.route,
                ctx.height(),
                detail
            );
            return Err(NmxError::InvariantBroken {
                module: invariant.module.to_string(),
                route: invariant.route.to_string(),
                detail,
            });
        }
        Ok(())
    }
}

/// Asks the chain to verify one invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVerifyInvariant {
    /// Requesting account
    pub sender: AccAddress,
    /// Module owning the invariant
    pub module: String,
    /// Invariant route
    pub route: String,
}

impl MsgVerifyInvariant {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.sender
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.module.is_empty() || self.route.is_empty() {
            return Err(NmxError::InvalidMessage("invariant module and route are required".into()));
        }
        Ok(())
    }
}

/// Crisis genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisGenesis {}

/// Crisis module
pub struct CrisisModule {
    registry: Arc<InvariantRegistry>,
    check_period: u64,
}

impl CrisisModule {
    /// Creates the module
    ///
    /// # Arguments
    /// * `registry` - Invariants of every other module
    /// * `check_period` - Check every this many blocks, 0 for never
    pub fn new(registry: Arc<InvariantRegistry>, check_period: u64) -> Self {
        Self {
            registry,
            check_period,
        }
    }

    /// Registered invariants
    pub fn registry(&self) -> &InvariantRegistry {
        &self.registry
    }
}

impl fmt::Debug for CrisisModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrisisModule")
            .field("check_period", &self.check_period)
            .field("registry", &self.registry)
            .finish()
    }
}

impl AppModule for CrisisModule {
    fn name(&self) -> &'static str {
        names::CRISIS
    }

    fn end_block(&self, ctx: &mut Context<'_>) -> Result<Vec<crate::abci::ValidatorUpdate>> {
        if self.check_period > 0 && ctx.height() % self.check_period == 0 {
            self.registry.assert_all(ctx)?;
        }
        Ok(Vec::new())
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::VerifyInvariant(m) => {
                self.registry.check(ctx, &m.module, &m.route)?;
                msg_result(&())
            }
            other => Err(NmxError::UnknownRequest(format!("crisis cannot handle {}", other.type_name()))),
        }
    }
}
