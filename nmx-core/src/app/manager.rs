// src/app/manager.rs

//! Module registry and per-phase dispatch order.
//!
//! Modules are looked up by name; the three orders are plain lists of
//! names so a node can override them from its configuration.

use crate::abci::ValidatorUpdate;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::crisis::InvariantRegistry;
use crate::modules::AppModule;
use crate::store::names;
use crate::tx::Msg;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Registered module
pub type BoxedModule = Box<dyn AppModule + Send + Sync>;

/// Dispatch orders of the three block phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOrders {
    /// InitChain and genesis export
    pub init_genesis: Vec<String>,
    /// BeginBlock hooks
    pub begin_block: Vec<String>,
    /// EndBlock hooks
    pub end_block: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ModuleOrders {
    fn default() -> Self {
        use crate::modules::genutil::MODULE_NAME as GENUTIL;
        use names::*;
        Self {
            init_genesis: owned(&[
                CAPABILITY,
                AUTH,
                BANK,
                DISTRIBUTION,
                STAKING,
                SLASHING,
                CRISIS,
                GENUTIL,
                EVIDENCE,
                PARAMS,
                UPGRADE,
                NEUROPOS,
                TRUTHGPT,
                DYNACONTRACTS,
                HYPERCHAINS,
            ]),
            begin_block: owned(&[
                UPGRADE,
                CAPABILITY,
                CRISIS,
                STAKING,
                DISTRIBUTION,
                SLASHING,
                EVIDENCE,
                AUTH,
                BANK,
                GENUTIL,
                PARAMS,
                NEUROPOS,
                TRUTHGPT,
                DYNACONTRACTS,
                HYPERCHAINS,
            ]),
            end_block: owned(&[
                CRISIS,
                CAPABILITY,
                AUTH,
                BANK,
                DISTRIBUTION,
                SLASHING,
                EVIDENCE,
                GENUTIL,
                PARAMS,
                UPGRADE,
                NEUROPOS,
                TRUTHGPT,
                DYNACONTRACTS,
                HYPERCHAINS,
                STAKING,
            ]),
        }
    }
}

/// Modules by name plus the orders they run in
pub struct ModuleManager {
    modules: BTreeMap<&'static str, BoxedModule>,
    orders: ModuleOrders,
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("orders", &self.orders)
            .finish()
    }
}

impl ModuleManager {
    /// Registers `modules` and checks that every order is a permutation of them
    pub fn new(modules: Vec<BoxedModule>, orders: ModuleOrders) -> Result<Self> {
        let mut registered = BTreeMap::new();
        for module in modules {
            let name = module.name();
            if registered.insert(name, module).is_some() {
                return Err(NmxError::InvalidState(format!("module {} registered twice", name)));
            }
        }
        let manager = Self {
            modules: registered,
            orders,
        };
        manager.check_order("init_genesis", &manager.orders.init_genesis)?;
        manager.check_order("begin_block", &manager.orders.begin_block)?;
        manager.check_order("end_block", &manager.orders.end_block)?;
        Ok(manager)
    }

    fn check_order(&self, phase: &str, order: &[String]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for name in order {
            if !self.modules.contains_key(name.as_str()) {
                return Err(NmxError::InvalidState(format!(
                    "{} order names unknown module {}",
                    phase, name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(NmxError::InvalidState(format!("{} order lists {} twice", phase, name)));
            }
        }
        if let Some(missing) = self.modules.keys().find(|n| !seen.contains(**n)) {
            return Err(NmxError::InvalidState(format!("{} order omits module {}", phase, missing)));
        }
        Ok(())
    }

    /// Registered module names in ascending order
    pub fn names(&self) -> Vec<&'static str> {
        self.modules.keys().copied().collect()
    }

    /// Orders in force
    pub fn orders(&self) -> &ModuleOrders {
        &self.orders
    }

    /// Module registered under `name`
    pub fn module(&self, name: &str) -> Result<&BoxedModule> {
        self.modules
            .get(name)
            .ok_or_else(|| NmxError::UnknownRequest(format!("unknown module {}", name)))
    }

    fn in_order<'a>(&'a self, order: &'a [String]) -> impl Iterator<Item = &'a BoxedModule> + 'a {
        order.iter().filter_map(move |name| self.modules.get(name.as_str()))
    }

    /// Collects every module's invariants, in module name order
    pub fn register_invariants(&self, registry: &mut InvariantRegistry) {
        for module in self.modules.values() {
            module.register_invariants(registry);
        }
    }

    /// Stateless checks of every genesis section
    pub fn validate_genesis(&self, state: &AppState) -> Result<()> {
        for module in self.in_order(&self.orders.init_genesis) {
            module.validate_genesis(state)?;
        }
        Ok(())
    }

    /// Writes every genesis section in InitGenesis order
    pub fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        for module in self.in_order(&self.orders.init_genesis) {
            module.init_genesis(ctx, state)?;
            debug!("initialised genesis of {}", module.name());
        }
        Ok(())
    }

    /// Reads every module back into an [`AppState`]
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<AppState> {
        let mut state = AppState::default();
        for module in self.in_order(&self.orders.init_genesis) {
            module.export_genesis(ctx, &mut state)?;
        }
        Ok(state)
    }

    /// Runs the BeginBlock hooks
    pub fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        for module in self.in_order(&self.orders.begin_block) {
            module.begin_block(ctx)?;
        }
        Ok(())
    }

    /// Runs the EndBlock hooks
    ///
    /// At most one module may report validator updates.
    pub fn end_block(&self, ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
        let mut reported: Option<(&'static str, Vec<ValidatorUpdate>)> = None;
        for module in self.in_order(&self.orders.end_block) {
            let updates = module.end_block(ctx)?;
            if updates.is_empty() {
                continue;
            }
            if let Some((first, _)) = &reported {
                return Err(NmxError::InvalidState(format!(
                    "validator updates from both {} and {}",
                    first,
                    module.name()
                )));
            }
            reported = Some((module.name(), updates));
        }
        Ok(reported.map(|(_, updates)| updates).unwrap_or_default())
    }

    /// Executes one message in the module it routes to
    pub fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        self.module(msg.route())?.handle(ctx, msg)
    }

    /// Answers a custom query
    pub fn query(&self, ctx: &mut Context<'_>, module: &str, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.module(module)?.query(ctx, endpoint, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use crate::context::ExecMode;
    use crate::events::Event;
    use nmx_crypto::PublicKey;

    struct Recorder {
        name: &'static str,
        updates: bool,
    }

    impl AppModule for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
            ctx.emit(Event::new(self.name));
            Ok(())
        }

        fn end_block(&self, _ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
            if !self.updates {
                return Ok(Vec::new());
            }
            Ok(vec![ValidatorUpdate {
                pub_key: PublicKey([1u8; 32]),
                power: 1,
            }])
        }
    }

    fn create_test_orders(order: &[&str]) -> ModuleOrders {
        ModuleOrders {
            init_genesis: owned(order),
            begin_block: owned(order),
            end_block: owned(order),
        }
    }

    fn create_test_modules(updating: &[&'static str]) -> Vec<BoxedModule> {
        ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                Box::new(Recorder {
                    name,
                    updates: updating.contains(&name),
                }) as BoxedModule
            })
            .collect()
    }

    #[test]
    fn test_begin_block_follows_order() {
        let manager = ModuleManager::new(create_test_modules(&[]), create_test_orders(&["c", "a", "b"])).unwrap();
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::BeginBlock);
        manager.begin_block(&mut ctx).unwrap();
        let kinds: Vec<&str> = ctx.events().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_order_must_be_permutation() {
        for order in [&["a", "b"][..], &["a", "b", "b", "c"], &["a", "b", "c", "d"]] {
            assert!(matches!(
                ModuleManager::new(create_test_modules(&[]), create_test_orders(order)),
                Err(NmxError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn test_single_module_reports_updates() {
        let orders = create_test_orders(&["a", "b", "c"]);
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::EndBlock);

        let manager = ModuleManager::new(create_test_modules(&["c"]), orders.clone()).unwrap();
        assert_eq!(manager.end_block(&mut ctx).unwrap().len(), 1);

        let manager = ModuleManager::new(create_test_modules(&["a", "c"]), orders).unwrap();
        assert!(manager.end_block(&mut ctx).is_err());
    }

    #[test]
    fn test_default_orders_cover_same_modules() {
        let orders = ModuleOrders::default();
        let mut init = orders.init_genesis.clone();
        let mut begin = orders.begin_block.clone();
        let mut end = orders.end_block.clone();
        init.sort();
        begin.sort();
        end.sort();
        assert_eq!(init, begin);
        assert_eq!(begin, end);
        assert_eq!(init.len(), 15);
        assert_eq!(orders.begin_block[0], names::UPGRADE);
        assert_eq!(orders.end_block.last().map(String::as_str), Some(names::STAKING));
    }
}
