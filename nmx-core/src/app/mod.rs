// src/app/mod.rs

//! The NMX application: block lifecycle driver behind the consensus ABI.
//!
//! [`App`] owns the versioned store and the module manager. The host calls
//! `init_chain` once, then for every block `begin_block`, `deliver_tx` per
//! transaction, `end_block` and `commit`. Mempool admission runs against
//! a separate check state that is reset to the committed state on every
//! commit.
//!
//! Errors returned from the lifecycle methods are fatal: the host must
//! stop. Transaction failures are reported in the response envelope
//! instead.

pub mod manager;
mod query;

pub use manager::{BoxedModule, ModuleManager, ModuleOrders};

use crate::abci::{
    record_block_evidence, RequestBeginBlock, RequestEndBlock, RequestInitChain, ResponseBeginBlock,
    ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEndBlock, ResponseInfo, ResponseInitChain,
    CheckTxType, ValidatorUpdate,
};
use crate::ante::{run_ante, AnteOptions};
use crate::context::{BlockHeader, Context, ExecMode};
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::genesis::{AppState, GenesisDoc};
use crate::math::Dec;
use crate::modules::auth::{default_module_permissions, AuthKeeper, AuthModule};
use crate::modules::bank::{BankKeeper, BankModule};
use crate::modules::capability::{CapabilityKeeper, CapabilityModule};
use crate::modules::crisis::{CrisisModule, InvariantRegistry};
use crate::modules::distribution::{DistributionKeeper, DistributionModule};
use crate::modules::dynacontracts::{DynaContractsKeeper, DynaContractsModule};
use crate::modules::evidence::{EvidenceKeeper, EvidenceModule};
use crate::modules::genutil::GenutilModule;
use crate::modules::hyperchains::{HyperChainsKeeper, HyperChainsModule};
use crate::modules::neuropos::{NeuroPoSKeeper, NeuroPoSModule, ReputationHooks};
use crate::modules::params::{ParamsKeeper, ParamsModule};
use crate::modules::slashing::{SlashingHooks, SlashingKeeper, SlashingModule};
use crate::modules::staking::{StakingKeeper, StakingModule};
use crate::modules::truthgpt::{TruthGptKeeper, TruthGptModule};
use crate::modules::upgrade::{UpgradeKeeper, UpgradeModule};
use crate::store::{names, VersionedStore};
use crate::time::Timestamp;
use crate::tx::Tx;
use nmx_crypto::ConsAddress;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Application name reported by `Info`
pub const APP_NAME: &str = "nmx";

/// Application protocol version
pub const APP_VERSION: u64 = 1;

/// Node-local application settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOptions {
    /// Expected chain id; empty accepts whatever InitChain delivers
    pub chain_id: String,
    /// Committed versions to retain, 0 keeps all
    pub keep_recent: u64,
    /// Run every invariant each this many blocks, 0 for never
    pub inv_check_period: u64,
    /// Module dispatch orders
    pub orders: ModuleOrders,
    /// Mempool admission policy
    pub ante: AnteOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            keep_recent: 0,
            inv_check_period: 0,
            orders: ModuleOrders::default(),
            ante: AnteOptions { min_gas_price: Dec::ZERO },
        }
    }
}

/// The state machine behind the consensus ABI
pub struct App {
    chain_id: String,
    store: VersionedStore,
    check_store: VersionedStore,
    manager: ModuleManager,
    registry: Arc<InvariantRegistry>,
    bank: BankKeeper,
    staking: StakingKeeper,
    options: AppOptions,
    block: Option<BlockHeader>,
    last_block_time: Timestamp,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("chain_id", &self.chain_id)
            .field("height", &self.store.last_height())
            .field("manager", &self.manager)
            .finish()
    }
}

impl App {
    /// Application over an empty store, waiting for InitChain
    pub fn new(options: AppOptions) -> Result<Self> {
        let store = VersionedStore::new(names::ALL, options.keep_recent);
        Self::with_store(store, options, UpgradeKeeper::new())
    }

    /// Application over an existing store
    ///
    /// # Arguments
    /// * `store` - Committed state, e.g. restored from a snapshot
    /// * `options` - Node settings; `chain_id` must be set for a restored store
    /// * `upgrades` - Upgrade keeper carrying the handlers this binary knows
    pub fn with_store(store: VersionedStore, options: AppOptions, upgrades: UpgradeKeeper) -> Result<Self> {
        let auth = AuthKeeper::new(default_module_permissions());
        let bank = BankKeeper::new(auth.clone());
        let staking = StakingKeeper::new(bank.clone()).with_hooks((SlashingHooks, ReputationHooks));
        let slashing = SlashingKeeper::new(staking.clone());

        let mut modules: Vec<BoxedModule> = vec![
            Box::new(AuthModule::new(auth)),
            Box::new(BankModule::new(bank.clone())),
            Box::new(CapabilityModule::new(CapabilityKeeper)),
            Box::new(DistributionModule::new(DistributionKeeper::new(staking.clone()))),
            Box::new(StakingModule::new(staking.clone())),
            Box::new(SlashingModule::new(slashing.clone())),
            Box::new(EvidenceModule::new(EvidenceKeeper::new(slashing))),
            Box::new(GenutilModule::new(staking.clone())),
            Box::new(ParamsModule),
            Box::new(UpgradeModule::new(upgrades)),
            Box::new(NeuroPoSModule::new(NeuroPoSKeeper::new(staking.clone()))),
            Box::new(TruthGptModule::new(TruthGptKeeper::new(bank.clone()))),
            Box::new(DynaContractsModule::new(DynaContractsKeeper::new(staking.clone()))),
            Box::new(HyperChainsModule::new(HyperChainsKeeper::new(staking.clone()))),
        ];
        let mut registry = InvariantRegistry::new();
        for module in &modules {
            module.register_invariants(&mut registry);
        }
        let registry = Arc::new(registry);
        modules.push(Box::new(CrisisModule::new(
            Arc::clone(&registry),
            options.inv_check_period,
        )));
        let manager = ModuleManager::new(modules, options.orders.clone())?;
        debug!("registered invariants {:?}", registry.routes());

        let check_store = VersionedStore::from_snapshot(store.latest());
        Ok(Self {
            chain_id: options.chain_id.clone(),
            store,
            check_store,
            manager,
            registry,
            bank,
            staking,
            options,
            block: None,
            last_block_time: Timestamp::EPOCH,
        })
    }

    /// Chain identifier, empty before InitChain
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Committed store
    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    /// Module registry
    pub fn manager(&self) -> &ModuleManager {
        &self.manager
    }

    /// Height of the last commit
    pub fn last_height(&self) -> u64 {
        self.store.last_height()
    }

    /// Block time of the last commit or of genesis
    pub fn last_block_time(&self) -> Timestamp {
        self.last_block_time
    }

    fn next_header(&self) -> BlockHeader {
        BlockHeader {
            chain_id: self.chain_id.clone(),
            height: self.store.last_height() + 1,
            time: self.last_block_time,
            proposer: ConsAddress::new([0u8; 20]),
        }
    }

    /// `Info`
    pub fn info(&self) -> ResponseInfo {
        ResponseInfo {
            data: APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            app_version: APP_VERSION,
            last_block_height: self.store.last_height(),
            last_block_app_hash: self.store.last_hash().to_vec(),
        }
    }

    /// `InitChain`: writes the genesis state
    ///
    /// Genesis writes are committed together with the first block.
    pub fn init_chain(&mut self, req: RequestInitChain) -> Result<ResponseInitChain> {
        if !self.chain_id.is_empty() && self.chain_id != req.chain_id {
            return Err(NmxError::InvalidState(format!(
                "InitChain for {} but the node runs {}",
                req.chain_id, self.chain_id
            )));
        }
        let initial_height = req.initial_height.max(1);
        self.store.set_initial_height(initial_height)?;
        let state = AppState::from_json(&req.app_state_bytes)?;
        self.manager.validate_genesis(&state)?;
        self.chain_id = req.chain_id.clone();

        let header = BlockHeader {
            chain_id: req.chain_id.clone(),
            height: initial_height,
            time: req.time,
            proposer: ConsAddress::new([0u8; 20]),
        };
        let mut ctx = Context::new(&mut self.store, header, ExecMode::Genesis);
        ParamsKeeper.set_consensus_params(&mut ctx, &req.consensus_params)?;
        self.manager.init_genesis(&mut ctx, &state)?;
        self.staking.apply_validator_set_updates(&mut ctx)?;
        let validators: Vec<ValidatorUpdate> = self
            .staking
            .bonded_validators(&mut ctx)?
            .into_iter()
            .map(|v| ValidatorUpdate {
                pub_key: v.consensus_pubkey,
                power: v.consensus_power(),
            })
            .collect();
        drop(ctx);

        self.last_block_time = req.time;
        self.check_store = self.store.clone();
        let app_hash = self.store.working_hash();
        info!(
            "initialised chain {} at height {} with {} validators, app hash {}",
            req.chain_id,
            initial_height,
            validators.len(),
            hex::encode(app_hash)
        );
        Ok(ResponseInitChain {
            consensus_params: req.consensus_params,
            validators: if validators.is_empty() { req.validators } else { validators },
            app_hash: app_hash.to_vec(),
        })
    }

    /// `BeginBlock`
    pub fn begin_block(&mut self, req: RequestBeginBlock) -> Result<ResponseBeginBlock> {
        if self.block.is_some() {
            return Err(NmxError::InvalidState("BeginBlock while a block is open".into()));
        }
        let expected = self.store.last_height() + 1;
        if req.header.height != expected || req.header.chain_id != self.chain_id {
            return Err(NmxError::InvalidState(format!(
                "unexpected block {}/{}, want {}/{}",
                req.header.chain_id, req.header.height, self.chain_id, expected
            )));
        }
        let header = BlockHeader {
            chain_id: req.header.chain_id.clone(),
            height: req.header.height,
            time: req.header.time,
            proposer: req.header.proposer_address,
        };
        let mut ctx = Context::new(&mut self.store, header.clone(), ExecMode::BeginBlock);
        record_block_evidence(&mut ctx, &req)?;
        self.manager.begin_block(&mut ctx)?;
        let events = ctx.take_events();
        self.block = Some(header);
        Ok(ResponseBeginBlock { events })
    }

    /// `CheckTx`: runs the ante stage against the check state
    pub fn check_tx(&mut self, bytes: &[u8], kind: CheckTxType) -> ResponseCheckTx {
        let tx = match Tx::decode(bytes) {
            Ok(tx) => tx,
            Err(err) => return check_failure(&err, 0, 0),
        };
        let header = self.next_header();
        let mut ctx = Context::new(&mut self.check_store, header, ExecMode::Check);
        let result = execute_tx(&mut ctx, &self.manager, &self.bank, &self.options.ante, &tx, bytes.len(), false);
        let gas_used = ctx.gas_meter().consumed();
        match result {
            Ok(_) => ResponseCheckTx {
                code: 0,
                log: String::new(),
                gas_wanted: tx.gas_limit,
                gas_used,
                events: ctx.take_events(),
            },
            Err(err) => {
                debug!("{:?} check of tx rejected: {}", kind, err);
                check_failure(&err, tx.gas_limit, gas_used)
            }
        }
    }

    /// `DeliverTx`
    ///
    /// Ante writes survive a failing message; message writes do not.
    ///
    /// # Errors
    /// Only fatal conditions: no open block, or an error of the invariant kind
    pub fn deliver_tx(&mut self, bytes: &[u8]) -> Result<ResponseDeliverTx> {
        let header = self
            .block
            .clone()
            .ok_or_else(|| NmxError::InvalidState("DeliverTx outside a block".into()))?;
        let tx = match Tx::decode(bytes) {
            Ok(tx) => tx,
            Err(err) => return Ok(delivery_failure(&err, 0, 0, Vec::new())),
        };
        let mut ctx = Context::new(&mut self.store, header, ExecMode::Deliver);
        let result = execute_tx(&mut ctx, &self.manager, &self.bank, &self.options.ante, &tx, bytes.len(), true);
        let gas_used = ctx.gas_meter().consumed();
        let events = ctx.take_events();
        match result {
            Ok(data) => Ok(ResponseDeliverTx {
                code: 0,
                data,
                log: String::new(),
                gas_wanted: tx.gas_limit,
                gas_used,
                events,
            }),
            Err(err) if err.is_fatal() => {
                error!("transaction at height {} hit a fatal error: {}", ctx.height(), err);
                Err(err)
            }
            Err(err) => {
                debug!("transaction failed with code {}: {}", err.code(), err);
                Ok(delivery_failure(&err, tx.gas_limit, gas_used, events))
            }
        }
    }

    /// `EndBlock`
    pub fn end_block(&mut self, req: RequestEndBlock) -> Result<ResponseEndBlock> {
        let header = self
            .block
            .clone()
            .ok_or_else(|| NmxError::InvalidState("EndBlock outside a block".into()))?;
        if req.height != header.height {
            return Err(NmxError::InvalidState(format!(
                "EndBlock for {} while block {} is open",
                req.height, header.height
            )));
        }
        let mut ctx = Context::new(&mut self.store, header, ExecMode::EndBlock);
        let validator_updates = self.manager.end_block(&mut ctx)?;
        Ok(ResponseEndBlock {
            validator_updates,
            consensus_param_updates: None,
            events: ctx.take_events(),
        })
    }

    /// `Commit`: persists the block and resets the check state
    pub fn commit(&mut self) -> Result<ResponseCommit> {
        let header = self
            .block
            .take()
            .ok_or_else(|| NmxError::InvalidState("Commit outside a block".into()))?;
        let info = self.store.commit();
        self.check_store = VersionedStore::from_snapshot(self.store.latest());
        self.last_block_time = header.time;
        let retain_height = match self.options.keep_recent {
            0 => 0,
            keep => info.height.saturating_sub(keep) + 1,
        };
        info!("committed block {} app hash {}", info.height, hex::encode(info.app_hash));
        Ok(ResponseCommit {
            data: info.app_hash.to_vec(),
            retain_height,
        })
    }

    fn committed_view(&self) -> (VersionedStore, BlockHeader) {
        let snapshot = self.store.latest();
        let header = BlockHeader {
            chain_id: self.chain_id.clone(),
            height: snapshot.height,
            time: self.last_block_time,
            proposer: ConsAddress::new([0u8; 20]),
        };
        (VersionedStore::from_snapshot(snapshot), header)
    }

    /// Runs every registered invariant against the committed state
    pub fn check_invariants(&self) -> Result<()> {
        let (mut view, header) = self.committed_view();
        let mut ctx = Context::new(&mut view, header, ExecMode::Query);
        self.registry.assert_all(&mut ctx)
    }

    /// Exports the committed state as a genesis document
    ///
    /// Importing it with the returned `initial_height` reproduces the
    /// committed app hash.
    pub fn export_genesis(&self) -> Result<GenesisDoc> {
        let (mut view, header) = self.committed_view();
        let mut ctx = Context::new(&mut view, header, ExecMode::Query);
        let app_state = self.manager.export_genesis(&mut ctx)?;
        let consensus_params = ParamsKeeper.consensus_params(&mut ctx)?;
        info!("exported genesis at height {}", self.store.last_height());
        Ok(GenesisDoc {
            genesis_time: self.last_block_time,
            chain_id: self.chain_id.clone(),
            initial_height: self.store.last_height() + 1,
            consensus_params,
            app_state,
        })
    }
}

/// Ante stage, then optionally the messages, each under its own checkpoint
fn execute_tx(
    ctx: &mut Context<'_>,
    manager: &ModuleManager,
    bank: &BankKeeper,
    ante: &AnteOptions,
    tx: &Tx,
    tx_len: usize,
    run_msgs: bool,
) -> Result<Vec<u8>> {
    ctx.set_tx(tx.hash()?);
    ctx.checkpoint();
    let signer = match run_ante(ctx, bank, ante, tx, tx_len) {
        Ok(signer) => {
            ctx.release_checkpoint()?;
            signer
        }
        Err(err) => {
            ctx.rollback()?;
            ctx.truncate_events(0);
            return Err(err);
        }
    };
    if !run_msgs {
        return Ok(Vec::new());
    }

    let ante_events = ctx.events().len();
    ctx.checkpoint();
    let mut data = Vec::new();
    let mut outcome = Ok(());
    for (index, msg) in tx.msgs.iter().enumerate() {
        ctx.set_msg_index(index as u32);
        ctx.emit(
            Event::new(types::MESSAGE)
                .attr("action", msg.type_name())
                .attr("module", msg.route())
                .attr("sender", signer),
        );
        match manager.handle(ctx, msg) {
            Ok(result) => data.extend_from_slice(&result),
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    match outcome {
        Ok(()) => {
            ctx.release_checkpoint()?;
            Ok(data)
        }
        Err(err) => {
            ctx.rollback()?;
            ctx.truncate_events(ante_events);
            Err(err)
        }
    }
}

fn check_failure(err: &NmxError, gas_wanted: u64, gas_used: u64) -> ResponseCheckTx {
    ResponseCheckTx {
        code: err.code(),
        log: err.to_string(),
        gas_wanted,
        gas_used,
        events: Vec::new(),
    }
}

fn delivery_failure(err: &NmxError, gas_wanted: u64, gas_used: u64, events: Vec<Event>) -> ResponseDeliverTx {
    ResponseDeliverTx {
        code: err.code(),
        data: Vec::new(),
        log: err.to_string(),
        gas_wanted,
        gas_used,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abci::{ConsensusParams, Header, LastCommitInfo};
    use crate::coins::Coins;
    use crate::modules::bank::{Balance, MsgSend};
    use crate::tx::TxBuilder;
    use nmx_crypto::{AccAddress, KeyPair};

    fn create_test_app(funded: &KeyPair) -> App {
        let mut app = App::new(AppOptions::default()).unwrap();
        let mut state = AppState::default();
        state.bank.balances.push(Balance {
            address: funded.account_address(),
            coins: Coins::single(crate::BOND_DENOM, 1_000u64),
        });
        state.auth.accounts.push(crate::modules::auth::Account {
            address: funded.account_address(),
            pub_key: None,
            account_number: 0,
            sequence: 0,
            module: None,
        });
        app.init_chain(RequestInitChain {
            time: Timestamp::from_unix_secs(1_700_000_000),
            chain_id: "nmx-test".into(),
            consensus_params: ConsensusParams::default(),
            validators: Vec::new(),
            app_state_bytes: state.to_json().unwrap(),
            initial_height: 1,
        })
        .unwrap();
        app
    }

    fn begin(app: &mut App, height: u64) {
        app.begin_block(RequestBeginBlock {
            header: Header {
                chain_id: "nmx-test".into(),
                height,
                time: Timestamp::from_unix_secs(1_700_000_000 + height as i64 * 5),
                proposer_address: ConsAddress::new([0u8; 20]),
            },
            last_commit_info: LastCommitInfo::default(),
            byzantine_validators: Vec::new(),
        })
        .unwrap();
    }

    fn create_test_send(key: &KeyPair, sequence: u64, amount: u64) -> Vec<u8> {
        TxBuilder::new()
            .msg(MsgSend {
                from_address: key.account_address(),
                to_address: AccAddress::new([9u8; 20]),
                amount: Coins::single(crate::BOND_DENOM, amount),
            })
            .fee(Coins::single(crate::BOND_DENOM, 10u64))
            .sign(key, "nmx-test", 0, sequence)
            .unwrap()
            .encode()
            .unwrap()
    }

    #[test]
    fn test_failed_message_keeps_ante_writes() {
        let alice = KeyPair::from_label("alice");
        let mut app = create_test_app(&alice);
        begin(&mut app, 1);

        let ok = app.deliver_tx(&create_test_send(&alice, 0, 100)).unwrap();
        assert!(ok.is_ok(), "{}", ok.log);
        assert!(ok.events.iter().any(|e| e.kind == types::MESSAGE));

        let failed = app.deliver_tx(&create_test_send(&alice, 1, 10_000)).unwrap();
        assert_eq!(failed.code, NmxError::InsufficientFunds(String::new()).code());
        assert!(failed.events.iter().all(|e| e.kind != types::MESSAGE));

        let replay = app.deliver_tx(&create_test_send(&alice, 1, 1)).unwrap();
        assert_eq!(replay.code, NmxError::WrongSequence { expected: 2, got: 1 }.code());

        app.end_block(RequestEndBlock { height: 1 }).unwrap();
        app.commit().unwrap();
        assert_eq!(app.last_height(), 1);
    }

    #[test]
    fn test_check_state_is_separate() {
        let alice = KeyPair::from_label("alice");
        let mut app = create_test_app(&alice);
        let first = app.check_tx(&create_test_send(&alice, 0, 1), CheckTxType::New);
        assert_eq!(first.code, 0, "{}", first.log);
        let again = app.check_tx(&create_test_send(&alice, 0, 1), CheckTxType::New);
        assert_ne!(again.code, 0);

        begin(&mut app, 1);
        assert!(app.deliver_tx(&create_test_send(&alice, 0, 1)).unwrap().is_ok());
        app.end_block(RequestEndBlock { height: 1 }).unwrap();
        app.commit().unwrap();
        let recheck = app.check_tx(&create_test_send(&alice, 1, 1), CheckTxType::Recheck);
        assert_eq!(recheck.code, 0, "{}", recheck.log);
    }

    #[test]
    fn test_lifecycle_guards() {
        let alice = KeyPair::from_label("alice");
        let mut app = create_test_app(&alice);
        assert!(app.deliver_tx(&[]).is_err());
        assert!(app.commit().is_err());
        let undecodable = {
            begin(&mut app, 1);
            app.deliver_tx(&[0xff, 0x01]).unwrap()
        };
        assert_ne!(undecodable.code, 0);
        assert!(app.end_block(RequestEndBlock { height: 2 }).is_err());
    }
}
