// src/node.rs

//! Main node orchestration.
//!
//! [`NmxNode`] is a single-validator host: on every tick of the block
//! interval it drains the mempool into a block, drives the application
//! through BeginBlock, DeliverTx, EndBlock and Commit, persists the
//! committed snapshot and rechecks what is left in the mempool.
//!
//! The application sits behind a `tokio::sync::Mutex`; it is the only
//! writer. Each commit is published on a watch channel so that readers can
//! work on the immutable snapshot without taking the lock.

use crate::{Mempool, NodeConfig, NodeError, Result};
use nmx_core::abci::{
    CheckTxType, Header, LastCommitInfo, RequestBeginBlock, RequestEndBlock, RequestInitChain, RequestQuery,
    ResponseCheckTx, ResponseInfo, ResponseQuery, ValidatorUpdate, VoteInfo, VoteValidator,
};
use nmx_core::modules::staking::Validator;
use nmx_core::modules::upgrade::UpgradeKeeper;
use nmx_core::nmx_crypto::hash::Hash;
use nmx_core::store::{names, Snapshot, VersionedStore};
use nmx_core::{App, GenesisDoc, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Host-side state persisted next to the store snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NodeState {
    /// Height of the snapshot this state belongs to
    height: u64,
    /// Time of the last committed block
    last_block_time: Timestamp,
    /// Current validator set
    validators: Vec<ValidatorUpdate>,
    /// Set that signed the last committed block
    signers: Vec<ValidatorUpdate>,
}

struct Chain {
    app: App,
    state: NodeState,
}

/// Latest commit as seen by readers
#[derive(Debug, Clone)]
pub struct CommittedBlock {
    /// Committed height
    pub height: u64,
    /// App hash after the block
    pub app_hash: Vec<u8>,
    /// Committed state
    pub snapshot: Arc<Snapshot>,
}

/// Outcome of one produced block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    /// Committed height
    pub height: u64,
    /// App hash after the block
    pub app_hash: Vec<u8>,
    /// Transactions included
    pub txs: usize,
    /// Included transactions that failed
    pub failed: usize,
    /// Validator power changes returned by EndBlock
    pub validator_updates: usize,
}

/// Single-validator NMX node
pub struct NmxNode {
    /// Node configuration
    config: NodeConfig,

    /// Application and host state
    chain: Mutex<Chain>,

    /// Mempool
    mempool: Mempool,

    /// Commit notifications
    commits: watch::Sender<CommittedBlock>,
}

impl NmxNode {
    /// Creates a node, restoring the last snapshot or starting from genesis
    pub async fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.chain.data_dir)?;
        info!("Initializing NMX node in {}", config.chain.data_dir.display());

        let snapshot_path = config.snapshot_path();
        let chain = if snapshot_path.exists() {
            restore(&config, &snapshot_path)?
        } else {
            start_from_genesis(&config)?
        };

        let latest = chain.app.store().latest();
        let (commits, _) = watch::channel(CommittedBlock {
            height: latest.height,
            app_hash: latest.app_hash.to_vec(),
            snapshot: latest,
        });
        info!(
            "✅ NMX node ready for chain {} at height {}",
            chain.app.chain_id(),
            chain.app.last_height()
        );

        Ok(Self {
            mempool: Mempool::new(config.mempool.max_size),
            config,
            chain: Mutex::new(chain),
            commits,
        })
    }

    /// Node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Pending transactions
    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Receiver of every future commit
    pub fn subscribe(&self) -> watch::Receiver<CommittedBlock> {
        self.commits.subscribe()
    }

    /// `Info` of the application
    pub async fn info(&self) -> ResponseInfo {
        self.chain.lock().await.app.info()
    }

    /// `Query` against a committed version
    pub async fn query(&self, req: &RequestQuery) -> ResponseQuery {
        self.chain.lock().await.app.query(req)
    }

    /// Admits an encoded transaction
    ///
    /// The transaction runs through `CheckTx`; only an accepted one enters
    /// the mempool. The response is returned either way.
    pub async fn submit_tx(&self, bytes: Vec<u8>) -> Result<(Hash, ResponseCheckTx)> {
        let hash = crate::mempool::tx_hash(&bytes)?;
        let mut chain = self.chain.lock().await;
        if self.mempool.contains(&hash).await {
            return Ok((hash, ResponseCheckTx::default()));
        }
        let resp = chain.app.check_tx(&bytes, CheckTxType::New);
        if resp.code == 0 {
            self.mempool.add_transaction(bytes).await?;
            debug!("admitted tx {}", hex::encode(hash));
        } else {
            debug!("rejected tx {} with code {}: {}", hex::encode(hash), resp.code, resp.log);
        }
        Ok((hash, resp))
    }

    /// Whether the configured halt height has been committed
    pub async fn halted(&self) -> bool {
        let halt = self.config.chain.halt_height;
        halt > 0 && self.chain.lock().await.app.last_height() >= halt
    }

    /// Produces, commits and persists one block
    pub async fn produce_block(&self) -> Result<BlockSummary> {
        let mut chain = self.chain.lock().await;
        let Chain { app, state } = &mut *chain;

        let chain_id = app.chain_id().to_string();
        let height = app.last_height() + 1;
        let time = next_block_time(state.last_block_time);
        let proposer = state
            .validators
            .iter()
            .max_by_key(|v| v.power)
            .map(|v| v.pub_key.consensus_address())
            .ok_or_else(|| NodeError::StateError("validator set is empty".into()))?;
        let votes = state
            .signers
            .iter()
            .map(|v| VoteInfo {
                validator: VoteValidator {
                    address: v.pub_key.consensus_address(),
                    power: v.power,
                },
                signed_last_block: true,
            })
            .collect();

        app.begin_block(RequestBeginBlock {
            header: Header {
                chain_id,
                height,
                time,
                proposer_address: proposer,
            },
            last_commit_info: LastCommitInfo { round: 0, votes },
            byzantine_validators: Vec::new(),
        })?;

        let txs = self.mempool.reap(self.config.consensus.max_txs_per_block).await;
        let mut failed = 0;
        for (hash, bytes) in &txs {
            let resp = app.deliver_tx(bytes)?;
            if !resp.is_ok() {
                failed += 1;
                debug!("tx {} failed with code {}: {}", hex::encode(hash), resp.code, resp.log);
            }
        }

        let end = app.end_block(RequestEndBlock { height })?;
        let commit = app.commit()?;

        state.signers = state.validators.clone();
        apply_validator_updates(&mut state.validators, &end.validator_updates);
        state.height = height;
        state.last_block_time = time;
        persist(&self.config, app, state)?;

        let mut dropped = 0;
        for (hash, bytes) in self.mempool.snapshot().await {
            if app.check_tx(&bytes, CheckTxType::Recheck).code != 0 {
                self.mempool.remove_transaction(&hash).await;
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("recheck dropped {} pending txs", dropped);
        }

        self.commits.send_replace(CommittedBlock {
            height,
            app_hash: commit.data.clone(),
            snapshot: app.store().latest(),
        });
        info!(
            "produced block {} with {} txs ({} failed), app hash {}",
            height,
            txs.len(),
            failed,
            hex::encode(&commit.data)
        );

        Ok(BlockSummary {
            height,
            app_hash: commit.data,
            txs: txs.len(),
            failed,
            validator_updates: end.validator_updates.len(),
        })
    }

    /// Produces blocks on the configured interval
    ///
    /// Returns after the halt height is committed or on Ctrl-C. Any fatal
    /// application error stops the loop and is returned.
    pub async fn run(&self) -> Result<()> {
        info!("🚀 Starting NMX node, block interval {:?}", self.config.block_interval());
        let mut ticker = tokio::time::interval(self.config.block_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.halted().await {
                info!("halt height {} reached, stopping", self.config.chain.halt_height);
                return Ok(());
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.produce_block().await?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }
}

fn start_from_genesis(config: &NodeConfig) -> Result<Chain> {
    let genesis = GenesisDoc::from_file(&config.chain.genesis_file)
        .map_err(|e| NodeError::GenesisError(format!("{}: {}", config.chain.genesis_file.display(), e)))?;
    if !config.chain.chain_id.is_empty() && config.chain.chain_id != genesis.chain_id {
        return Err(NodeError::GenesisError(format!(
            "genesis is for chain {}, configured chain is {}",
            genesis.chain_id, config.chain.chain_id
        )));
    }

    let mut app = App::new(config.app_options(&genesis.chain_id))?;
    let resp = app.init_chain(RequestInitChain {
        time: genesis.genesis_time,
        chain_id: genesis.chain_id.clone(),
        consensus_params: genesis.consensus_params.clone(),
        validators: Vec::new(),
        app_state_bytes: genesis.app_state.to_json()?,
        initial_height: genesis.initial_height,
    })?;
    if resp.validators.is_empty() {
        return Err(NodeError::GenesisError("genesis defines no validators".into()));
    }
    info!(
        "initialized chain {} with {} validators",
        genesis.chain_id,
        resp.validators.len()
    );

    Ok(Chain {
        app,
        state: NodeState {
            height: genesis.initial_height - 1,
            last_block_time: genesis.genesis_time,
            validators: resp.validators,
            signers: Vec::new(),
        },
    })
}

fn restore(config: &NodeConfig, snapshot_path: &Path) -> Result<Chain> {
    let store = VersionedStore::load_from_file(snapshot_path, names::ALL, config.chain.keep_recent)?;
    let height = store.last_height();

    let saved: Option<NodeState> = match std::fs::read(config.state_path()) {
        Ok(bytes) => Some(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return Err(err.into()),
    };
    let chain_id = if config.chain.chain_id.is_empty() {
        GenesisDoc::from_file(&config.chain.genesis_file)
            .map(|g| g.chain_id)
            .map_err(|e| NodeError::GenesisError(format!("chain id of restored store: {}", e)))?
    } else {
        config.chain.chain_id.clone()
    };
    let app = App::with_store(store, config.app_options(&chain_id), UpgradeKeeper::new())?;

    let state = match saved {
        Some(state) if state.height == height => state,
        other => {
            if other.is_some() {
                warn!("node state does not match snapshot height {}, rebuilding it", height);
            }
            let validators = bonded_validators(&app)?;
            NodeState {
                height,
                last_block_time: Timestamp::EPOCH,
                signers: validators.clone(),
                validators,
            }
        }
    };
    info!("restored chain {} at height {}", chain_id, height);
    Ok(Chain { app, state })
}

fn bonded_validators(app: &App) -> Result<Vec<ValidatorUpdate>> {
    let resp = app.query(&RequestQuery {
        path: "custom/staking/validators".into(),
        ..Default::default()
    });
    if resp.code != 0 {
        return Err(NodeError::StateError(format!("validator query failed: {}", resp.log)));
    }
    let validators: Vec<Validator> = serde_json::from_slice(&resp.value)?;
    Ok(validators
        .into_iter()
        .filter(|v| v.consensus_power() > 0)
        .map(|v| ValidatorUpdate {
            power: v.consensus_power(),
            pub_key: v.consensus_pubkey,
        })
        .collect())
}

fn persist(config: &NodeConfig, app: &App, state: &NodeState) -> Result<()> {
    let snapshot = config.snapshot_path();
    let staged = snapshot.with_extension("tmp");
    app.store().save_to_file(&staged)?;
    std::fs::rename(&staged, &snapshot)?;
    std::fs::write(config.state_path(), serde_json::to_vec_pretty(state)?)?;
    Ok(())
}

fn apply_validator_updates(set: &mut Vec<ValidatorUpdate>, updates: &[ValidatorUpdate]) {
    for update in updates {
        let existing = set.iter().position(|v| v.pub_key == update.pub_key);
        match (existing, update.power) {
            (Some(i), 0) => {
                set.remove(i);
            }
            (Some(i), power) => set[i].power = power,
            (None, 0) => {}
            (None, _) => set.push(update.clone()),
        }
    }
}

/// Wall-clock time, kept strictly after the previous block
fn next_block_time(last: Timestamp) -> Timestamp {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let now = Timestamp::from_unix_nanos(nanos);
    if now > last {
        now
    } else {
        last.add(Duration::from_millis(1))
    }
}
