// src/abci.rs

//! Request and response types of the host consensus interface.
//!
//! These are plain Rust structs. Protobuf framing belongs to the host
//! adapter; the application only sees the decoded fields it needs.

use crate::context::{Context, BLOCK_SCOPE};
use crate::errors::{NmxError, Result};
use crate::events::Event;
use crate::store::StoreProof;
use crate::time::Timestamp;
use nmx_crypto::{ConsAddress, PublicKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Block-level consensus limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    /// Maximum block size in bytes
    pub max_bytes: u64,
    /// Maximum gas per block, -1 for unlimited
    pub max_gas: i64,
}

/// Evidence admissibility limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParams {
    /// Evidence older than this many blocks (and `max_age_duration`) is dropped
    pub max_age_num_blocks: u64,
    /// Evidence older than this (and `max_age_num_blocks`) is dropped
    pub max_age_duration: Duration,
    /// Maximum evidence bytes per block
    pub max_bytes: u64,
}

/// Accepted validator key types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorParams {
    /// Key type names
    pub pub_key_types: Vec<String>,
}

/// Consensus parameters exchanged with the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Block limits
    pub block: BlockParams,
    /// Evidence limits
    pub evidence: EvidenceParams,
    /// Validator key types
    pub validator: ValidatorParams,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            block: BlockParams {
                max_bytes: 22_020_096,
                max_gas: -1,
            },
            evidence: EvidenceParams {
                max_age_num_blocks: 100_000,
                max_age_duration: Duration::from_secs(48 * 3_600),
                max_bytes: 1_048_576,
            },
            validator: ValidatorParams {
                pub_key_types: vec!["ed25519".to_string()],
            },
        }
    }
}

/// Validator power change for the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    /// Consensus public key
    pub pub_key: PublicKey,
    /// New power; 0 removes the validator
    pub power: i64,
}

/// `Info` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    /// Application name
    pub data: String,
    /// Software version
    pub version: String,
    /// Application protocol version
    pub app_version: u64,
    /// Height of the last commit
    pub last_block_height: u64,
    /// App hash of the last commit
    pub last_block_app_hash: Vec<u8>,
}

/// `InitChain` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInitChain {
    /// Genesis time
    pub time: Timestamp,
    /// Chain identifier
    pub chain_id: String,
    /// Initial consensus parameters
    pub consensus_params: ConsensusParams,
    /// Validators proposed by the host; ignored when genesis defines them
    pub validators: Vec<ValidatorUpdate>,
    /// JSON app state keyed by module name
    pub app_state_bytes: Vec<u8>,
    /// Height of the first block
    pub initial_height: u64,
}

/// `InitChain` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInitChain {
    /// Consensus parameters in force
    pub consensus_params: ConsensusParams,
    /// Initial validator set
    pub validators: Vec<ValidatorUpdate>,
    /// App hash of the genesis state
    pub app_hash: Vec<u8>,
}

/// Header as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Chain identifier
    pub chain_id: String,
    /// Block height
    pub height: u64,
    /// Block time
    pub time: Timestamp,
    /// Proposer consensus address
    pub proposer_address: ConsAddress,
}

/// Validator reference inside votes and evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteValidator {
    /// Consensus address
    pub address: ConsAddress,
    /// Power at the voted height
    pub power: i64,
}

/// Commit vote of one validator for the previous block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    /// Voting validator
    pub validator: VoteValidator,
    /// Whether its signature is in the last commit
    pub signed_last_block: bool,
}

/// Votes of the previous block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastCommitInfo {
    /// Consensus round
    pub round: u32,
    /// One entry per validator of the previous set
    pub votes: Vec<VoteInfo>,
}

/// Kind of Byzantine behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisbehaviorType {
    /// Two conflicting votes at the same height and round
    DuplicateVote,
    /// Light client attack
    LightClientAttack,
}

/// Evidence of Byzantine behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misbehavior {
    /// Evidence kind
    pub kind: MisbehaviorType,
    /// Offending validator
    pub validator: VoteValidator,
    /// Height of the infraction
    pub height: u64,
    /// Time of the infraction
    pub time: Timestamp,
    /// Total voting power at that height
    pub total_voting_power: i64,
}

/// `BeginBlock` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBeginBlock {
    /// Block header
    pub header: Header,
    /// Votes for the previous block
    pub last_commit_info: LastCommitInfo,
    /// Evidence to punish
    pub byzantine_validators: Vec<Misbehavior>,
}

/// `BeginBlock` response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseBeginBlock {
    /// Events emitted by BeginBlock hooks
    pub events: Vec<Event>,
}

/// Whether `CheckTx` is a first admission or a recheck after commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckTxType {
    /// First admission
    New,
    /// Revalidation after a commit
    Recheck,
}

/// `CheckTx` response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseCheckTx {
    /// 0 on success
    pub code: u32,
    /// Error text on failure
    pub log: String,
    /// Gas limit requested by the transaction
    pub gas_wanted: u64,
    /// Gas used by admission checks
    pub gas_used: u64,
    /// Events emitted during admission
    pub events: Vec<Event>,
}

/// `DeliverTx` response: the transaction result envelope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseDeliverTx {
    /// 0 on success
    pub code: u32,
    /// Concatenated message results
    pub data: Vec<u8>,
    /// Error text on failure
    pub log: String,
    /// Gas limit requested by the transaction
    pub gas_wanted: u64,
    /// Gas consumed
    pub gas_used: u64,
    /// Events of the ante stage and, on success, of every message
    pub events: Vec<Event>,
}

impl ResponseDeliverTx {
    /// Whether the transaction succeeded
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// `EndBlock` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEndBlock {
    /// Height of the block being ended
    pub height: u64,
}

/// `EndBlock` response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseEndBlock {
    /// Validator power changes
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Consensus parameter changes
    pub consensus_param_updates: Option<ConsensusParams>,
    /// Events emitted by EndBlock hooks
    pub events: Vec<Event>,
}

/// `Commit` response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseCommit {
    /// New app hash
    pub data: Vec<u8>,
    /// Lowest height the host may prune blocks below
    pub retain_height: u64,
}

/// `Query` request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestQuery {
    /// Query path
    pub path: String,
    /// Key for store queries, JSON parameters for custom queries
    pub data: Vec<u8>,
    /// Height to query, 0 for latest
    pub height: u64,
    /// Whether to attach an inclusion proof
    pub prove: bool,
}

/// `Query` response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseQuery {
    /// 0 on success
    pub code: u32,
    /// Error text on failure
    pub log: String,
    /// Queried key
    pub key: Vec<u8>,
    /// Result value
    pub value: Vec<u8>,
    /// Inclusion proof, if requested and the key exists
    pub proof: Option<StoreProof>,
    /// Height the query ran against
    pub height: u64,
}

impl ResponseQuery {
    /// Error response
    pub fn error(err: &NmxError) -> Self {
        Self {
            code: err.code(),
            log: err.to_string(),
            ..Default::default()
        }
    }
}

const LAST_COMMIT_KEY: &[u8] = b"last_commit";
const MISBEHAVIOR_KEY: &[u8] = b"misbehavior";

/// Stores the block's votes and evidence for the BeginBlock hooks
pub fn record_block_evidence(ctx: &mut Context<'_>, req: &RequestBeginBlock) -> Result<()> {
    let mut scope = ctx.transient(BLOCK_SCOPE);
    scope.set(LAST_COMMIT_KEY, &req.last_commit_info)?;
    scope.set(MISBEHAVIOR_KEY, &req.byzantine_validators)
}

/// Votes of the previous block, as recorded by [`record_block_evidence`]
pub fn last_commit(ctx: &mut Context<'_>) -> Result<LastCommitInfo> {
    Ok(ctx
        .transient(BLOCK_SCOPE)
        .get(LAST_COMMIT_KEY)?
        .unwrap_or_default())
}

/// Evidence of this block, as recorded by [`record_block_evidence`]
pub fn misbehaviors(ctx: &mut Context<'_>) -> Result<Vec<Misbehavior>> {
    Ok(ctx
        .transient(BLOCK_SCOPE)
        .get(MISBEHAVIOR_KEY)?
        .unwrap_or_default())
}
