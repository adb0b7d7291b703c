// src/modules/hyperchains/types.rs

//! HyperChains records.

use crate::coins::Coins;
use crate::math::Dec;
use crate::modules::proposals::{Proposal, Voting};
use crate::time::Timestamp;
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Execution model of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ChainType {
    Zkevm,
    Optimistic,
    Rollup,
    Appchain,
    Custom,
}

/// Lifecycle of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ChainStatus {
    Proposed,
    Approved,
    Deploying,
    Active,
    Paused,
    Upgrading,
    Retired,
}

impl ChainStatus {
    /// Whether `deploy_chain` may start from this status
    pub fn is_deployable(&self) -> bool {
        matches!(self, ChainStatus::Proposed | ChainStatus::Approved)
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainStatus::Proposed => "proposed",
            ChainStatus::Approved => "approved",
            ChainStatus::Deploying => "deploying",
            ChainStatus::Active => "active",
            ChainStatus::Paused => "paused",
            ChainStatus::Upgrading => "upgrading",
            ChainStatus::Retired => "retired",
        };
        f.write_str(s)
    }
}

/// A registered chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    /// Id
    pub id: String,
    /// Display name
    pub name: String,
    /// Free text
    pub description: String,
    /// Account that created it
    pub creator: AccAddress,
    /// Execution model
    pub chain_type: ChainType,
    /// Status
    pub status: ChainStatus,
    /// Version, starting at 1
    pub version: u64,
    /// Creation time
    pub created_at: Timestamp,
    /// Last change
    pub updated_at: Timestamp,
    /// Modules the chain runs
    pub modules: Vec<String>,
    /// Chain configuration as JSON text
    pub config: String,
    /// Opaque metadata as JSON text
    pub metadata: String,
}

/// Progress of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl DeploymentStatus {
    /// Whether EndBlock still advances it
    pub fn is_open(&self) -> bool {
        matches!(self, DeploymentStatus::Pending | DeploymentStatus::InProgress)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::InProgress => "in_progress",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Deployment of one chain version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDeployment {
    /// Id, `deploy-<chain id>-<version>`
    pub id: String,
    /// Chain
    pub chain_id: String,
    /// Chain version deployed
    pub version: u64,
    /// Account that started it
    pub deployer: AccAddress,
    /// Status
    pub status: DeploymentStatus,
    /// Start time
    pub started_at: Timestamp,
    /// Completion time
    pub completed_at: Option<Timestamp>,
    /// Last log line
    pub logs: String,
    /// Published endpoints by kind
    pub endpoints: BTreeMap<String, String>,
    /// Configuration deployed, JSON text
    pub config: String,
    /// Height of the last status change
    pub updated_height: u64,
}

/// Id of the deployment of `version` of `chain_id`
pub fn deployment_id(chain_id: &str, version: u64) -> String {
    format!("deploy-{}-{}", chain_id, version)
}

/// Kind of change a chain proposal makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ProposalType {
    Upgrade,
    Parameter,
    Module,
}

impl fmt::Display for ProposalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProposalType::Upgrade => "upgrade",
            ProposalType::Parameter => "parameter",
            ProposalType::Module => "module",
        })
    }
}

/// Proposal against an active chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProposal {
    /// Sequential id
    pub id: u64,
    /// Target chain
    pub chain_id: String,
    /// Title
    pub title: String,
    /// Free text
    pub description: String,
    /// Submitter
    pub proposer: AccAddress,
    /// Kind of change
    pub proposal_type: ProposalType,
    /// Change payload as JSON text
    pub content: String,
    /// Voting state
    pub voting: Voting,
}

impl Proposal for ChainProposal {
    fn voting(&self) -> &Voting {
        &self.voting
    }
}

/// Simulated activity of an active chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetrics {
    /// Chain
    pub chain_id: String,
    /// Blocks produced
    pub block_height: u64,
    /// Transactions processed
    pub total_transactions: u64,
    /// Distinct users
    pub active_users: u64,
    /// Transactions per second over the last interval
    pub tps: Dec,
    /// Average fee in NMX
    pub average_fee: Dec,
    /// Value locked on the chain
    pub total_value_locked: Coins,
    /// Last refresh
    pub updated_at: Timestamp,
}

impl ChainMetrics {
    /// Zeroed metrics starting at `now`
    pub fn new(chain_id: &str, now: Timestamp) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            block_height: 0,
            total_transactions: 0,
            active_users: 0,
            tps: Dec::ZERO,
            average_fee: Dec::ZERO,
            total_value_locked: Coins::empty(),
            updated_at: now,
        }
    }
}
