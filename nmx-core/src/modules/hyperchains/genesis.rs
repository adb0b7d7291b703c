// src/modules/hyperchains/genesis.rs

//! HyperChains genesis import and export.

use super::keeper::HyperChainsKeeper;
use super::params::HyperChainsParams;
use super::store;
use super::types::{Chain, ChainDeployment, ChainMetrics, ChainProposal};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::params::{ParamSet, ParamsKeeper};
use crate::modules::proposals::Vote;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// HyperChains genesis section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperChainsGenesis {
    /// Parameters
    #[serde(default)]
    pub params: HyperChainsParams,
    /// Chains
    #[serde(default)]
    pub chains: Vec<Chain>,
    /// Deployments
    #[serde(default)]
    pub deployments: Vec<ChainDeployment>,
    /// Proposals in every state
    #[serde(default)]
    pub proposals: Vec<ChainProposal>,
    /// Votes cast
    #[serde(default)]
    pub votes: Vec<Vote>,
    /// Id the next proposal gets
    #[serde(default = "first_proposal_id")]
    pub next_proposal_id: u64,
    /// Metrics of active chains
    #[serde(default)]
    pub metrics: Vec<ChainMetrics>,
}

fn first_proposal_id() -> u64 {
    1
}

impl Default for HyperChainsGenesis {
    fn default() -> Self {
        Self {
            params: HyperChainsParams::default(),
            chains: Vec::new(),
            deployments: Vec::new(),
            proposals: Vec::new(),
            votes: Vec::new(),
            next_proposal_id: first_proposal_id(),
            metrics: Vec::new(),
        }
    }
}

/// Stateless checks of the HyperChains section
pub fn validate_genesis(genesis: &HyperChainsGenesis) -> Result<()> {
    genesis.params.validate()?;
    let mut chains = BTreeSet::new();
    for chain in &genesis.chains {
        if chain.id.is_empty() || !chains.insert(chain.id.as_str()) {
            return Err(NmxError::InvalidState(format!("duplicate or empty chain id {:?}", chain.id)));
        }
        if chain.version == 0 {
            return Err(NmxError::InvalidState(format!("chain {} at version 0", chain.id)));
        }
    }
    let mut deployments = BTreeSet::new();
    for deployment in &genesis.deployments {
        if !deployments.insert(deployment.id.as_str()) {
            return Err(NmxError::InvalidState(format!("duplicate deployment {}", deployment.id)));
        }
        if !chains.contains(deployment.chain_id.as_str()) {
            return Err(NmxError::InvalidState(format!(
                "deployment {} of unknown chain {}",
                deployment.id, deployment.chain_id
            )));
        }
    }
    for metrics in &genesis.metrics {
        if !chains.contains(metrics.chain_id.as_str()) {
            return Err(NmxError::InvalidState(format!("metrics of unknown chain {}", metrics.chain_id)));
        }
    }
    let mut proposals = BTreeSet::new();
    for proposal in &genesis.proposals {
        if proposal.id == 0 || proposal.id >= genesis.next_proposal_id || !proposals.insert(proposal.id) {
            return Err(NmxError::InvalidState(format!(
                "chain proposal id {} is duplicate or outside [1, {})",
                proposal.id, genesis.next_proposal_id
            )));
        }
    }
    if let Some(vote) = genesis.votes.iter().find(|v| !proposals.contains(&v.proposal_id)) {
        return Err(NmxError::InvalidState(format!(
            "vote on unknown chain proposal {}",
            vote.proposal_id
        )));
    }
    Ok(())
}

impl HyperChainsKeeper {
    /// Writes the HyperChains genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &HyperChainsGenesis) -> Result<()> {
        ParamsKeeper.set(ctx, &genesis.params)?;
        for chain in &genesis.chains {
            store::set_chain(ctx, chain)?;
        }
        for deployment in &genesis.deployments {
            store::set_deployment(ctx, deployment)?;
        }
        for proposal in &genesis.proposals {
            store::PROPOSALS.set(ctx, proposal.id, proposal)?;
        }
        for vote in &genesis.votes {
            store::PROPOSALS.set_vote(ctx, vote)?;
        }
        store::PROPOSALS.set_next_id(ctx, genesis.next_proposal_id)?;
        for metrics in &genesis.metrics {
            store::set_metrics(ctx, metrics)?;
        }
        Ok(())
    }

    /// Reads the HyperChains genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<HyperChainsGenesis> {
        Ok(HyperChainsGenesis {
            params: self.params(ctx)?,
            chains: store::all_chains(ctx)?,
            deployments: store::all_deployments(ctx)?,
            proposals: store::PROPOSALS.all(ctx)?,
            votes: store::PROPOSALS.all_votes(ctx)?,
            next_proposal_id: store::PROPOSALS.next_id(ctx)?,
            metrics: store::all_metrics(ctx)?,
        })
    }
}
