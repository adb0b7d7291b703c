// src/modules/hyperchains/keeper.rs

//! HyperChains keeper: chains and their deployments.

use super::msgs::{MsgCreateChain, MsgDeployChain};
use super::params::HyperChainsParams;
use super::store;
use super::types::{deployment_id, Chain, ChainDeployment, ChainMetrics, ChainProposal, ChainStatus, DeploymentStatus};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::modules::params::ParamsKeeper;
use crate::modules::proposals::Vote;
use crate::modules::staking::StakingKeeper;
use std::collections::BTreeMap;
use tracing::info;

/// HyperChains keeper
#[derive(Debug, Clone)]
pub struct HyperChainsKeeper {
    pub(crate) staking: StakingKeeper,
}

impl HyperChainsKeeper {
    /// Creates a keeper over the staking keeper, which weighs votes
    pub fn new(staking: StakingKeeper) -> Self {
        Self { staking }
    }

    /// Staking keeper
    pub fn staking(&self) -> &StakingKeeper {
        &self.staking
    }

    /// Current parameters
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<HyperChainsParams> {
        ParamsKeeper.get(ctx)
    }

    /// Chain by id
    pub fn chain(&self, ctx: &mut Context<'_>, id: &str) -> Result<Chain> {
        store::get_chain(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("chain {}", id)))
    }

    /// Every chain by id
    pub fn chains(&self, ctx: &mut Context<'_>) -> Result<Vec<Chain>> {
        store::all_chains(ctx)
    }

    /// Deployment by id
    pub fn deployment(&self, ctx: &mut Context<'_>, id: &str) -> Result<ChainDeployment> {
        store::get_deployment(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("deployment {}", id)))
    }

    /// Deployments of one chain, or of every chain
    pub fn deployments(&self, ctx: &mut Context<'_>, chain_id: Option<&str>) -> Result<Vec<ChainDeployment>> {
        let mut deployments = store::all_deployments(ctx)?;
        if let Some(chain_id) = chain_id {
            deployments.retain(|d| d.chain_id == chain_id);
        }
        Ok(deployments)
    }

    /// Metrics of one chain
    pub fn metrics(&self, ctx: &mut Context<'_>, chain_id: &str) -> Result<ChainMetrics> {
        store::get_metrics(ctx, chain_id)?.ok_or_else(|| NmxError::NotFound(format!("metrics of chain {}", chain_id)))
    }

    /// Proposal by id
    pub fn proposal(&self, ctx: &mut Context<'_>, id: u64) -> Result<ChainProposal> {
        store::PROPOSALS
            .get(ctx, id)?
            .ok_or_else(|| NmxError::NotFound(format!("chain proposal {}", id)))
    }

    /// Every proposal by id
    pub fn proposals(&self, ctx: &mut Context<'_>) -> Result<Vec<ChainProposal>> {
        store::PROPOSALS.all(ctx)
    }

    /// Votes cast on one proposal
    pub fn votes(&self, ctx: &mut Context<'_>, proposal_id: u64) -> Result<Vec<Vote>> {
        store::PROPOSALS.votes(ctx, proposal_id)
    }

    /// Executes [`MsgCreateChain`]
    ///
    /// The chain starts `proposed` at version 1 with a pending deployment.
    ///
    /// # Returns
    /// Id of the new chain
    pub fn create_chain(&self, ctx: &mut Context<'_>, msg: &MsgCreateChain) -> Result<String> {
        let id = ctx.derive_id("chain");
        if store::get_chain(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("chain {}", id)));
        }
        let now = ctx.block_time();
        let chain = Chain {
            id: id.clone(),
            name: msg.name.clone(),
            description: msg.description.clone(),
            creator: msg.creator,
            chain_type: msg.chain_type,
            status: ChainStatus::Proposed,
            version: 1,
            created_at: now,
            updated_at: now,
            modules: msg.modules.clone(),
            config: msg.config.clone(),
            metadata: msg.metadata.clone(),
        };
        store::set_chain(ctx, &chain)?;
        let deployment = ChainDeployment {
            id: deployment_id(&id, 1),
            chain_id: id.clone(),
            version: 1,
            deployer: msg.creator,
            status: DeploymentStatus::Pending,
            started_at: now,
            completed_at: None,
            logs: String::new(),
            endpoints: BTreeMap::new(),
            config: msg.config.clone(),
            updated_height: ctx.height(),
        };
        store::set_deployment(ctx, &deployment)?;
        ctx.emit(
            Event::new(types::CREATE_CHAIN)
                .attr("chain_id", &id)
                .attr("creator", msg.creator)
                .attr("deployment_id", &deployment.id),
        );
        info!("created chain {} by {}", id, msg.creator);
        Ok(id)
    }

    /// Executes [`MsgDeployChain`]
    ///
    /// # Returns
    /// Id of the in-progress deployment
    pub fn deploy_chain(&self, ctx: &mut Context<'_>, msg: &MsgDeployChain) -> Result<String> {
        let mut chain = self.chain(ctx, &msg.chain_id)?;
        if !chain.status.is_deployable() {
            return Err(NmxError::InvalidState(format!(
                "chain {} is {} and cannot be deployed",
                chain.id, chain.status
            )));
        }
        if chain.creator != msg.deployer {
            return Err(NmxError::Unauthorized(format!(
                "only the creator of chain {} may deploy it",
                chain.id
            )));
        }
        let now = ctx.block_time();
        chain.status = ChainStatus::Deploying;
        chain.updated_at = now;
        store::set_chain(ctx, &chain)?;

        let deployment = ChainDeployment {
            id: deployment_id(&chain.id, chain.version),
            chain_id: chain.id.clone(),
            version: chain.version,
            deployer: msg.deployer,
            status: DeploymentStatus::InProgress,
            started_at: now,
            completed_at: None,
            logs: "Deployment started".to_string(),
            endpoints: BTreeMap::new(),
            config: chain.config.clone(),
            updated_height: ctx.height(),
        };
        store::set_deployment(ctx, &deployment)?;
        ctx.emit(
            Event::new(types::DEPLOY_CHAIN)
                .attr("chain_id", &chain.id)
                .attr("deployment_id", &deployment.id)
                .attr("version", chain.version),
        );
        Ok(deployment.id)
    }
}
