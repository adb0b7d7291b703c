// src/modules/hyperchains/mod.rs

//! HyperChains registry.
//!
//! Chains are registered as proposals, deployed by their creator and
//! become active once their deployment completes. Active chains take
//! stake-weighted proposals; EndBlock drives deployments forward and
//! simulates chain activity.

pub mod genesis;
pub mod governance;
pub mod keeper;
pub mod lifecycle;
pub mod msgs;
pub mod params;
pub(crate) mod store;
pub mod types;

pub use genesis::HyperChainsGenesis;
pub use keeper::HyperChainsKeeper;
pub use msgs::{MsgCreateChain, MsgDeployChain, MsgSubmitChainProposal, MsgVoteChainProposal};
pub use params::{HyperChainsParam, HyperChainsParams};
pub use types::*;

use crate::abci::ValidatorUpdate;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use serde::Deserialize;

#[derive(Deserialize)]
struct IdQuery {
    id: String,
}

#[derive(Deserialize)]
struct DeploymentsQuery {
    #[serde(default)]
    chain_id: Option<String>,
}

#[derive(Deserialize)]
struct ProposalQuery {
    id: u64,
}

/// HyperChains module
#[derive(Debug, Clone)]
pub struct HyperChainsModule {
    keeper: HyperChainsKeeper,
}

impl HyperChainsModule {
    /// Wraps a keeper
    pub fn new(keeper: HyperChainsKeeper) -> Self {
        Self { keeper }
    }

    /// Keeper
    pub fn keeper(&self) -> &HyperChainsKeeper {
        &self.keeper
    }
}

impl AppModule for HyperChainsModule {
    fn name(&self) -> &'static str {
        names::HYPERCHAINS
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        genesis::validate_genesis(&state.hyperchains)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.hyperchains)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.hyperchains = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.process_proposals(ctx)
    }

    fn end_block(&self, ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
        self.keeper.advance_deployments(ctx)?;
        self.keeper.update_metrics(ctx)?;
        Ok(Vec::new())
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::CreateChain(m) => msg_result(&self.keeper.create_chain(ctx, m)?),
            Msg::DeployChain(m) => msg_result(&self.keeper.deploy_chain(ctx, m)?),
            Msg::SubmitChainProposal(m) => msg_result(&self.keeper.submit_proposal(ctx, m)?),
            Msg::VoteChainProposal(m) => msg_result(&self.keeper.vote(ctx, m)?),
            other => Err(NmxError::UnknownRequest(format!(
                "hyperchains cannot handle {}",
                other.type_name()
            ))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "chain" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.chain(ctx, &q.id)?)
            }
            "chains" => query_result(&self.keeper.chains(ctx)?),
            "deployment" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.deployment(ctx, &q.id)?)
            }
            "deployments" => {
                let q: DeploymentsQuery = if data.is_empty() {
                    DeploymentsQuery { chain_id: None }
                } else {
                    query_params(data)?
                };
                query_result(&self.keeper.deployments(ctx, q.chain_id.as_deref())?)
            }
            "metrics" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.metrics(ctx, &q.id)?)
            }
            "proposal" => {
                let q: ProposalQuery = query_params(data)?;
                query_result(&self.keeper.proposal(ctx, q.id)?)
            }
            "proposals" => query_result(&self.keeper.proposals(ctx)?),
            "votes" => {
                let q: ProposalQuery = query_params(data)?;
                query_result(&self.keeper.votes(ctx, q.id)?)
            }
            "params" => query_result(&self.keeper.params(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("hyperchains/{}", endpoint))),
        }
    }
}
