// src/modules/dynacontracts/mod.rs

//! DynaContracts registry.
//!
//! Stores contract code by version together with named parameters. The
//! owner may update code and parameters directly; anyone may propose a
//! change and bonded stake decides it. Executions are recorded but not
//! interpreted.

pub mod genesis;
pub mod governance;
pub mod keeper;
pub mod msgs;
pub mod params;
pub(crate) mod store;
pub mod types;

pub use genesis::DynaContractsGenesis;
pub use keeper::DynaContractsKeeper;
pub use msgs::{
    MsgCreateContract, MsgExecuteContract, MsgSetContractParameter, MsgSubmitContractProposal, MsgUpdateContract,
    MsgVoteContractProposal,
};
pub use params::{DynaContractsParam, DynaContractsParams};
pub use types::*;

use crate::abci::ValidatorUpdate;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct IdQuery {
    id: String,
}

#[derive(Deserialize)]
struct CodeQuery {
    id: String,
    #[serde(default)]
    version: Option<u64>,
}

#[derive(Deserialize)]
struct ProposalQuery {
    id: u64,
}

/// DynaContracts module
#[derive(Debug, Clone)]
pub struct DynaContractsModule {
    keeper: DynaContractsKeeper,
}

impl DynaContractsModule {
    /// Wraps a keeper
    pub fn new(keeper: DynaContractsKeeper) -> Self {
        Self { keeper }
    }

    /// Keeper
    pub fn keeper(&self) -> &DynaContractsKeeper {
        &self.keeper
    }
}

impl AppModule for DynaContractsModule {
    fn name(&self) -> &'static str {
        names::DYNACONTRACTS
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        genesis::validate_genesis(&state.dynacontracts)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.dynacontracts)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.dynacontracts = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.process_proposals(ctx)?;
        Ok(())
    }

    fn end_block(&self, ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
        let touched = self.keeper.refresh_ai_parameters(ctx)?;
        if touched > 0 {
            debug!("refreshed {} AI-controlled contract parameters", touched);
        }
        Ok(Vec::new())
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::CreateContract(m) => msg_result(&self.keeper.create_contract(ctx, m)?),
            Msg::UpdateContract(m) => msg_result(&self.keeper.update_contract(ctx, m)?),
            Msg::ExecuteContract(m) => msg_result(&self.keeper.execute_contract(ctx, m)?),
            Msg::SetContractParameter(m) => msg_result(&self.keeper.set_contract_parameter(ctx, m)?),
            Msg::SubmitContractProposal(m) => msg_result(&self.keeper.submit_proposal(ctx, m)?),
            Msg::VoteContractProposal(m) => msg_result(&self.keeper.vote(ctx, m)?),
            other => Err(NmxError::UnknownRequest(format!(
                "dynacontracts cannot handle {}",
                other.type_name()
            ))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "contract" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.contract(ctx, &q.id)?)
            }
            "contracts" => query_result(&self.keeper.contracts(ctx)?),
            "code" => {
                let q: CodeQuery = query_params(data)?;
                query_result(&self.keeper.code(ctx, &q.id, q.version)?)
            }
            "parameters" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.parameters(ctx, &q.id)?)
            }
            "execution" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.execution(ctx, &q.id)?)
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
            _ => Err(NmxError::UnknownRequest(format!("dynacontracts/{}", endpoint))),
        }
    }
}
