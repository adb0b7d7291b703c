// src/modules/truthgpt/mod.rs

//! TruthGPT oracle.
//!
//! Accounts register data sources and pay fees for queries against them.
//! Queries are dispatched at BeginBlock and complete either at once or
//! when enough source owners have answered; the fee then goes to those
//! owners by trust score. EndBlock settles verification tasks and, once
//! per ranking period, re-ranks the sources and blocks untrusted ones.

pub mod genesis;
pub mod invariants;
pub mod keeper;
pub mod msgs;
pub mod params;
pub mod queries;
pub mod sources;
pub(crate) mod store;
pub mod types;
pub mod verification;

pub use genesis::TruthGptGenesis;
pub use keeper::TruthGptKeeper;
pub use msgs::{
    MsgCreateOracleQuery, MsgCreateVerificationTask, MsgRegisterAiModel, MsgRegisterDataSource,
    MsgReportMisinformation, MsgSubmitSourceResponse, MsgUpdateAiModel, MsgUpdateDataSource,
};
pub use params::{TruthGptParam, TruthGptParams, DEFAULT_MODEL_ID};
pub use types::*;

use crate::abci::ValidatorUpdate;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::crisis::InvariantRegistry;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use serde::Deserialize;

#[derive(Deserialize)]
struct IdQuery {
    id: String,
}

/// TruthGPT module
#[derive(Debug, Clone)]
pub struct TruthGptModule {
    keeper: TruthGptKeeper,
}

impl TruthGptModule {
    /// Wraps a keeper
    pub fn new(keeper: TruthGptKeeper) -> Self {
        Self { keeper }
    }

    /// Keeper
    pub fn keeper(&self) -> &TruthGptKeeper {
        &self.keeper
    }
}

impl AppModule for TruthGptModule {
    fn name(&self) -> &'static str {
        names::TRUTHGPT
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        genesis::validate_genesis(&state.truthgpt)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.truthgpt)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.truthgpt = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.begin_block(ctx)
    }

    fn end_block(&self, ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
        self.keeper.process_verification_tasks(ctx)?;
        let period = self.keeper.params(ctx)?.ranking_period;
        if period > 0 && ctx.height() % period == 0 {
            self.keeper.update_rankings(ctx)?;
        }
        Ok(Vec::new())
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        invariants::register(&self.keeper, registry);
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::RegisterDataSource(m) => msg_result(&self.keeper.register_data_source(ctx, m)?),
            Msg::UpdateDataSource(m) => msg_result(&self.keeper.update_data_source(ctx, m)?.id),
            Msg::RegisterAiModel(m) => msg_result(&self.keeper.register_model(ctx, m)?),
            Msg::UpdateAiModel(m) => msg_result(&self.keeper.update_model(ctx, m)?),
            Msg::CreateOracleQuery(m) => msg_result(&self.keeper.create_query(ctx, m)?),
            Msg::SubmitSourceResponse(m) => msg_result(&self.keeper.submit_source_response(ctx, m)?),
            Msg::ReportMisinformation(m) => msg_result(&self.keeper.report_misinformation(ctx, m)?),
            Msg::CreateVerificationTask(m) => msg_result(&self.keeper.create_verification_task(ctx, m)?),
            other => Err(NmxError::UnknownRequest(format!("truthgpt cannot handle {}", other.type_name()))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "query" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.query(ctx, &q.id)?)
            }
            "response" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.response(ctx, &q.id)?)
            }
            "source" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.data_source(ctx, &q.id)?)
            }
            "sources" => query_result(&self.keeper.data_sources(ctx)?),
            "rank" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.rank(ctx, &q.id)?)
            }
            "model" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.model(ctx, &q.id)?)
            }
            "models" => query_result(&self.keeper.models(ctx)?),
            "misinformation" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.misinformation(ctx, &q.id)?)
            }
            "task" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.task(ctx, &q.id)?)
            }
            "params" => query_result(&self.keeper.params(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("truthgpt/{}", endpoint))),
        }
    }
}
