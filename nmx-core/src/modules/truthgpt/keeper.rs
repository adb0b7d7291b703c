// src/modules/truthgpt/keeper.rs

//! TruthGPT keeper.

use super::params::TruthGptParams;
use super::store;
use super::types::{AiModel, DataSource, DataSourceRank, Misinformation, OracleQuery, OracleResponse, VerificationTask};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::bank::BankKeeper;
use crate::modules::params::ParamsKeeper;

/// TruthGPT keeper
///
/// Holds the bank keeper for fee escrow, refunds and payouts. Every
/// record lives in the truthgpt subtree.
#[derive(Debug, Clone)]
pub struct TruthGptKeeper {
    pub(crate) bank: BankKeeper,
}

impl TruthGptKeeper {
    /// Creates a keeper over the bank keeper
    pub fn new(bank: BankKeeper) -> Self {
        Self { bank }
    }

    /// Bank keeper
    pub fn bank(&self) -> &BankKeeper {
        &self.bank
    }

    /// Current parameters
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<TruthGptParams> {
        ParamsKeeper.get(ctx)
    }

    /// Data source by id
    pub fn data_source(&self, ctx: &mut Context<'_>, id: &str) -> Result<DataSource> {
        store::get_source(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("data source {}", id)))
    }

    /// Every data source in id order
    pub fn data_sources(&self, ctx: &mut Context<'_>) -> Result<Vec<DataSource>> {
        store::all_sources(ctx)
    }

    /// Rank of a data source
    pub fn rank(&self, ctx: &mut Context<'_>, source_id: &str) -> Result<DataSourceRank> {
        store::get_rank(ctx, source_id)?.ok_or_else(|| NmxError::NotFound(format!("rank of data source {}", source_id)))
    }

    /// Query by id
    pub fn query(&self, ctx: &mut Context<'_>, id: &str) -> Result<OracleQuery> {
        store::get_query(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("oracle query {}", id)))
    }

    /// Response by id
    pub fn response(&self, ctx: &mut Context<'_>, id: &str) -> Result<OracleResponse> {
        store::get_response(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("oracle response {}", id)))
    }

    /// AI model by id
    pub fn model(&self, ctx: &mut Context<'_>, id: &str) -> Result<AiModel> {
        store::get_model(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("AI model {}", id)))
    }

    /// Every AI model in id order
    pub fn models(&self, ctx: &mut Context<'_>) -> Result<Vec<AiModel>> {
        store::all_models(ctx)
    }

    /// Misinformation record by id
    pub fn misinformation(&self, ctx: &mut Context<'_>, id: &str) -> Result<Misinformation> {
        store::get_misinformation(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("misinformation {}", id)))
    }

    /// Verification task by id
    pub fn task(&self, ctx: &mut Context<'_>, id: &str) -> Result<VerificationTask> {
        store::get_task(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("verification task {}", id)))
    }
}
