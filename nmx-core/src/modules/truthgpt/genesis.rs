// src/modules/truthgpt/genesis.rs

//! TruthGPT genesis import and export.

use super::keeper::TruthGptKeeper;
use super::params::TruthGptParams;
use super::store;
use super::types::{AiModel, DataSource, DataSourceRank, Misinformation, OracleQuery, OracleResponse, VerificationTask};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::auth::module_accounts;
use crate::modules::params::{ParamSet, ParamsKeeper};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// TruthGPT genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthGptGenesis {
    /// Parameters
    #[serde(default)]
    pub params: TruthGptParams,
    /// Data sources
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    /// Source ranks
    #[serde(default)]
    pub ranks: Vec<DataSourceRank>,
    /// Queries in every state
    #[serde(default)]
    pub queries: Vec<OracleQuery>,
    /// Aggregated responses
    #[serde(default)]
    pub responses: Vec<OracleResponse>,
    /// AI models
    #[serde(default)]
    pub ai_models: Vec<AiModel>,
    /// Misinformation records
    #[serde(default)]
    pub misinformation: Vec<Misinformation>,
    /// Verification tasks
    #[serde(default)]
    pub tasks: Vec<VerificationTask>,
}

fn unique<'a>(what: &str, ids: impl Iterator<Item = &'a str>) -> Result<BTreeSet<&'a str>> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(NmxError::InvalidState(format!("{} with empty id", what)));
        }
        if !seen.insert(id) {
            return Err(NmxError::InvalidState(format!("duplicate {} {}", what, id)));
        }
    }
    Ok(seen)
}

/// Stateless checks of the TruthGPT section
pub fn validate_genesis(genesis: &TruthGptGenesis) -> Result<()> {
    genesis.params.validate()?;
    let sources = unique("data source", genesis.data_sources.iter().map(|s| s.id.as_str()))?;
    unique("rank", genesis.ranks.iter().map(|r| r.source_id.as_str()))?;
    for rank in &genesis.ranks {
        if !sources.contains(rank.source_id.as_str()) {
            return Err(NmxError::InvalidState(format!("rank of unknown data source {}", rank.source_id)));
        }
        let components = [
            rank.reliability,
            rank.accuracy,
            rank.timeliness,
            rank.completeness,
            rank.trust_score,
        ];
        if components.iter().any(|c| !c.is_unit()) {
            return Err(NmxError::InvalidState(format!(
                "rank of data source {} leaves [0, 1]",
                rank.source_id
            )));
        }
    }

    let queries = unique("oracle query", genesis.queries.iter().map(|q| q.id.as_str()))?;
    for query in &genesis.queries {
        query.fee.validate()?;
        if let Some(missing) = query.data_sources.iter().find(|id| !sources.contains(id.as_str())) {
            return Err(NmxError::InvalidState(format!(
                "oracle query {} names unknown data source {}",
                query.id, missing
            )));
        }
    }
    unique("oracle response", genesis.responses.iter().map(|r| r.id.as_str()))?;
    for response in &genesis.responses {
        if !queries.contains(response.query_id.as_str()) {
            return Err(NmxError::InvalidState(format!(
                "oracle response {} answers unknown query {}",
                response.id, response.query_id
            )));
        }
        if !response.confidence.is_unit() {
            return Err(NmxError::InvalidState(format!(
                "oracle response {} has confidence {}",
                response.id, response.confidence
            )));
        }
    }

    unique("AI model", genesis.ai_models.iter().map(|m| m.id.as_str()))?;
    let records = unique("misinformation", genesis.misinformation.iter().map(|m| m.id.as_str()))?;
    unique("verification task", genesis.tasks.iter().map(|t| t.id.as_str()))?;
    for task in &genesis.tasks {
        if let Some(record) = &task.misinformation_id {
            if !records.contains(record.as_str()) {
                return Err(NmxError::InvalidState(format!(
                    "verification task {} links unknown misinformation {}",
                    task.id, record
                )));
            }
        }
    }
    Ok(())
}

impl TruthGptKeeper {
    /// Writes the TruthGPT genesis section
    ///
    /// Registers the default model under the module account when the
    /// section does not carry it.
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &TruthGptGenesis) -> Result<()> {
        ParamsKeeper.set(ctx, &genesis.params)?;
        self.bank.auth().ensure_module_account(ctx, module_accounts::TRUTHGPT)?;
        for source in &genesis.data_sources {
            store::set_source(ctx, source)?;
        }
        for rank in &genesis.ranks {
            store::set_rank(ctx, rank)?;
        }
        for query in &genesis.queries {
            store::set_query(ctx, query)?;
        }
        for response in &genesis.responses {
            store::set_response(ctx, response)?;
        }
        for model in &genesis.ai_models {
            store::set_model(ctx, model)?;
        }
        for record in &genesis.misinformation {
            store::set_misinformation(ctx, record)?;
        }
        for task in &genesis.tasks {
            store::set_task(ctx, task)?;
        }

        let model_id = &genesis.params.default_model_id;
        if store::get_model(ctx, model_id)?.is_none() {
            let now = ctx.block_time();
            let model = AiModel {
                id: model_id.clone(),
                owner: self.bank.auth().module_address(module_accounts::TRUTHGPT),
                name: "Default AI model".to_string(),
                description: "Model credited with oracle aggregation and verification".to_string(),
                model_type: "aggregator".to_string(),
                model_url: String::new(),
                model_hash: String::new(),
                version: 1,
                created_at: now,
                updated_at: now,
                metadata: Vec::new(),
            };
            store::set_model(ctx, &model)?;
        }
        Ok(())
    }

    /// Reads the TruthGPT genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<TruthGptGenesis> {
        Ok(TruthGptGenesis {
            params: self.params(ctx)?,
            data_sources: store::all_sources(ctx)?,
            ranks: store::all_ranks(ctx)?,
            queries: store::all_queries(ctx)?,
            responses: store::all_responses(ctx)?,
            ai_models: store::all_models(ctx)?,
            misinformation: store::all_misinformation(ctx)?,
            tasks: store::all_tasks(ctx)?,
        })
    }
}
