// src/modules/truthgpt/sources.rs

//! Data sources, AI models and source ranking.
//!
//! A source's rank has four components in `[0, 1]`. Each ranking period
//! they move toward the ratios observed since the last evaluation, by at
//! most `rank_adjustment_step`; the trust score is their mean. A source
//! whose trust falls below `min_source_trust` is blocked for good.

use super::keeper::TruthGptKeeper;
use super::msgs::{MsgRegisterAiModel, MsgRegisterDataSource, MsgUpdateAiModel, MsgUpdateDataSource};
use super::store;
use super::types::{AiModel, DataSource, DataSourceRank, DataSourceStatus};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::Dec;
use tracing::{debug, warn};

/// Moves `current` toward `target` by at most `step`
fn step_toward(current: Dec, target: Dec, step: Dec) -> Dec {
    let diff = target - current;
    let next = if diff > step {
        current + step
    } else if diff < -step {
        current - step
    } else {
        target
    };
    next.clamp_unit()
}

fn ratio(num: u64, den: u64) -> Option<Dec> {
    (den > 0).then(|| Dec::from_ratio(num as i128, den as i128))
}

impl TruthGptKeeper {
    /// Executes [`MsgRegisterDataSource`]
    ///
    /// # Returns
    /// Id of the new source, which starts pending with a neutral rank
    pub fn register_data_source(&self, ctx: &mut Context<'_>, msg: &MsgRegisterDataSource) -> Result<String> {
        let id = ctx.derive_id("source");
        if store::get_source(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("data source {}", id)));
        }
        let now = ctx.block_time();
        let source = DataSource {
            id: id.clone(),
            name: msg.name.clone(),
            description: msg.description.clone(),
            source_type: msg.source_type,
            endpoint: msg.endpoint.clone(),
            status: DataSourceStatus::Pending,
            owner: msg.owner,
            created_at: now,
            updated_at: now,
            metadata: msg.metadata.clone(),
        };
        store::set_source(ctx, &source)?;
        store::set_rank(ctx, &DataSourceRank::new(&id, now))?;
        ctx.emit(
            Event::new(types::DATA_SOURCE)
                .attr("source_id", &id)
                .attr("owner", msg.owner)
                .attr("action", "registered"),
        );
        debug!("registered data source {} for {}", id, msg.owner);
        Ok(id)
    }

    /// Executes [`MsgUpdateDataSource`]
    pub fn update_data_source(&self, ctx: &mut Context<'_>, msg: &MsgUpdateDataSource) -> Result<DataSource> {
        let mut source = self.data_source(ctx, &msg.id)?;
        if source.owner != msg.owner {
            return Err(NmxError::Unauthorized(format!(
                "{} does not own data source {}",
                msg.owner, msg.id
            )));
        }
        if source.status == DataSourceStatus::Blocked {
            return Err(NmxError::InvalidState(format!("data source {} is blocked", msg.id)));
        }
        if let Some(name) = &msg.name {
            source.name = name.clone();
        }
        if let Some(description) = &msg.description {
            source.description = description.clone();
        }
        if let Some(endpoint) = &msg.endpoint {
            source.endpoint = endpoint.clone();
        }
        if let Some(status) = msg.status {
            source.status = status;
        }
        source.updated_at = ctx.block_time();
        store::set_source(ctx, &source)?;
        ctx.emit(
            Event::new(types::DATA_SOURCE)
                .attr("source_id", &source.id)
                .attr("status", source.status)
                .attr("action", "updated"),
        );
        Ok(source)
    }

    /// Executes [`MsgRegisterAiModel`]
    ///
    /// # Returns
    /// Id of the new model
    pub fn register_model(&self, ctx: &mut Context<'_>, msg: &MsgRegisterAiModel) -> Result<String> {
        let id = ctx.derive_id("model");
        if store::get_model(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("AI model {}", id)));
        }
        let now = ctx.block_time();
        let model = AiModel {
            id: id.clone(),
            owner: msg.owner,
            name: msg.name.clone(),
            description: msg.description.clone(),
            model_type: msg.model_type.clone(),
            model_url: msg.model_url.clone(),
            model_hash: msg.model_hash.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
            metadata: msg.metadata.clone(),
        };
        store::set_model(ctx, &model)?;
        ctx.emit(
            Event::new(types::AI_MODEL)
                .attr("model_id", &id)
                .attr("owner", msg.owner)
                .attr("action", "registered"),
        );
        Ok(id)
    }

    /// Executes [`MsgUpdateAiModel`]
    ///
    /// # Returns
    /// The new version
    pub fn update_model(&self, ctx: &mut Context<'_>, msg: &MsgUpdateAiModel) -> Result<u64> {
        let mut model = self.model(ctx, &msg.id)?;
        if model.owner != msg.owner {
            return Err(NmxError::Unauthorized(format!("{} does not own AI model {}", msg.owner, msg.id)));
        }
        model.model_url = msg.model_url.clone();
        model.model_hash = msg.model_hash.clone();
        if let Some(description) = &msg.description {
            model.description = description.clone();
        }
        model.version += 1;
        model.updated_at = ctx.block_time();
        store::set_model(ctx, &model)?;
        ctx.emit(
            Event::new(types::AI_MODEL)
                .attr("model_id", &model.id)
                .attr("version", model.version)
                .attr("action", "updated"),
        );
        Ok(model.version)
    }

    /// Re-evaluates every rank with activity since the last evaluation
    ///
    /// # Returns
    /// Ids of the sources blocked by this evaluation
    pub fn update_rankings(&self, ctx: &mut Context<'_>) -> Result<Vec<String>> {
        let params = self.params(ctx)?;
        let step = params.rank_adjustment_step;
        let now = ctx.block_time();
        let mut blocked = Vec::new();

        for mut rank in store::all_ranks(ctx)? {
            if !rank.has_activity() {
                continue;
            }
            if let Some(target) = ratio(rank.responded, rank.assigned) {
                rank.reliability = step_toward(rank.reliability, target, step);
            }
            if let Some(target) = ratio(rank.on_time, rank.responded) {
                rank.timeliness = step_toward(rank.timeliness, target, step);
            }
            if let Some(target) = ratio(rank.complete, rank.responded) {
                rank.completeness = step_toward(rank.completeness, target, step);
            }
            if rank.responded > 0 {
                let target = rank.confidence_sum.quo_int(rank.responded as i128).unwrap_or(Dec::ZERO);
                rank.accuracy = step_toward(rank.accuracy, target, step);
            }
            rank.refresh_trust();
            rank.last_evaluated = now;
            rank.reset_counters();
            store::set_rank(ctx, &rank)?;
            ctx.emit(
                Event::new(types::SOURCE_RANK)
                    .attr("source_id", &rank.source_id)
                    .attr("trust_score", rank.trust_score),
            );

            if rank.trust_score >= params.min_source_trust {
                continue;
            }
            let Some(mut source) = store::get_source(ctx, &rank.source_id)? else {
                continue;
            };
            if source.status == DataSourceStatus::Blocked {
                continue;
            }
            source.status = DataSourceStatus::Blocked;
            source.updated_at = now;
            store::set_source(ctx, &source)?;
            ctx.emit(
                Event::new(types::DATA_SOURCE_BLOCKED)
                    .attr("source_id", &source.id)
                    .attr("trust_score", rank.trust_score),
            );
            warn!(
                "data source {} blocked with trust {} below {}",
                source.id, rank.trust_score, params.min_source_trust
            );
            blocked.push(source.id);
        }
        Ok(blocked)
    }
}
