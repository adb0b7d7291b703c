// src/modules/neuropos/reputation.rs

//! Reputation engine.
//!
//! Every validator carries a reputation in `[0, 1]`, starting at 1. Three
//! sources move it:
//!
//! * a windowed performance assessment, fed by block production counters
//!   and by the confidence of the validator's recent predictions;
//! * slash feedback, applied immediately through [`ReputationHooks`];
//! * anomaly penalties, see [`super::anomaly`].
//!
//! Regular updates decay the score by `reputation_decay_rate` per whole day
//! since the last change before adding the delta. The validator record
//! mirrors the score after each update.

use super::keeper::NeuroPoSKeeper;
use super::params::NeuroPoSParams;
use super::store;
use super::types::{ReputationChange, ValidatorPerformance, ValidatorReputation};
use crate::abci;
use crate::context::Context;
use crate::errors::Result;
use crate::events::{types, Event};
use crate::math::Dec;
use crate::modules::params::ParamsKeeper;
use crate::modules::staking::{store as staking_store, Validator, ValidatorHooks, ValidatorSlashEvent};
use crate::time::whole_days;
use nmx_crypto::ValAddress;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// History reason of a windowed update
pub const REASON_PERFORMANCE: &str = "performance assessment";
/// History reason of an anomaly penalty
pub const REASON_ANOMALY: &str = "anomaly detected";
/// History reason of the tombstone reset
pub const REASON_TOMBSTONED: &str = "tombstoned";

fn mirror(ctx: &mut Context<'_>, val: &ValAddress, update: impl FnOnce(&mut Validator)) -> Result<()> {
    if let Some(mut validator) = staking_store::get_validator(ctx, val)? {
        update(&mut validator);
        staking_store::set_validator(ctx, &validator)?;
    }
    Ok(())
}

/// Creates the reputation and performance records of `val` when missing
pub(crate) fn init_validator(ctx: &mut Context<'_>, val: &ValAddress) -> Result<()> {
    let now = ctx.block_time();
    let reputation = match store::get_reputation(ctx, val)? {
        Some(r) => r,
        None => {
            let fresh = ValidatorReputation::new(*val, now);
            store::set_reputation(ctx, &fresh)?;
            fresh
        }
    };
    let performance = match store::get_performance(ctx, val)? {
        Some(p) => p,
        None => {
            let params: NeuroPoSParams = ParamsKeeper.get(ctx)?;
            let fresh = ValidatorPerformance::new(*val, params.performance_assessment_window, ctx.height(), now);
            store::set_performance(ctx, &fresh)?;
            fresh
        }
    };
    mirror(ctx, val, |v| {
        v.reputation = reputation.reputation;
        v.performance_score = performance.performance_score;
    })
}

/// Moves the reputation of `val` by `change`
///
/// With `decay`, the current score first shrinks by
/// `max(0, 1 - reputation_decay_rate * days)` where `days` counts whole
/// days since the last update. The result is clamped to `[0, 1]` and the
/// requested change is appended to the bounded history.
///
/// # Returns
/// The updated record
pub(crate) fn apply_change(
    ctx: &mut Context<'_>,
    val: &ValAddress,
    change: Dec,
    reason: &str,
    decay: bool,
) -> Result<ValidatorReputation> {
    let params: NeuroPoSParams = ParamsKeeper.get(ctx)?;
    let now = ctx.block_time();
    let mut reputation = store::get_reputation(ctx, val)?.unwrap_or_else(|| ValidatorReputation::new(*val, now));

    let mut current = reputation.reputation;
    if decay {
        let days = whole_days(now.since(reputation.last_updated));
        let factor = (Dec::ONE - params.reputation_decay_rate.mul(Dec::from_int(days as i128))).max(Dec::ZERO);
        current = current.mul(factor);
    }
    let updated = (current + change).clamp_unit();

    reputation.reputation = updated;
    reputation.last_updated = now;
    reputation.record(ReputationChange {
        timestamp: now,
        change,
        reason: reason.to_string(),
    });
    store::set_reputation(ctx, &reputation)?;
    mirror(ctx, val, |v| v.reputation = updated)?;

    ctx.emit(
        Event::new(types::REPUTATION_UPDATE)
            .attr("validator", val)
            .attr("reputation", updated)
            .attr("change", change)
            .attr("reason", reason),
    );
    debug!("reputation of {} moved by {} to {} ({})", val, change, updated, reason);
    if updated < params.min_validator_reputation {
        ctx.emit(
            Event::new(types::REPUTATION_BELOW_THRESHOLD)
                .attr("validator", val)
                .attr("reputation", updated)
                .attr("threshold", params.min_validator_reputation),
        );
        warn!(
            "reputation of validator {} fell to {}, below {}",
            val, updated, params.min_validator_reputation
        );
    }
    Ok(reputation)
}

/// Staking callbacks feeding the reputation engine
#[derive(Debug, Clone, Copy, Default)]
pub struct ReputationHooks;

impl ValidatorHooks for ReputationHooks {
    fn after_validator_created(&self, ctx: &mut Context<'_>, validator: &Validator) -> Result<()> {
        init_validator(ctx, &validator.operator_address)
    }

    fn after_validator_slashed(&self, ctx: &mut Context<'_>, event: &ValidatorSlashEvent) -> Result<()> {
        let params: NeuroPoSParams = ParamsKeeper.get(ctx)?;
        let penalty = -event.slash_factor.mul(params.reputation_penalty_rate);
        apply_change(ctx, &event.validator, penalty, &format!("slash: {}", event.reason), false)?;
        Ok(())
    }

    fn after_validator_tombstoned(&self, ctx: &mut Context<'_>, validator: &ValAddress) -> Result<()> {
        let current = store::get_reputation(ctx, validator)?
            .map(|r| r.reputation)
            .unwrap_or(Dec::ONE);
        apply_change(ctx, validator, -current, REASON_TOMBSTONED, false)?;
        info!("reputation of tombstoned validator {} reset to zero", validator);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BlockTally {
    proposed: u64,
    validated: u64,
    missed: u64,
}

impl NeuroPoSKeeper {
    /// Accumulates this block's production counters
    ///
    /// The proposer of the current block counts one proposed and one
    /// validated block. Every other signer of the previous block counts one
    /// validated block, and every bonded non-signer one missed block.
    pub fn track_performance(&self, ctx: &mut Context<'_>) -> Result<()> {
        let params = self.params(ctx)?;
        let proposer = ctx.header().proposer;
        let commit = abci::last_commit(ctx)?;
        let mut tallies: BTreeMap<ValAddress, BlockTally> = BTreeMap::new();

        if let Some(validator) = self.staking.validator_by_cons(ctx, &proposer)? {
            let tally = tallies.entry(validator.operator_address).or_default();
            tally.proposed += 1;
            tally.validated += 1;
        }
        for vote in &commit.votes {
            let Some(validator) = self.staking.validator_by_cons(ctx, &vote.validator.address)? else {
                continue;
            };
            if vote.signed_last_block {
                if vote.validator.address != proposer {
                    tallies.entry(validator.operator_address).or_default().validated += 1;
                }
            } else if validator.is_bonded() {
                tallies.entry(validator.operator_address).or_default().missed += 1;
            }
        }

        for (val, tally) in tallies {
            self.record_block(ctx, &val, tally, &params)?;
        }
        Ok(())
    }

    fn record_block(&self, ctx: &mut Context<'_>, val: &ValAddress, tally: BlockTally, params: &NeuroPoSParams) -> Result<()> {
        let now = ctx.block_time();
        let mut performance = match store::get_performance(ctx, val)? {
            Some(p) => p,
            None => ValidatorPerformance::new(*val, params.performance_assessment_window, ctx.height(), now),
        };
        // an empty window follows the current parameter, e.g. records opened
        // at genesis before the NeuroPoS section was loaded
        if performance.total_blocks() == 0 && performance.missed_blocks == 0 {
            performance.assessment_window = params.performance_assessment_window;
        }
        performance.blocks_proposed = performance.blocks_proposed.saturating_add(tally.proposed);
        performance.blocks_validated = performance.blocks_validated.saturating_add(tally.validated);
        performance.missed_blocks = performance.missed_blocks.saturating_add(tally.missed);
        performance.last_updated = now;
        performance.refresh_score();

        if tally.missed > 0 && performance.missed_blocks > params.max_missed_blocks {
            ctx.emit(
                Event::new(types::VALIDATOR_PERFORMANCE)
                    .attr("validator", val)
                    .attr("missed_blocks", performance.missed_blocks)
                    .attr("excessive_missed_blocks", true),
            );
        }
        if performance.window_full() {
            self.assess_performance(ctx, &mut performance, params)?;
        }
        let score = performance.performance_score;
        store::set_performance(ctx, &performance)?;
        mirror(ctx, val, |v| v.performance_score = score)
    }

    /// Turns a full performance window into a reputation update and resets it
    ///
    /// `delta = (score - 0.5) * reputation_bonus_rate
    ///        + nn_influence * neural_network_influence_rate`, where
    /// `nn_influence = (mean confidence - 0.5) * 0.2` over the predictions
    /// submitted since the previous assessment, or zero without any.
    ///
    /// # Returns
    /// The applied delta
    pub fn assess_performance(
        &self,
        ctx: &mut Context<'_>,
        performance: &mut ValidatorPerformance,
        params: &NeuroPoSParams,
    ) -> Result<Dec> {
        let val = performance.validator;
        let base = performance.performance_score - Dec::percent(50);
        let predictions = store::predictions_since(ctx, &val, performance.last_assessment_height)?;
        let total: Dec = predictions.iter().map(|p| p.confidence).sum();
        let mean_confidence = total.quo_int(predictions.len() as i128);
        let nn_influence = match mean_confidence {
            Some(mean) => (mean - Dec::percent(50)).mul(Dec::percent(20)),
            None => Dec::ZERO,
        };
        let delta = base.mul(params.reputation_bonus_rate) + nn_influence.mul(params.neural_network_influence_rate);
        apply_change(ctx, &val, delta, REASON_PERFORMANCE, true)?;

        if let Some(mean) = mean_confidence {
            performance.prediction_accuracy = mean;
            mirror(ctx, &val, |v| v.neural_network_contribution = mean)?;
        }
        info!(
            "assessed validator {}: score {}, {} recent predictions, reputation change {}",
            val,
            performance.performance_score,
            predictions.len(),
            delta
        );
        performance.blocks_proposed = 0;
        performance.blocks_validated = 0;
        performance.missed_blocks = 0;
        performance.assessment_window = params.performance_assessment_window;
        performance.last_assessment_height = ctx.height();
        Ok(delta)
    }
}
