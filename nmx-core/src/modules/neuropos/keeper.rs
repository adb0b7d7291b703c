// src/modules/neuropos/keeper.rs

//! NeuroPoS keeper.

use super::params::NeuroPoSParams;
use super::store;
use super::types::{NetworkState, ValidatorPerformance, ValidatorReputation};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::math::{Dec, Int};
use crate::modules::params::ParamsKeeper;
use crate::modules::staking::StakingKeeper;
use nmx_crypto::ValAddress;
use tracing::debug;

/// NeuroPoS keeper
///
/// Owns the network registry and the reputation engine. Staking reaches
/// the engine only through [`super::ReputationHooks`]; the keeper itself
/// holds the staking keeper to read validators and to slash on anomalies.
#[derive(Debug, Clone)]
pub struct NeuroPoSKeeper {
    pub(crate) staking: StakingKeeper,
}

impl NeuroPoSKeeper {
    /// Creates a keeper over the staking keeper
    pub fn new(staking: StakingKeeper) -> Self {
        Self { staking }
    }

    /// Staking keeper
    pub fn staking(&self) -> &StakingKeeper {
        &self.staking
    }

    /// Current parameters
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<NeuroPoSParams> {
        ParamsKeeper.get(ctx)
    }

    /// Reputation record of a validator
    pub fn reputation(&self, ctx: &mut Context<'_>, val: &ValAddress) -> Result<ValidatorReputation> {
        store::get_reputation(ctx, val)?.ok_or_else(|| NmxError::NotFound(format!("reputation of {}", val)))
    }

    /// Performance record of a validator
    pub fn performance(&self, ctx: &mut Context<'_>, val: &ValAddress) -> Result<ValidatorPerformance> {
        store::get_performance(ctx, val)?.ok_or_else(|| NmxError::NotFound(format!("performance of {}", val)))
    }

    /// Snapshot at `height`, or the newest one when `height` is zero
    pub fn network_state(&self, ctx: &mut Context<'_>, height: u64) -> Result<NetworkState> {
        let state = if height == 0 {
            store::latest_network_state(ctx)?
        } else {
            store::get_network_state(ctx, height)?
        };
        state.ok_or_else(|| NmxError::NotFound(format!("network state at height {}", height)))
    }

    /// Records the bonded set of this block and prunes old snapshots
    ///
    /// Snapshots are kept for as many heights as staking keeps historical
    /// info.
    pub fn record_network_state(&self, ctx: &mut Context<'_>) -> Result<NetworkState> {
        let bonded = self.staking.bonded_validators(ctx)?;
        let mut bonded_tokens = Int::ZERO;
        let mut reputation_sum = Dec::ZERO;
        for validator in &bonded {
            bonded_tokens = bonded_tokens.checked_add(validator.tokens)?;
            reputation_sum += validator.reputation;
        }
        let state = NetworkState {
            height: ctx.height(),
            bonded_validators: bonded.len() as u64,
            bonded_tokens,
            mean_reputation: reputation_sum.quo_int(bonded.len() as i128).unwrap_or(Dec::ZERO),
            timestamp: ctx.block_time(),
        };
        store::set_network_state(ctx, &state)?;

        let keep = self.staking.params(ctx)?.historical_entries as u64;
        if ctx.height() > keep {
            store::prune_network_states(ctx, ctx.height() - keep + 1)?;
        }
        debug!(
            "network state at {}: {} bonded validators, mean reputation {}",
            state.height, state.bonded_validators, state.mean_reputation
        );
        Ok(state)
    }

    /// Runs the NeuroPoS part of BeginBlock
    ///
    /// Training started in earlier blocks completes, due networks are
    /// refined, pending anomaly reports are acted on, then performance is
    /// tracked and the network state recorded.
    pub fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.complete_training(ctx)?;
        self.refine_networks(ctx)?;
        self.process_anomaly_reports(ctx)?;
        self.track_performance(ctx)?;
        self.record_network_state(ctx)?;
        Ok(())
    }
}
