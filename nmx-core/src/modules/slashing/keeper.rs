// src/modules/slashing/keeper.rs

//! Liveness tracking, double-sign punishment and unjailing.

use super::params::SlashingParams;
use super::store;
use super::types::{max_missed_blocks, MsgUnjail, ValidatorSigningInfo};
use crate::abci;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::modules::params::ParamsKeeper;
use crate::modules::staking::{SlashReason, StakingKeeper};
use crate::time::Timestamp;
use nmx_crypto::ConsAddress;
use tracing::{debug, info, warn};

/// Slashing keeper
#[derive(Debug, Clone)]
pub struct SlashingKeeper {
    staking: StakingKeeper,
}

impl SlashingKeeper {
    /// Creates a keeper over the staking keeper it punishes through
    pub fn new(staking: StakingKeeper) -> Self {
        Self { staking }
    }

    /// Staking keeper
    pub fn staking(&self) -> &StakingKeeper {
        &self.staking
    }

    /// Current parameters
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<SlashingParams> {
        ParamsKeeper.get(ctx)
    }

    /// Signing record of a consensus address
    pub fn signing_info(&self, ctx: &mut Context<'_>, cons: &ConsAddress) -> Result<Option<ValidatorSigningInfo>> {
        store::get_signing_info(ctx, cons)
    }

    /// Starts tracking `cons` unless a record exists already
    pub fn ensure_signing_info(&self, ctx: &mut Context<'_>, cons: &ConsAddress) -> Result<ValidatorSigningInfo> {
        if let Some(info) = store::get_signing_info(ctx, cons)? {
            return Ok(info);
        }
        let params = self.params(ctx)?;
        let info = ValidatorSigningInfo::new(*cons, ctx.height(), &params);
        store::set_signing_info(ctx, &info)?;
        Ok(info)
    }

    /// Records one vote of the previous block and jails on excessive downtime
    ///
    /// Only bonded validators are tracked. The vote moves through a circular
    /// bitmap of `signed_blocks_window` slots; a miss that pushes the counter
    /// past `max_missed_blocks` slashes by `slash_fraction_downtime` for the
    /// previous height, jails until `now + downtime_jail_duration` and clears
    /// the bitmap.
    pub fn handle_validator_signature(
        &self,
        ctx: &mut Context<'_>,
        cons: &ConsAddress,
        power: i64,
        signed: bool,
    ) -> Result<()> {
        let Some(validator) = self.staking.validator_by_cons(ctx, cons)? else {
            debug!("ignored vote of unknown consensus address {}", cons);
            return Ok(());
        };
        if !validator.is_bonded() {
            return Ok(());
        }
        let params = self.params(ctx)?;
        let mut info = self.ensure_signing_info(ctx, cons)?;
        if info.tombstoned {
            return Ok(());
        }
        if info.is_stale(&params) {
            store::clear_missed(ctx, cons)?;
            info = ValidatorSigningInfo {
                jailed_until: info.jailed_until,
                ..ValidatorSigningInfo::new(*cons, info.start_height, &params)
            };
        }

        let window = params.signed_blocks_window.max(1) as u64;
        let index = info.index_offset % window;
        info.index_offset = (index + 1) % window;
        let was_missed = store::is_missed(ctx, cons, index)?;
        match (was_missed, signed) {
            (false, false) => {
                store::set_missed(ctx, cons, index, true)?;
                info.missed_blocks_counter += 1;
            }
            (true, true) => {
                store::set_missed(ctx, cons, index, false)?;
                info.missed_blocks_counter = info.missed_blocks_counter.saturating_sub(1);
            }
            _ => {}
        }

        if !signed {
            ctx.emit(
                Event::new(types::LIVENESS)
                    .attr("address", cons)
                    .attr("missed_blocks", info.missed_blocks_counter)
                    .attr("height", ctx.height()),
            );
        }

        let max_missed = max_missed_blocks(&params);
        if info.missed_blocks_counter > max_missed && !validator.jailed {
            let infraction_height = ctx.height().saturating_sub(1);
            self.staking.slash(
                ctx,
                cons,
                infraction_height,
                power,
                params.slash_fraction_downtime,
                SlashReason::Downtime,
            )?;
            let mut slashed = self.staking.validator(ctx, &validator.operator_address)?;
            self.staking.jail(ctx, &mut slashed)?;
            info.jailed_until = ctx.block_time().add(params.downtime_jail_duration);
            info.missed_blocks_counter = 0;
            info.index_offset = 0;
            store::clear_missed(ctx, cons)?;
            info!(
                "validator {} jailed for downtime until {} ({} misses over {})",
                validator.operator_address,
                info.jailed_until.to_rfc3339(),
                max_missed + 1,
                window
            );
        }
        store::set_signing_info(ctx, &info)
    }

    /// Punishes a duplicate vote at `infraction_height`
    ///
    /// Slashes by `slash_fraction_double_sign`, jails forever and tombstones.
    ///
    /// # Returns
    /// `false` when the validator is unknown or already tombstoned
    pub fn handle_double_sign(
        &self,
        ctx: &mut Context<'_>,
        cons: &ConsAddress,
        infraction_height: u64,
        power: i64,
    ) -> Result<bool> {
        let Some(validator) = self.staking.validator_by_cons(ctx, cons)? else {
            warn!("ignored double-sign evidence for unknown validator {}", cons);
            return Ok(false);
        };
        let mut info = self.ensure_signing_info(ctx, cons)?;
        if info.tombstoned {
            warn!("ignored double-sign evidence for tombstoned validator {}", cons);
            return Ok(false);
        }
        let params = self.params(ctx)?;
        self.staking.slash(
            ctx,
            cons,
            infraction_height,
            power,
            params.slash_fraction_double_sign,
            SlashReason::DoubleSign,
        )?;
        let mut slashed = self.staking.validator(ctx, &validator.operator_address)?;
        self.staking.jail(ctx, &mut slashed)?;
        info.jailed_until = Timestamp::MAX;
        info.tombstoned = true;
        store::set_signing_info(ctx, &info)?;
        info!(
            "validator {} tombstoned for double signing at height {}",
            validator.operator_address, infraction_height
        );
        self.staking
            .hooks()
            .after_validator_tombstoned(ctx, &validator.operator_address)?;
        Ok(true)
    }

    /// Executes [`MsgUnjail`]
    pub fn unjail(&self, ctx: &mut Context<'_>, msg: &MsgUnjail) -> Result<()> {
        let mut validator = self.staking.validator(ctx, &msg.validator_address)?;
        if !validator.jailed {
            return Err(NmxError::ValidatorNotJailed(msg.validator_address.to_string()));
        }
        if let Some(info) = store::get_signing_info(ctx, &validator.cons_address())? {
            if info.tombstoned {
                return Err(NmxError::ValidatorJailed(format!(
                    "{} is tombstoned",
                    msg.validator_address
                )));
            }
            if ctx.block_time() < info.jailed_until {
                return Err(NmxError::ValidatorJailed(format!(
                    "{} is jailed until {}",
                    msg.validator_address,
                    info.jailed_until.to_rfc3339()
                )));
            }
        }
        let self_bond = self.staking.self_delegation_tokens(ctx, &validator)?;
        if self_bond < validator.min_self_delegation {
            return Err(NmxError::SelfDelegationBelowMinimum(format!(
                "self-delegation {} is below the minimum {}",
                self_bond, validator.min_self_delegation
            )));
        }
        self.staking.unjail(ctx, &mut validator)?;
        ctx.emit(Event::new(types::UNJAIL).attr("validator", msg.validator_address));
        info!("validator {} unjailed", msg.validator_address);
        Ok(())
    }

    /// Processes the previous block's votes
    pub fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        let commit = abci::last_commit(ctx)?;
        for vote in &commit.votes {
            self.handle_validator_signature(ctx, &vote.validator.address, vote.validator.power, vote.signed_last_block)?;
        }
        Ok(())
    }

    /// Every signing record's missed counter fits its window
    pub fn missed_counter_invariant(&self, ctx: &mut Context<'_>) -> Result<Option<String>> {
        for info in store::all_signing_infos(ctx)? {
            if info.missed_blocks_counter > info.signed_blocks_window.max(0) as u64 {
                return Ok(Some(format!(
                    "validator {} missed {} blocks in a window of {}",
                    info.address, info.missed_blocks_counter, info.signed_blocks_window
                )));
            }
        }
        Ok(None)
    }
}
