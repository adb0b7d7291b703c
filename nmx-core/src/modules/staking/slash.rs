// src/modules/staking/slash.rs

//! Slash application.

use super::keeper::StakingKeeper;
use super::store;
use super::types::{SlashReason, ValidatorSlashEvent};
use crate::coins::Coins;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::{Dec, Int};
use crate::modules::auth::module_accounts;
use nmx_crypto::ConsAddress;
use tracing::{info, warn};

impl StakingKeeper {
    fn burn(&self, ctx: &mut Context<'_>, pool: &str, amount: Int) -> Result<()> {
        if !amount.is_positive() {
            return Ok(());
        }
        let denom = self.params(ctx)?.bond_denom;
        self.bank.burn_coins(ctx, pool, &Coins::single(denom, amount))
    }

    /// Slashes the validator behind `cons` by `fraction` for an infraction at `infraction_height`
    ///
    /// The validator's tokens become `floor(tokens * (1 - fraction))`, but
    /// never less than one while delegator shares remain.
    /// Unbonding and redelegation entries created at or after the infraction
    /// and not yet mature are debited in proportion. Delegator shares are
    /// left untouched, so every delegator is diluted alike.
    ///
    /// # Returns
    /// Total tokens burned
    pub fn slash(
        &self,
        ctx: &mut Context<'_>,
        cons: &ConsAddress,
        infraction_height: u64,
        power: i64,
        fraction: Dec,
        reason: SlashReason,
    ) -> Result<Int> {
        if fraction.is_negative() || fraction >= Dec::ONE {
            return Err(NmxError::InvalidParams(format!("slash fraction {} outside [0, 1)", fraction)));
        }
        let Some(validator) = store::get_validator_by_cons(ctx, cons)? else {
            warn!("ignored slash of unknown validator {}", cons);
            return Ok(Int::ZERO);
        };
        let val = validator.operator_address;
        let now = ctx.block_time();
        let mut burned = Int::ZERO;

        if infraction_height < ctx.height() {
            for mut ubd in store::validator_unbondings(ctx, &val)? {
                let mut changed = false;
                for entry in ubd.entries.iter_mut() {
                    if entry.creation_height < infraction_height || entry.is_mature(now) {
                        continue;
                    }
                    let debit = entry.initial_balance.mul_dec_truncate(fraction).min(entry.balance);
                    if debit.is_positive() {
                        entry.balance = entry.balance.checked_sub(debit)?;
                        burned = burned.checked_add(debit)?;
                        changed = true;
                        self.burn(ctx, module_accounts::NOT_BONDED_POOL, debit)?;
                    }
                }
                if changed {
                    store::set_unbonding(ctx, &ubd)?;
                }
            }

            for red in store::validator_redelegations_from(ctx, &val)? {
                for entry in &red.entries {
                    if entry.creation_height < infraction_height || entry.is_mature(now) {
                        continue;
                    }
                    let dst = red.validator_dst_address;
                    let Some(delegation) = store::get_delegation(ctx, &red.delegator_address, &dst)? else {
                        continue;
                    };
                    let shares = entry.shares_dst.mul(fraction).min(delegation.shares);
                    if !shares.is_positive() {
                        continue;
                    }
                    let pool = match store::get_validator(ctx, &dst)? {
                        Some(v) => StakingKeeper::pool_of(&v),
                        None => continue,
                    };
                    let (_, tokens) = self.unbond(ctx, &red.delegator_address, &dst, shares)?;
                    self.burn(ctx, pool, tokens)?;
                    burned = burned.checked_add(tokens)?;
                }
            }
        }

        let mut validator = self.validator(ctx, &val)?;
        let mut remaining = validator.tokens.mul_dec_truncate(Dec::ONE - fraction);
        if remaining.is_zero() && validator.tokens.is_positive() && validator.delegator_shares.is_positive() {
            // shares must keep a token to price them
            remaining = Int::new(1);
        }
        let slashed = validator.tokens.checked_sub(remaining)?;
        let pool = StakingKeeper::pool_of(&validator);
        validator.tokens = remaining;
        store::set_validator(ctx, &validator)?;
        self.burn(ctx, pool, slashed)?;
        burned = burned.checked_add(slashed)?;

        let event = ValidatorSlashEvent {
            validator: val,
            height: ctx.height(),
            sequence: 0,
            infraction_height,
            timestamp: now,
            reason,
            slash_factor: fraction,
            tokens_slashed: burned,
            power,
        };
        ctx.emit(
            Event::new(types::SLASH)
                .attr("validator", val)
                .attr("power", power)
                .attr("reason", reason)
                .attr("fraction", fraction)
                .attr("burned", burned),
        );
        info!(
            "slashed validator {} by {} for {} (infraction height {}, burned {})",
            val, fraction, reason, infraction_height, burned
        );
        self.hooks.after_validator_slashed(ctx, &event)?;
        Ok(burned)
    }
}
