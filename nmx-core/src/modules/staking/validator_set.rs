// src/modules/staking/validator_set.rs

//! Bond-state transitions and validator-set updates.

use super::keeper::StakingKeeper;
use super::store;
use super::types::{BondStatus, HistoricalInfo, Validator};
use crate::abci::ValidatorUpdate;
use crate::coins::Coins;
use crate::context::Context;
use crate::errors::Result;
use crate::modules::auth::module_accounts;
use nmx_crypto::ValAddress;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

impl StakingKeeper {
    fn move_tokens(&self, ctx: &mut Context<'_>, validator: &Validator, from: &str, to: &str) -> Result<()> {
        if !validator.tokens.is_positive() {
            return Ok(());
        }
        let denom = self.params(ctx)?.bond_denom;
        self.bank
            .send_module_to_module(ctx, from, to, &Coins::single(denom, validator.tokens))
    }

    fn bond_validator(&self, ctx: &mut Context<'_>, validator: &mut Validator) -> Result<()> {
        if validator.status == BondStatus::Unbonding {
            store::remove_validator_queue(ctx, validator.unbonding_time, &validator.operator_address)?;
        }
        self.move_tokens(ctx, validator, module_accounts::NOT_BONDED_POOL, module_accounts::BONDED_POOL)?;
        validator.status = BondStatus::Bonded;
        store::set_validator(ctx, validator)?;
        info!(
            "validator {} bonded with power {}",
            validator.operator_address,
            validator.potential_power()
        );
        Ok(())
    }

    fn begin_unbonding_validator(&self, ctx: &mut Context<'_>, validator: &mut Validator) -> Result<()> {
        let params = self.params(ctx)?;
        self.move_tokens(ctx, validator, module_accounts::BONDED_POOL, module_accounts::NOT_BONDED_POOL)?;
        validator.status = BondStatus::Unbonding;
        validator.unbonding_height = ctx.height();
        validator.unbonding_time = ctx.block_time().add(params.unbonding_time);
        store::set_validator(ctx, validator)?;
        store::insert_validator_queue(ctx, validator.unbonding_time, &validator.operator_address)?;
        info!(
            "validator {} left the active set, unbonding until {}",
            validator.operator_address, validator.unbonding_time
        );
        Ok(())
    }

    /// Recomputes the active set and returns the power diff
    ///
    /// Candidates are non-jailed validators with power of at least one,
    /// ordered by power descending and operator address ascending. A removed
    /// validator is reported with power zero.
    pub fn apply_validator_set_updates(&self, ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
        let params = self.params(ctx)?;
        let last: BTreeMap<ValAddress, i64> = store::all_last_powers(ctx)?.into_iter().collect();

        let mut validators = store::all_validators(ctx)?;
        let mut candidates: Vec<Validator> = validators
            .iter()
            .filter(|v| !v.jailed && v.potential_power() >= 1)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            b.potential_power()
                .cmp(&a.potential_power())
                .then(a.operator_address.cmp(&b.operator_address))
        });
        candidates.truncate(params.max_validators as usize);

        let mut updates = Vec::new();
        let mut active = BTreeSet::new();
        let mut total_power: i64 = 0;
        for mut validator in candidates {
            if !validator.is_bonded() {
                self.bond_validator(ctx, &mut validator)?;
            }
            let power = validator.potential_power();
            if last.get(&validator.operator_address) != Some(&power) {
                updates.push(ValidatorUpdate {
                    pub_key: validator.consensus_pubkey,
                    power,
                });
                store::set_last_power(ctx, &validator.operator_address, power)?;
            }
            total_power = total_power.saturating_add(power);
            active.insert(validator.operator_address);
        }

        validators.retain(|v| !active.contains(&v.operator_address));
        for mut validator in validators {
            let was_reported = last.contains_key(&validator.operator_address);
            if validator.is_bonded() {
                self.begin_unbonding_validator(ctx, &mut validator)?;
            }
            if was_reported {
                store::remove_last_power(ctx, &validator.operator_address)?;
                updates.push(ValidatorUpdate {
                    pub_key: validator.consensus_pubkey,
                    power: 0,
                });
            }
        }

        store::set_last_total_power(ctx, total_power)?;
        if !updates.is_empty() {
            debug!(
                "{} validator updates at height {}, total power {}",
                updates.len(),
                ctx.height(),
                total_power
            );
        }
        Ok(updates)
    }

    /// Finishes unbonding of validators whose unbonding time has passed
    pub fn unbond_mature_validators(&self, ctx: &mut Context<'_>) -> Result<()> {
        let now = ctx.block_time();
        for addr in store::take_mature_validators(ctx, now)? {
            let Some(mut validator) = store::get_validator(ctx, &addr)? else {
                continue;
            };
            if validator.status != BondStatus::Unbonding || validator.unbonding_time > now {
                continue;
            }
            validator.status = BondStatus::Unbonded;
            if validator.delegator_shares.is_zero() {
                store::remove_validator(ctx, &validator)?;
                self.hooks.after_validator_removed(ctx, &validator)?;
                info!("removed validator {}", validator.operator_address);
            } else {
                store::set_validator(ctx, &validator)?;
            }
        }
        Ok(())
    }

    /// Records the bonded set of the current height and prunes old entries
    pub fn track_historical_info(&self, ctx: &mut Context<'_>) -> Result<()> {
        let entries = u64::from(self.params(ctx)?.historical_entries);
        let height = ctx.height();
        for info in store::all_historical_info(ctx)? {
            if info.height + entries <= height {
                store::remove_historical_info(ctx, info.height)?;
            } else {
                break;
            }
        }
        if entries == 0 {
            return Ok(());
        }
        let info = HistoricalInfo {
            height,
            time: ctx.block_time(),
            valset: self.bonded_validators(ctx)?,
        };
        store::set_historical_info(ctx, &info)
    }

    /// Header and bonded set recorded at `height`
    pub fn historical_info(&self, ctx: &mut Context<'_>, height: u64) -> Result<Option<HistoricalInfo>> {
        store::get_historical_info(ctx, height)
    }

    /// Last reported power of every active validator
    pub fn last_validator_powers(&self, ctx: &mut Context<'_>) -> Result<Vec<(ValAddress, i64)>> {
        store::all_last_powers(ctx)
    }

    /// Sum of the last reported powers
    pub fn last_total_power(&self, ctx: &mut Context<'_>) -> Result<i64> {
        store::get_last_total_power(ctx)
    }
}
