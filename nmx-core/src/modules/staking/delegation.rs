// src/modules/staking/delegation.rs

//! Delegation, unbonding and redelegation.

use super::keeper::StakingKeeper;
use super::msgs::{MsgBeginRedelegate, MsgDelegate, MsgUndelegate};
use super::store;
use super::types::{
    BondStatus, Delegation, Redelegation, RedelegationEntry, UnbondingDelegation,
    UnbondingDelegationEntry, Validator,
};
use crate::coins::Coins;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::{Dec, Int};
use crate::modules::auth::module_accounts;
use crate::time::Timestamp;
use nmx_crypto::{AccAddress, ValAddress};
use tracing::debug;

impl StakingKeeper {
    /// Adds `amount` tokens and the matching shares to `del`'s delegation
    ///
    /// Custody is the caller's concern. The validator is written back.
    pub(super) fn add_shares(
        &self,
        ctx: &mut Context<'_>,
        del: &AccAddress,
        validator: &mut Validator,
        amount: Int,
    ) -> Result<Dec> {
        let issued = validator.add_tokens_from_delegation(amount)?;
        let mut delegation = store::get_delegation(ctx, del, &validator.operator_address)?.unwrap_or(Delegation {
            delegator_address: *del,
            validator_address: validator.operator_address,
            shares: Dec::ZERO,
        });
        delegation.shares += issued;
        store::set_delegation(ctx, &delegation)?;
        store::set_validator(ctx, validator)?;
        Ok(issued)
    }

    /// Moves `amount` from `del` into the validator's pool and issues shares
    pub(super) fn bond_tokens(
        &self,
        ctx: &mut Context<'_>,
        del: &AccAddress,
        validator: &mut Validator,
        amount: Int,
    ) -> Result<Dec> {
        let denom = self.params(ctx)?.bond_denom;
        self.bank
            .delegate_to_module(ctx, del, Self::pool_of(validator), &Coins::single(denom, amount))?;
        self.add_shares(ctx, del, validator, amount)
    }

    /// Shares to remove for an undelegation of `amount` tokens
    fn shares_for_amount(validator: &Validator, delegation: &Delegation, amount: Int) -> Result<Dec> {
        let held = validator.tokens_from_shares(delegation.shares).truncate_int();
        if amount > held {
            return Err(NmxError::InvalidDelegation(format!(
                "requested {} but delegation is worth {}",
                amount, held
            )));
        }
        if amount == held {
            return Ok(delegation.shares);
        }
        let shares = validator.shares_from_tokens(amount)?;
        Ok(shares.min(delegation.shares))
    }

    /// Removes `shares` from `del`'s delegation and returns the tokens released
    ///
    /// Jails the validator when its operator's self-delegation drops below
    /// the validator's minimum, and deletes an unbonded validator left
    /// without shares.
    pub(super) fn unbond(
        &self,
        ctx: &mut Context<'_>,
        del: &AccAddress,
        val: &ValAddress,
        shares: Dec,
    ) -> Result<(Validator, Int)> {
        let mut delegation = store::get_delegation(ctx, del, val)?
            .ok_or_else(|| NmxError::NoDelegation(format!("{} -> {}", del, val)))?;
        if shares > delegation.shares {
            return Err(NmxError::InvalidDelegation(format!(
                "cannot remove {} of {} shares",
                shares, delegation.shares
            )));
        }
        let mut validator = self.validator(ctx, val)?;

        delegation.shares -= shares;
        if delegation.shares.is_zero() {
            store::remove_delegation(ctx, del, val)?;
        } else {
            store::set_delegation(ctx, &delegation)?;
        }

        let amount = validator.remove_delegator_shares(shares)?;

        if *del == validator.operator_account() && !validator.jailed {
            let remaining = validator.tokens_from_shares(delegation.shares).truncate_int();
            if remaining < validator.min_self_delegation {
                validator.jailed = true;
                debug!(
                    "validator {} self-delegation {} fell below {}",
                    validator.operator_address, remaining, validator.min_self_delegation
                );
            }
        }

        if validator.delegator_shares.is_zero() && validator.status == BondStatus::Unbonded {
            store::remove_validator(ctx, &validator)?;
            self.hooks.after_validator_removed(ctx, &validator)?;
        } else {
            store::set_validator(ctx, &validator)?;
        }
        Ok((validator, amount))
    }

    /// Executes [`MsgDelegate`] and returns the shares issued
    pub fn delegate(&self, ctx: &mut Context<'_>, msg: &MsgDelegate) -> Result<Dec> {
        self.check_denom(ctx, &msg.amount)?;
        let mut validator = self.validator(ctx, &msg.validator_address)?;
        if !validator.is_bonded() {
            return Err(NmxError::ValidatorNotBonded(msg.validator_address.to_string()));
        }
        let shares = self.bond_tokens(ctx, &msg.delegator_address, &mut validator, msg.amount.amount)?;
        ctx.emit(
            Event::new(types::DELEGATE)
                .attr("validator", msg.validator_address)
                .attr("delegator", msg.delegator_address)
                .attr("amount", &msg.amount)
                .attr("new_shares", shares),
        );
        Ok(shares)
    }

    /// Executes [`MsgUndelegate`] and returns the completion time
    pub fn undelegate(&self, ctx: &mut Context<'_>, msg: &MsgUndelegate) -> Result<Timestamp> {
        let params = self.check_denom(ctx, &msg.amount)?;
        let validator = self.validator(ctx, &msg.validator_address)?;
        let delegation = store::get_delegation(ctx, &msg.delegator_address, &msg.validator_address)?
            .ok_or_else(|| NmxError::NoDelegation(format!("{} -> {}", msg.delegator_address, msg.validator_address)))?;
        let shares = Self::shares_for_amount(&validator, &delegation, msg.amount.amount)?;

        let mut ubd = store::get_unbonding(ctx, &msg.delegator_address, &msg.validator_address)?.unwrap_or(
            UnbondingDelegation {
                delegator_address: msg.delegator_address,
                validator_address: msg.validator_address,
                entries: Vec::new(),
            },
        );
        if ubd.entries.len() >= params.max_entries as usize {
            return Err(NmxError::MaxEntries(format!(
                "{} unbonding entries for {} -> {}",
                ubd.entries.len(),
                msg.delegator_address,
                msg.validator_address
            )));
        }

        let was_bonded = validator.is_bonded();
        let (_, amount) = self.unbond(ctx, &msg.delegator_address, &msg.validator_address, shares)?;
        if was_bonded && amount.is_positive() {
            self.bank.send_module_to_module(
                ctx,
                module_accounts::BONDED_POOL,
                module_accounts::NOT_BONDED_POOL,
                &Coins::single(params.bond_denom.clone(), amount),
            )?;
        }

        let completion_time = ctx.block_time().add(params.unbonding_time);
        ubd.entries.push(UnbondingDelegationEntry {
            creation_height: ctx.height(),
            completion_time,
            initial_balance: amount,
            balance: amount,
        });
        store::set_unbonding(ctx, &ubd)?;
        store::insert_unbonding_queue(ctx, completion_time, &msg.delegator_address, &msg.validator_address)?;

        ctx.emit(
            Event::new(types::UNBOND)
                .attr("validator", msg.validator_address)
                .attr("delegator", msg.delegator_address)
                .attr("amount", amount)
                .attr("completion_time", completion_time),
        );
        Ok(completion_time)
    }

    /// Executes [`MsgBeginRedelegate`] and returns the completion time
    pub fn begin_redelegate(&self, ctx: &mut Context<'_>, msg: &MsgBeginRedelegate) -> Result<Timestamp> {
        let del = msg.delegator_address;
        let (src, dst) = (msg.validator_src_address, msg.validator_dst_address);
        if src == dst {
            return Err(NmxError::SelfRedelegation);
        }
        let params = self.check_denom(ctx, &msg.amount)?;
        let src_validator = self.validator(ctx, &src)?;
        let mut dst_validator = self.validator(ctx, &dst)?;
        if !dst_validator.is_bonded() {
            return Err(NmxError::ValidatorNotBonded(dst.to_string()));
        }

        let now = ctx.block_time();
        for incoming in store::redelegations_into(ctx, &del, &src)? {
            if incoming.entries.iter().any(|e| !e.is_mature(now)) {
                return Err(NmxError::TransitiveRedelegation(format!(
                    "{} still redelegating from {} into {}",
                    del, incoming.validator_src_address, src
                )));
            }
        }

        let mut red = store::get_redelegation(ctx, &del, &src, &dst)?.unwrap_or(Redelegation {
            delegator_address: del,
            validator_src_address: src,
            validator_dst_address: dst,
            entries: Vec::new(),
        });
        if red.entries.len() >= params.max_entries as usize {
            return Err(NmxError::MaxEntries(format!(
                "{} redelegation entries for {} from {} to {}",
                red.entries.len(),
                del,
                src,
                dst
            )));
        }

        let delegation = store::get_delegation(ctx, &del, &src)?
            .ok_or_else(|| NmxError::NoDelegation(format!("{} -> {}", del, src)))?;
        let shares = Self::shares_for_amount(&src_validator, &delegation, msg.amount.amount)?;
        let src_status = src_validator.status;
        let src_unbonding_time = src_validator.unbonding_time;
        let src_pool = StakingKeeper::pool_of(&src_validator);

        let (_, amount) = self.unbond(ctx, &del, &src, shares)?;
        if !amount.is_positive() {
            return Err(NmxError::InvalidDelegation("redelegation amount rounds to zero".into()));
        }
        if src_pool != module_accounts::BONDED_POOL {
            self.bank.send_module_to_module(
                ctx,
                src_pool,
                module_accounts::BONDED_POOL,
                &Coins::single(params.bond_denom.clone(), amount),
            )?;
        }
        let shares_dst = self.add_shares(ctx, &del, &mut dst_validator, amount)?;

        let completion_time = match src_status {
            BondStatus::Bonded => now.add(params.unbonding_time),
            BondStatus::Unbonding => src_unbonding_time,
            BondStatus::Unbonded => now,
        };
        if src_status != BondStatus::Unbonded {
            red.entries.push(RedelegationEntry {
                creation_height: ctx.height(),
                completion_time,
                initial_balance: amount,
                shares_dst,
            });
            store::set_redelegation(ctx, &red)?;
            store::insert_redelegation_queue(ctx, completion_time, &del, &src, &dst)?;
        }

        ctx.emit(
            Event::new(types::REDELEGATE)
                .attr("source_validator", src)
                .attr("destination_validator", dst)
                .attr("delegator", del)
                .attr("amount", amount)
                .attr("completion_time", completion_time),
        );
        Ok(completion_time)
    }

    /// Pays out the matured entries of one unbonding record
    pub fn complete_unbonding(&self, ctx: &mut Context<'_>, del: &AccAddress, val: &ValAddress) -> Result<Int> {
        let Some(mut ubd) = store::get_unbonding(ctx, del, val)? else {
            return Ok(Int::ZERO);
        };
        let now = ctx.block_time();
        let (mature, pending): (Vec<_>, Vec<_>) = ubd.entries.into_iter().partition(|e| e.is_mature(now));
        let amount = Int::checked_sum(mature.iter().map(|e| e.balance))?;
        if amount.is_positive() {
            let denom = self.params(ctx)?.bond_denom;
            self.bank.undelegate_from_module(
                ctx,
                module_accounts::NOT_BONDED_POOL,
                del,
                &Coins::single(denom, amount),
            )?;
        }
        ubd.entries = pending;
        if ubd.entries.is_empty() {
            store::remove_unbonding(ctx, del, val)?;
        } else {
            store::set_unbonding(ctx, &ubd)?;
        }
        ctx.emit(
            Event::new(types::COMPLETE_UNBONDING)
                .attr("validator", val)
                .attr("delegator", del)
                .attr("amount", amount),
        );
        Ok(amount)
    }

    /// Drops the matured entries of one redelegation record
    pub fn complete_redelegation(
        &self,
        ctx: &mut Context<'_>,
        del: &AccAddress,
        src: &ValAddress,
        dst: &ValAddress,
    ) -> Result<()> {
        let Some(mut red) = store::get_redelegation(ctx, del, src, dst)? else {
            return Ok(());
        };
        let now = ctx.block_time();
        red.entries.retain(|e| !e.is_mature(now));
        if red.entries.is_empty() {
            store::remove_redelegation(ctx, &red)?;
        } else {
            store::set_redelegation(ctx, &red)?;
        }
        ctx.emit(
            Event::new(types::COMPLETE_REDELEGATION)
                .attr("source_validator", src)
                .attr("destination_validator", dst)
                .attr("delegator", del),
        );
        Ok(())
    }

    /// Completes every unbonding and redelegation due at the block time
    pub fn complete_mature_entries(&self, ctx: &mut Context<'_>) -> Result<()> {
        let now = ctx.block_time();
        for (del, val) in store::take_mature_unbondings(ctx, now)? {
            self.complete_unbonding(ctx, &del, &val)?;
        }
        for (del, src, dst) in store::take_mature_redelegations(ctx, now)? {
            self.complete_redelegation(ctx, &del, &src, &dst)?;
        }
        Ok(())
    }

    /// Pending unbondings of `del`
    pub fn delegator_unbondings(&self, ctx: &mut Context<'_>, del: &AccAddress) -> Result<Vec<UnbondingDelegation>> {
        store::delegator_unbondings(ctx, del)
    }

    /// Unbonding record of one pair
    pub fn get_unbonding(
        &self,
        ctx: &mut Context<'_>,
        del: &AccAddress,
        val: &ValAddress,
    ) -> Result<Option<UnbondingDelegation>> {
        store::get_unbonding(ctx, del, val)
    }

    /// Redelegation record of one triple
    pub fn get_redelegation(
        &self,
        ctx: &mut Context<'_>,
        del: &AccAddress,
        src: &ValAddress,
        dst: &ValAddress,
    ) -> Result<Option<Redelegation>> {
        store::get_redelegation(ctx, del, src, dst)
    }
}
