// src/modules/staking/keeper.rs

//! Staking keeper: validator registration and lookups.

use super::hooks::ValidatorHooks;
use super::msgs::{MsgCreateValidator, MsgEditValidator};
use super::params::StakingParams;
use super::store;
use super::types::{Delegation, Validator};
use crate::coins::Coin;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::Int;
use crate::modules::auth::module_accounts;
use crate::modules::bank::BankKeeper;
use crate::modules::params::ParamsKeeper;
use nmx_crypto::{AccAddress, ConsAddress, ValAddress};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Minimum time between two commission changes
pub const COMMISSION_UPDATE_INTERVAL: Duration = Duration::from_secs(86_400);

/// Validators, delegations and the two token pools
#[derive(Clone)]
pub struct StakingKeeper {
    pub(super) bank: BankKeeper,
    pub(super) hooks: Arc<dyn ValidatorHooks>,
}

impl fmt::Debug for StakingKeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StakingKeeper").field("bank", &self.bank).finish()
    }
}

impl StakingKeeper {
    /// Keeper without hooks
    pub fn new(bank: BankKeeper) -> Self {
        Self {
            bank,
            hooks: Arc::new(()),
        }
    }

    /// Replaces the lifecycle hooks
    pub fn with_hooks(mut self, hooks: impl ValidatorHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Bank keeper used for custody
    pub fn bank(&self) -> &BankKeeper {
        &self.bank
    }

    /// Lifecycle hooks
    pub fn hooks(&self) -> &dyn ValidatorHooks {
        self.hooks.as_ref()
    }

    /// Current parameters
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<StakingParams> {
        ParamsKeeper.get(ctx)
    }

    pub(super) fn check_denom(&self, ctx: &mut Context<'_>, coin: &Coin) -> Result<StakingParams> {
        let params = self.params(ctx)?;
        if coin.denom != params.bond_denom {
            return Err(NmxError::InvalidCoins(format!(
                "invalid coin denomination: got {}, expected {}",
                coin.denom, params.bond_denom
            )));
        }
        Ok(params)
    }

    /// Pool holding the tokens of `validator`
    pub fn pool_of(validator: &Validator) -> &'static str {
        if validator.is_bonded() {
            module_accounts::BONDED_POOL
        } else {
            module_accounts::NOT_BONDED_POOL
        }
    }

    /// Validator by operator address
    pub fn get_validator(&self, ctx: &mut Context<'_>, addr: &ValAddress) -> Result<Option<Validator>> {
        store::get_validator(ctx, addr)
    }

    /// Validator by operator address, failing when unknown
    pub fn validator(&self, ctx: &mut Context<'_>, addr: &ValAddress) -> Result<Validator> {
        store::get_validator(ctx, addr)?
            .ok_or_else(|| NmxError::NoValidatorFound(addr.to_string()))
    }

    /// Validator by consensus address
    pub fn validator_by_cons(&self, ctx: &mut Context<'_>, cons: &ConsAddress) -> Result<Option<Validator>> {
        store::get_validator_by_cons(ctx, cons)
    }

    /// Writes a validator record
    ///
    /// Used by modules mirroring their own scores onto the validator.
    pub fn set_validator(&self, ctx: &mut Context<'_>, validator: &Validator) -> Result<()> {
        store::set_validator(ctx, validator)
    }

    /// Every validator in operator-address order
    pub fn all_validators(&self, ctx: &mut Context<'_>) -> Result<Vec<Validator>> {
        store::all_validators(ctx)
    }

    /// Bonded validators by power, descending
    pub fn bonded_validators(&self, ctx: &mut Context<'_>) -> Result<Vec<Validator>> {
        let mut bonded: Vec<Validator> = store::all_validators(ctx)?
            .into_iter()
            .filter(|v| v.is_bonded())
            .collect();
        bonded.sort_by(|a, b| {
            b.potential_power()
                .cmp(&a.potential_power())
                .then(a.operator_address.cmp(&b.operator_address))
        });
        Ok(bonded)
    }

    /// Delegation of `del` to `val`
    pub fn get_delegation(&self, ctx: &mut Context<'_>, del: &AccAddress, val: &ValAddress) -> Result<Option<Delegation>> {
        store::get_delegation(ctx, del, val)
    }

    /// Every delegation to `val`, in delegator order
    pub fn validator_delegations(&self, ctx: &mut Context<'_>, val: &ValAddress) -> Result<Vec<Delegation>> {
        store::validator_delegations(ctx, val)
    }

    /// Every delegation of `del`
    pub fn delegator_delegations(&self, ctx: &mut Context<'_>, del: &AccAddress) -> Result<Vec<Delegation>> {
        store::delegator_delegations(ctx, del)
    }

    /// Tokens the operator currently has bonded to its own validator
    pub fn self_delegation_tokens(&self, ctx: &mut Context<'_>, validator: &Validator) -> Result<Int> {
        let shares = store::get_delegation(ctx, &validator.operator_account(), &validator.operator_address)?
            .map(|d| d.shares)
            .unwrap_or_default();
        Ok(validator.tokens_from_shares(shares).truncate_int())
    }

    /// Tokens `del` has bonded across every bonded validator
    pub fn bonded_tokens_of(&self, ctx: &mut Context<'_>, del: &AccAddress) -> Result<Int> {
        let mut total = Int::ZERO;
        for delegation in store::delegator_delegations(ctx, del)? {
            if let Some(validator) = store::get_validator(ctx, &delegation.validator_address)? {
                if validator.is_bonded() {
                    total = total.checked_add(validator.tokens_from_shares(delegation.shares).truncate_int())?;
                }
            }
        }
        Ok(total)
    }

    /// Sets the jailed flag
    pub fn jail(&self, ctx: &mut Context<'_>, validator: &mut Validator) -> Result<()> {
        if !validator.jailed {
            validator.jailed = true;
            store::set_validator(ctx, validator)?;
            info!("jailed validator {} at height {}", validator.operator_address, ctx.height());
        }
        Ok(())
    }

    /// Clears the jailed flag
    pub fn unjail(&self, ctx: &mut Context<'_>, validator: &mut Validator) -> Result<()> {
        validator.jailed = false;
        store::set_validator(ctx, validator)
    }

    /// Executes [`MsgCreateValidator`]
    pub fn create_validator(&self, ctx: &mut Context<'_>, msg: &MsgCreateValidator) -> Result<Validator> {
        if store::get_validator(ctx, &msg.validator_address)?.is_some() {
            return Err(NmxError::ValidatorExists(msg.validator_address.to_string()));
        }
        let cons = msg.pubkey.consensus_address();
        if store::has_cons_address(ctx, &cons)? {
            return Err(NmxError::ValidatorPubKeyExists(cons.to_string()));
        }
        let params = self.check_denom(ctx, &msg.value)?;
        if msg.value.amount < params.min_self_delegation {
            return Err(NmxError::SelfDelegationBelowMinimum(format!(
                "{} below chain minimum {}",
                msg.value.amount, params.min_self_delegation
            )));
        }
        if msg.value.amount < msg.min_self_delegation {
            return Err(NmxError::SelfDelegationBelowMinimum(format!(
                "{} below declared minimum {}",
                msg.value.amount, msg.min_self_delegation
            )));
        }

        let mut validator = Validator::new(
            msg.validator_address,
            msg.pubkey,
            msg.description.clone(),
            msg.commission,
            msg.min_self_delegation,
            ctx.block_time(),
        );
        store::set_validator(ctx, &validator)?;
        self.bond_tokens(ctx, &msg.delegator_address, &mut validator, msg.value.amount)?;
        self.hooks.after_validator_created(ctx, &validator)?;

        ctx.emit(
            Event::new(types::CREATE_VALIDATOR)
                .attr("validator", msg.validator_address)
                .attr("amount", &msg.value),
        );
        info!(
            "created validator {} ({}) with self-delegation {}",
            validator.operator_address, validator.description.moniker, msg.value
        );
        store::get_validator(ctx, &msg.validator_address)?
            .ok_or_else(|| NmxError::NoValidatorFound(msg.validator_address.to_string()))
    }

    /// Executes [`MsgEditValidator`]
    pub fn edit_validator(&self, ctx: &mut Context<'_>, msg: &MsgEditValidator) -> Result<()> {
        let mut validator = self.validator(ctx, &msg.validator_address)?;
        let now = ctx.block_time();

        if let Some(description) = &msg.description {
            validator.description = description.clone();
        }

        if let Some(rate) = msg.commission_rate {
            let commission = &mut validator.commission;
            if now.since(commission.update_time) < COMMISSION_UPDATE_INTERVAL {
                return Err(NmxError::CommissionUpdateTooSoon(format!(
                    "last change at {}",
                    commission.update_time
                )));
            }
            if rate.is_negative() || rate > commission.rates.max_rate {
                return Err(NmxError::InvalidCommissionRate(format!(
                    "rate {} outside [0, {}]",
                    rate, commission.rates.max_rate
                )));
            }
            if (rate - commission.rates.rate).abs() > commission.rates.max_change_rate {
                return Err(NmxError::InvalidCommissionRate(format!(
                    "change from {} to {} exceeds {}",
                    commission.rates.rate, rate, commission.rates.max_change_rate
                )));
            }
            commission.rates.rate = rate;
            commission.update_time = now;
        }

        if let Some(min) = msg.min_self_delegation {
            if min <= validator.min_self_delegation {
                return Err(NmxError::InvalidMessage(format!(
                    "minimum self delegation cannot decrease from {} to {}",
                    validator.min_self_delegation, min
                )));
            }
            if min > validator.tokens {
                return Err(NmxError::SelfDelegationBelowMinimum(format!(
                    "minimum {} exceeds validator tokens {}",
                    min, validator.tokens
                )));
            }
            validator.min_self_delegation = min;
        }

        store::set_validator(ctx, &validator)?;
        ctx.emit(
            Event::new(types::EDIT_VALIDATOR)
                .attr("validator", validator.operator_address)
                .attr("commission_rate", validator.commission.rates.rate)
                .attr("min_self_delegation", validator.min_self_delegation),
        );
        Ok(())
    }
}
