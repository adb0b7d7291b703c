// src/modules/staking/invariants.rs

//! Staking invariants.

use super::keeper::StakingKeeper;
use super::store;
use crate::context::Context;
use crate::errors::Result;
use crate::math::{Dec, Int};
use crate::modules::auth::module_accounts;
use crate::modules::crisis::InvariantRegistry;
use crate::store::names;
use std::collections::BTreeMap;

/// Pool balances equal the stake they hold
pub fn module_accounts_invariant(keeper: &StakingKeeper, ctx: &mut Context<'_>) -> Result<Option<String>> {
    let mut bonded = Int::ZERO;
    let mut not_bonded = Int::ZERO;
    for validator in store::all_validators(ctx)? {
        if validator.is_bonded() {
            bonded = bonded.checked_add(validator.tokens)?;
        } else {
            not_bonded = not_bonded.checked_add(validator.tokens)?;
        }
    }
    for ubd in store::all_unbondings(ctx)? {
        for entry in &ubd.entries {
            not_bonded = not_bonded.checked_add(entry.balance)?;
        }
    }
    let denom = keeper.params(ctx)?.bond_denom;
    let auth = keeper.bank().auth();
    let bonded_addr = auth.module_address(module_accounts::BONDED_POOL);
    let not_bonded_addr = auth.module_address(module_accounts::NOT_BONDED_POOL);
    let bonded_balance = keeper.bank().get_balance(ctx, &bonded_addr, &denom)?;
    let not_bonded_balance = keeper.bank().get_balance(ctx, &not_bonded_addr, &denom)?;
    if bonded_balance != bonded {
        return Ok(Some(format!(
            "bonded pool balance {} != bonded tokens {}",
            bonded_balance, bonded
        )));
    }
    if not_bonded_balance != not_bonded {
        return Ok(Some(format!(
            "not-bonded pool balance {} != unbonded tokens and unbonding entries {}",
            not_bonded_balance, not_bonded
        )));
    }
    Ok(None)
}

/// Every validator's shares equal the sum of its delegations
pub fn delegator_shares_invariant(ctx: &mut Context<'_>) -> Result<Option<String>> {
    let mut sums: BTreeMap<_, Dec> = BTreeMap::new();
    for delegation in store::all_delegations(ctx)? {
        *sums.entry(delegation.validator_address).or_default() += delegation.shares;
    }
    for validator in store::all_validators(ctx)? {
        let sum = sums.get(&validator.operator_address).copied().unwrap_or_default();
        if sum != validator.delegator_shares {
            return Ok(Some(format!(
                "validator {} has {} shares, delegations sum to {}",
                validator.operator_address, validator.delegator_shares, sum
            )));
        }
    }
    Ok(None)
}

/// Tokens and shares are non-negative, and shares without tokens never occur
pub fn positive_tokens_invariant(ctx: &mut Context<'_>) -> Result<Option<String>> {
    for validator in store::all_validators(ctx)? {
        if validator.tokens.is_negative() || validator.delegator_shares.is_negative() {
            return Ok(Some(format!(
                "validator {} has tokens {} and shares {}",
                validator.operator_address, validator.tokens, validator.delegator_shares
            )));
        }
        if validator.tokens.is_zero() != validator.delegator_shares.is_zero() {
            return Ok(Some(format!(
                "validator {} has tokens {} but shares {}",
                validator.operator_address, validator.tokens, validator.delegator_shares
            )));
        }
    }
    Ok(None)
}

/// Registers every staking invariant
pub fn register(keeper: &StakingKeeper, registry: &mut InvariantRegistry) {
    let k = keeper.clone();
    registry.register(names::STAKING, "module-accounts", move |ctx| module_accounts_invariant(&k, ctx));
    registry.register(names::STAKING, "delegator-shares", delegator_shares_invariant);
    registry.register(names::STAKING, "positive-tokens", positive_tokens_invariant);
}
