// src/modules/neuropos/invariants.rs

//! Reputation invariants.

use super::store;
use super::types::MAX_REPUTATION_HISTORY;
use crate::context::Context;
use crate::errors::Result;
use crate::modules::crisis::InvariantRegistry;
use crate::modules::staking::store as staking_store;

/// Module name the reputation routes are registered under
pub const REPUTATION_ROUTE_MODULE: &str = "reputation";

/// Every reputation and performance score lies in `[0, 1]`
pub fn reputation_range_invariant(ctx: &mut Context<'_>) -> Result<Option<String>> {
    for reputation in store::all_reputations(ctx)? {
        if !reputation.reputation.is_unit() {
            return Ok(Some(format!(
                "validator {} has reputation {}",
                reputation.validator, reputation.reputation
            )));
        }
    }
    for validator in staking_store::all_validators(ctx)? {
        if !validator.reputation.is_unit() || !validator.performance_score.is_unit() {
            return Ok(Some(format!(
                "validator {} records reputation {} and performance {}",
                validator.operator_address, validator.reputation, validator.performance_score
            )));
        }
    }
    Ok(None)
}

/// No reputation history exceeds its bound
pub fn history_bound_invariant(ctx: &mut Context<'_>) -> Result<Option<String>> {
    for reputation in store::all_reputations(ctx)? {
        if reputation.history.len() > MAX_REPUTATION_HISTORY {
            return Ok(Some(format!(
                "validator {} keeps {} reputation changes",
                reputation.validator,
                reputation.history.len()
            )));
        }
    }
    Ok(None)
}

/// Registers the reputation invariants
pub fn register(registry: &mut InvariantRegistry) {
    registry.register(REPUTATION_ROUTE_MODULE, "range", reputation_range_invariant);
    registry.register(REPUTATION_ROUTE_MODULE, "history-bound", history_bound_invariant);
}
