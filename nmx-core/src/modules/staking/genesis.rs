// src/modules/staking/genesis.rs

//! Staking genesis import and export.

use super::keeper::StakingKeeper;
use super::params::StakingParams;
use super::store;
use super::types::{
    BondStatus, Delegation, HistoricalInfo, LastValidatorPower, Redelegation, UnbondingDelegation, Validator,
};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::math::{Dec, Int};
use crate::modules::auth::module_accounts;
use crate::modules::params::{ParamSet, ParamsKeeper};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Staking genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingGenesis {
    /// Parameters
    #[serde(default)]
    pub params: StakingParams,
    /// Sum of the last reported powers
    #[serde(default)]
    pub last_total_power: i64,
    /// Last reported power per validator
    #[serde(default)]
    pub last_validator_powers: Vec<LastValidatorPower>,
    /// Validators
    #[serde(default)]
    pub validators: Vec<Validator>,
    /// Delegations
    #[serde(default)]
    pub delegations: Vec<Delegation>,
    /// Pending unbondings
    #[serde(default)]
    pub unbonding_delegations: Vec<UnbondingDelegation>,
    /// Pending redelegations
    #[serde(default)]
    pub redelegations: Vec<Redelegation>,
    /// Recorded historical info
    #[serde(default)]
    pub historical_info: Vec<HistoricalInfo>,
    /// Whether the section comes from an export of a running chain
    #[serde(default)]
    pub exported: bool,
}

impl StakingKeeper {
    /// Writes the staking genesis section
    ///
    /// Records are written as-is. Validators of a fresh genesis also run the
    /// creation hooks; an exported genesis already carries their records.
    /// The pool balances set up by the bank section must match the bonded
    /// and not-bonded totals.
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &StakingGenesis) -> Result<()> {
        ParamsKeeper.set(ctx, &genesis.params)?;
        let auth = self.bank.auth().clone();
        auth.ensure_module_account(ctx, module_accounts::BONDED_POOL)?;
        auth.ensure_module_account(ctx, module_accounts::NOT_BONDED_POOL)?;

        let mut bonded = Int::ZERO;
        let mut not_bonded = Int::ZERO;
        for validator in &genesis.validators {
            store::set_validator(ctx, validator)?;
            if validator.status == BondStatus::Unbonding {
                store::insert_validator_queue(ctx, validator.unbonding_time, &validator.operator_address)?;
            }
            if validator.is_bonded() {
                bonded = bonded.checked_add(validator.tokens)?;
            } else {
                not_bonded = not_bonded.checked_add(validator.tokens)?;
            }
            if !genesis.exported {
                self.hooks.after_validator_created(ctx, validator)?;
            }
        }
        for delegation in &genesis.delegations {
            store::set_delegation(ctx, delegation)?;
        }
        for ubd in &genesis.unbonding_delegations {
            store::set_unbonding(ctx, ubd)?;
            for entry in &ubd.entries {
                store::insert_unbonding_queue(ctx, entry.completion_time, &ubd.delegator_address, &ubd.validator_address)?;
                not_bonded = not_bonded.checked_add(entry.balance)?;
            }
        }
        for red in &genesis.redelegations {
            store::set_redelegation(ctx, red)?;
            for entry in &red.entries {
                store::insert_redelegation_queue(
                    ctx,
                    entry.completion_time,
                    &red.delegator_address,
                    &red.validator_src_address,
                    &red.validator_dst_address,
                )?;
            }
        }
        for info in &genesis.historical_info {
            store::set_historical_info(ctx, info)?;
        }
        if genesis.exported {
            for power in &genesis.last_validator_powers {
                store::set_last_power(ctx, &power.address, power.power)?;
            }
            store::set_last_total_power(ctx, genesis.last_total_power)?;
        }

        let denom = genesis.params.bond_denom.clone();
        let bonded_balance = self
            .bank
            .get_balance(ctx, &auth.module_address(module_accounts::BONDED_POOL), &denom)?;
        let not_bonded_balance = self
            .bank
            .get_balance(ctx, &auth.module_address(module_accounts::NOT_BONDED_POOL), &denom)?;
        if bonded_balance != bonded {
            return Err(NmxError::InvalidState(format!(
                "bonded pool holds {}{} but bonded validators hold {}",
                bonded_balance, denom, bonded
            )));
        }
        if not_bonded_balance != not_bonded {
            return Err(NmxError::InvalidState(format!(
                "not-bonded pool holds {}{} but unbonded stake is {}",
                not_bonded_balance, denom, not_bonded
            )));
        }
        Ok(())
    }

    /// Reads the staking genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<StakingGenesis> {
        Ok(StakingGenesis {
            params: self.params(ctx)?,
            last_total_power: store::get_last_total_power(ctx)?,
            last_validator_powers: store::all_last_powers(ctx)?
                .into_iter()
                .map(|(address, power)| LastValidatorPower { address, power })
                .collect(),
            validators: store::all_validators(ctx)?,
            delegations: store::all_delegations(ctx)?,
            unbonding_delegations: store::all_unbondings(ctx)?,
            redelegations: store::all_redelegations(ctx)?,
            historical_info: store::all_historical_info(ctx)?,
            exported: true,
        })
    }
}

/// Stateless check of a staking genesis section
pub fn validate_genesis(genesis: &StakingGenesis) -> Result<()> {
    genesis.params.validate()?;
    let mut operators = BTreeSet::new();
    let mut cons = BTreeSet::new();
    let mut shares: BTreeMap<_, Dec> = BTreeMap::new();
    for validator in &genesis.validators {
        if !operators.insert(validator.operator_address) {
            return Err(NmxError::ValidatorExists(validator.operator_address.to_string()));
        }
        if !cons.insert(validator.cons_address()) {
            return Err(NmxError::ValidatorPubKeyExists(validator.cons_address().to_string()));
        }
        validator.description.validate()?;
        validator.commission.rates.validate()?;
        if validator.tokens.is_negative() || validator.delegator_shares.is_negative() {
            return Err(NmxError::InvalidState(format!(
                "validator {} has negative tokens or shares",
                validator.operator_address
            )));
        }
        if validator.jailed && validator.is_bonded() {
            return Err(NmxError::InvalidState(format!(
                "validator {} is bonded and jailed",
                validator.operator_address
            )));
        }
        shares.insert(validator.operator_address, Dec::ZERO);
    }
    for delegation in &genesis.delegations {
        let total = shares.get_mut(&delegation.validator_address).ok_or_else(|| {
            NmxError::NoValidatorFound(format!("delegation to {}", delegation.validator_address))
        })?;
        *total += delegation.shares;
    }
    for validator in &genesis.validators {
        let total = shares.get(&validator.operator_address).copied().unwrap_or_default();
        if total != validator.delegator_shares {
            return Err(NmxError::InvalidState(format!(
                "validator {} has {} shares but delegations sum to {}",
                validator.operator_address, validator.delegator_shares, total
            )));
        }
    }
    Ok(())
}
