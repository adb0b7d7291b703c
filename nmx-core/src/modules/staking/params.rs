// src/modules/staking/params.rs

//! Staking parameters.

use crate::coins::validate_denom;
use crate::errors::{NmxError, Result};
use crate::math::Int;
use crate::modules::params::{validate_positive, ParamField, ParamSet};
use crate::store::names;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Staking parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Time tokens stay locked after undelegation
    pub unbonding_time: Duration,
    /// Size of the active set
    pub max_validators: u32,
    /// Entries allowed per unbonding or redelegation record
    pub max_entries: u32,
    /// Chain-wide floor for a validator's self-delegation
    pub min_self_delegation: Int,
    /// Past heights kept as historical info
    pub historical_entries: u32,
    /// Staking denomination
    pub bond_denom: String,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            unbonding_time: Duration::from_secs(21 * 86_400),
            max_validators: 100,
            max_entries: 7,
            min_self_delegation: Int::new(1_000_000),
            historical_entries: 10_000,
            bond_denom: crate::BOND_DENOM.to_string(),
        }
    }
}

/// One staking parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum StakingParam {
    UnbondingTime(Duration),
    MaxValidators(u32),
    MaxEntries(u32),
    MinSelfDelegation(Int),
    HistoricalEntries(u32),
    BondDenom(String),
}

impl ParamField for StakingParam {
    fn name(&self) -> &'static str {
        match self {
            StakingParam::UnbondingTime(_) => "unbonding_time",
            StakingParam::MaxValidators(_) => "max_validators",
            StakingParam::MaxEntries(_) => "max_entries",
            StakingParam::MinSelfDelegation(_) => "min_self_delegation",
            StakingParam::HistoricalEntries(_) => "historical_entries",
            StakingParam::BondDenom(_) => "bond_denom",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            StakingParam::UnbondingTime(d) => validate_positive(self.name(), d.as_nanos() as u64),
            StakingParam::MaxValidators(v) | StakingParam::MaxEntries(v) => {
                validate_positive(self.name(), *v as u64)
            }
            StakingParam::HistoricalEntries(_) => Ok(()),
            StakingParam::MinSelfDelegation(v) => {
                if v.is_negative() {
                    return Err(NmxError::InvalidParams("min_self_delegation is negative".into()));
                }
                Ok(())
            }
            StakingParam::BondDenom(d) => validate_denom(d)
                .map_err(|e| NmxError::InvalidParams(format!("bond_denom: {}", e))),
        }
    }
}

impl ParamSet for StakingParams {
    const SUBSPACE: &'static str = names::STAKING;
    type Field = StakingParam;

    fn fields(&self) -> Vec<StakingParam> {
        vec![
            StakingParam::UnbondingTime(self.unbonding_time),
            StakingParam::MaxValidators(self.max_validators),
            StakingParam::MaxEntries(self.max_entries),
            StakingParam::MinSelfDelegation(self.min_self_delegation),
            StakingParam::HistoricalEntries(self.historical_entries),
            StakingParam::BondDenom(self.bond_denom.clone()),
        ]
    }

    fn apply(&mut self, field: StakingParam) {
        match field {
            StakingParam::UnbondingTime(v) => self.unbonding_time = v,
            StakingParam::MaxValidators(v) => self.max_validators = v,
            StakingParam::MaxEntries(v) => self.max_entries = v,
            StakingParam::MinSelfDelegation(v) => self.min_self_delegation = v,
            StakingParam::HistoricalEntries(v) => self.historical_entries = v,
            StakingParam::BondDenom(v) => self.bond_denom = v,
        }
    }
}
