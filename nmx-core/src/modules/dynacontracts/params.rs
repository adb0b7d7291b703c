// src/modules/dynacontracts/params.rs

//! DynaContracts parameters.

use crate::errors::Result;
use crate::modules::params::{validate_positive, ParamField, ParamSet};
use crate::modules::proposals::DEFAULT_VOTING_PERIOD;
use crate::store::names;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// DynaContracts parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynaContractsParams {
    /// Length of a proposal's voting period
    pub voting_period: Duration,
    /// Largest code blob accepted, in bytes
    pub max_code_size: u64,
    /// Gas charged for one recorded execution
    pub execution_gas: u64,
}

impl Default for DynaContractsParams {
    fn default() -> Self {
        Self {
            voting_period: DEFAULT_VOTING_PERIOD,
            max_code_size: 512 * 1024,
            execution_gas: 1_000,
        }
    }
}

/// One DynaContracts parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum DynaContractsParam {
    VotingPeriod(Duration),
    MaxCodeSize(u64),
    ExecutionGas(u64),
}

impl ParamField for DynaContractsParam {
    fn name(&self) -> &'static str {
        match self {
            DynaContractsParam::VotingPeriod(_) => "voting_period",
            DynaContractsParam::MaxCodeSize(_) => "max_code_size",
            DynaContractsParam::ExecutionGas(_) => "execution_gas",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            DynaContractsParam::VotingPeriod(d) => validate_positive(self.name(), d.as_secs()),
            DynaContractsParam::MaxCodeSize(n) => validate_positive(self.name(), *n),
            DynaContractsParam::ExecutionGas(_) => Ok(()),
        }
    }
}

impl ParamSet for DynaContractsParams {
    const SUBSPACE: &'static str = names::DYNACONTRACTS;
    type Field = DynaContractsParam;

    fn fields(&self) -> Vec<DynaContractsParam> {
        vec![
            DynaContractsParam::VotingPeriod(self.voting_period),
            DynaContractsParam::MaxCodeSize(self.max_code_size),
            DynaContractsParam::ExecutionGas(self.execution_gas),
        ]
    }

    fn apply(&mut self, field: DynaContractsParam) {
        match field {
            DynaContractsParam::VotingPeriod(v) => self.voting_period = v,
            DynaContractsParam::MaxCodeSize(v) => self.max_code_size = v,
            DynaContractsParam::ExecutionGas(v) => self.execution_gas = v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = DynaContractsParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.voting_period, Duration::from_secs(604_800));
        assert!(DynaContractsParam::VotingPeriod(Duration::ZERO).validate().is_err());
    }
}
