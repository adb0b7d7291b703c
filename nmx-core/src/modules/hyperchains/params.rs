// src/modules/hyperchains/params.rs

//! HyperChains parameters.

use crate::errors::{NmxError, Result};
use crate::modules::params::{validate_positive, ParamField, ParamSet};
use crate::modules::proposals::DEFAULT_VOTING_PERIOD;
use crate::store::names;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HyperChains parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperChainsParams {
    /// Length of a proposal's voting period
    pub voting_period: Duration,
    /// Seconds between two simulated chain blocks
    pub simulated_block_secs: u64,
    /// Domain published endpoints live under
    pub endpoint_domain: String,
}

impl Default for HyperChainsParams {
    fn default() -> Self {
        Self {
            voting_period: DEFAULT_VOTING_PERIOD,
            simulated_block_secs: 2,
            endpoint_domain: "nmxchain.io".to_string(),
        }
    }
}

/// One HyperChains parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum HyperChainsParam {
    VotingPeriod(Duration),
    SimulatedBlockSecs(u64),
    EndpointDomain(String),
}

impl ParamField for HyperChainsParam {
    fn name(&self) -> &'static str {
        match self {
            HyperChainsParam::VotingPeriod(_) => "voting_period",
            HyperChainsParam::SimulatedBlockSecs(_) => "simulated_block_secs",
            HyperChainsParam::EndpointDomain(_) => "endpoint_domain",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            HyperChainsParam::VotingPeriod(d) => validate_positive(self.name(), d.as_secs()),
            HyperChainsParam::SimulatedBlockSecs(n) => validate_positive(self.name(), *n),
            HyperChainsParam::EndpointDomain(d) => {
                if d.trim().is_empty() {
                    return Err(NmxError::InvalidParams("endpoint_domain is empty".into()));
                }
                Ok(())
            }
        }
    }
}

impl ParamSet for HyperChainsParams {
    const SUBSPACE: &'static str = names::HYPERCHAINS;
    type Field = HyperChainsParam;

    fn fields(&self) -> Vec<HyperChainsParam> {
        vec![
            HyperChainsParam::VotingPeriod(self.voting_period),
            HyperChainsParam::SimulatedBlockSecs(self.simulated_block_secs),
            HyperChainsParam::EndpointDomain(self.endpoint_domain.clone()),
        ]
    }

    fn apply(&mut self, field: HyperChainsParam) {
        match field {
            HyperChainsParam::VotingPeriod(v) => self.voting_period = v,
            HyperChainsParam::SimulatedBlockSecs(v) => self.simulated_block_secs = v,
            HyperChainsParam::EndpointDomain(v) => self.endpoint_domain = v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert!(HyperChainsParams::default().validate().is_ok());
        assert!(HyperChainsParam::SimulatedBlockSecs(0).validate().is_err());
        assert!(HyperChainsParam::EndpointDomain(" ".into()).validate().is_err());
    }
}
