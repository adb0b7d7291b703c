// src/modules/truthgpt/params.rs

//! TruthGPT parameters.

use crate::coins::Coin;
use crate::errors::{NmxError, Result};
use crate::math::{Dec, Int};
use crate::modules::params::{validate_positive, validate_unit, ParamField, ParamSet};
use crate::store::names;
use serde::{Deserialize, Serialize};

/// Id of the model registered at genesis
pub const DEFAULT_MODEL_ID: &str = "default-ai-model";

/// TruthGPT parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthGptParams {
    /// Smallest fee a query may carry
    pub min_query_fee: Coin,
    /// Source responses that complete a query; 0 completes at dispatch
    pub response_quorum: u64,
    /// Blocks a dispatched query may wait for its quorum
    pub query_timeout_blocks: u64,
    /// Blocks between two ranking evaluations
    pub ranking_period: u64,
    /// Largest move of one rank component per evaluation
    pub rank_adjustment_step: Dec,
    /// Trust below which a source is blocked
    pub min_source_trust: Dec,
    /// Model credited with completed queries
    pub default_model_id: String,
}

impl Default for TruthGptParams {
    fn default() -> Self {
        Self {
            min_query_fee: Coin::new(crate::BOND_DENOM, Int::new(100)),
            response_quorum: 0,
            query_timeout_blocks: 100,
            ranking_period: 100,
            rank_adjustment_step: Dec::percent(5),
            min_source_trust: Dec::percent(25),
            default_model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }
}

/// One TruthGPT parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TruthGptParam {
    MinQueryFee(Coin),
    ResponseQuorum(u64),
    QueryTimeoutBlocks(u64),
    RankingPeriod(u64),
    RankAdjustmentStep(Dec),
    MinSourceTrust(Dec),
    DefaultModelId(String),
}

impl ParamField for TruthGptParam {
    fn name(&self) -> &'static str {
        match self {
            TruthGptParam::MinQueryFee(_) => "min_query_fee",
            TruthGptParam::ResponseQuorum(_) => "response_quorum",
            TruthGptParam::QueryTimeoutBlocks(_) => "query_timeout_blocks",
            TruthGptParam::RankingPeriod(_) => "ranking_period",
            TruthGptParam::RankAdjustmentStep(_) => "rank_adjustment_step",
            TruthGptParam::MinSourceTrust(_) => "min_source_trust",
            TruthGptParam::DefaultModelId(_) => "default_model_id",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            TruthGptParam::MinQueryFee(coin) => coin.validate(),
            TruthGptParam::ResponseQuorum(_) => Ok(()),
            TruthGptParam::QueryTimeoutBlocks(n) | TruthGptParam::RankingPeriod(n) => validate_positive(self.name(), *n),
            TruthGptParam::RankAdjustmentStep(d) | TruthGptParam::MinSourceTrust(d) => validate_unit(self.name(), *d),
            TruthGptParam::DefaultModelId(id) => {
                if id.trim().is_empty() {
                    return Err(NmxError::InvalidParams("default_model_id is empty".into()));
                }
                Ok(())
            }
        }
    }
}

impl ParamSet for TruthGptParams {
    const SUBSPACE: &'static str = names::TRUTHGPT;
    type Field = TruthGptParam;

    fn fields(&self) -> Vec<TruthGptParam> {
        vec![
            TruthGptParam::MinQueryFee(self.min_query_fee.clone()),
            TruthGptParam::ResponseQuorum(self.response_quorum),
            TruthGptParam::QueryTimeoutBlocks(self.query_timeout_blocks),
            TruthGptParam::RankingPeriod(self.ranking_period),
            TruthGptParam::RankAdjustmentStep(self.rank_adjustment_step),
            TruthGptParam::MinSourceTrust(self.min_source_trust),
            TruthGptParam::DefaultModelId(self.default_model_id.clone()),
        ]
    }

    fn apply(&mut self, field: TruthGptParam) {
        match field {
            TruthGptParam::MinQueryFee(v) => self.min_query_fee = v,
            TruthGptParam::ResponseQuorum(v) => self.response_quorum = v,
            TruthGptParam::QueryTimeoutBlocks(v) => self.query_timeout_blocks = v,
            TruthGptParam::RankingPeriod(v) => self.ranking_period = v,
            TruthGptParam::RankAdjustmentStep(v) => self.rank_adjustment_step = v,
            TruthGptParam::MinSourceTrust(v) => self.min_source_trust = v,
            TruthGptParam::DefaultModelId(v) => self.default_model_id = v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = TruthGptParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.min_query_fee.to_string(), "100unmx");
    }

    #[test]
    fn test_field_validation() {
        assert!(TruthGptParam::QueryTimeoutBlocks(0).validate().is_err());
        assert!(TruthGptParam::RankingPeriod(0).validate().is_err());
        assert!(TruthGptParam::ResponseQuorum(0).validate().is_ok());
        assert!(TruthGptParam::MinSourceTrust(Dec::from_int(2)).validate().is_err());
        assert!(TruthGptParam::DefaultModelId(" ".into()).validate().is_err());
    }
}
