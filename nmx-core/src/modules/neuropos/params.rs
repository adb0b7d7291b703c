// src/modules/neuropos/params.rs

//! NeuroPoS parameters: the reputation engine and the network registry.

use super::types::Architecture;
use crate::errors::Result;
use crate::math::Dec;
use crate::modules::params::{validate_positive, validate_unit, ParamField, ParamSet};
use crate::store::names;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// NeuroPoS parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuroPoSParams {
    /// Time between two refinement steps of a network
    pub neural_network_update_interval: Duration,
    /// Default learning rate for training requests
    pub neural_network_learning_rate: Dec,
    /// Default architecture
    pub neural_network_architecture: Architecture,
    /// Daily reputation decay
    pub reputation_decay_rate: Dec,
    /// Proposed plus validated blocks that close a performance window
    pub performance_assessment_window: u64,
    /// Reputation below which an alert is emitted
    pub min_validator_reputation: Dec,
    /// Missed blocks per window before a performance alert
    pub max_missed_blocks: u64,
    /// Weight of the performance score in a windowed update
    pub reputation_bonus_rate: Dec,
    /// Reputation lost per unit of slash fraction
    pub reputation_penalty_rate: Dec,
    /// Weight of prediction confidence in a windowed update
    pub neural_network_influence_rate: Dec,
}

impl Default for NeuroPoSParams {
    fn default() -> Self {
        Self {
            neural_network_update_interval: Duration::from_secs(86_400),
            neural_network_learning_rate: Dec::from_ratio(1, 1_000),
            neural_network_architecture: Architecture::Mlp,
            reputation_decay_rate: Dec::percent(1),
            performance_assessment_window: 10_000,
            min_validator_reputation: Dec::percent(50),
            max_missed_blocks: 100,
            reputation_bonus_rate: Dec::percent(1),
            reputation_penalty_rate: Dec::percent(2),
            neural_network_influence_rate: Dec::percent(30),
        }
    }
}

/// One NeuroPoS parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum NeuroPoSParam {
    NeuralNetworkUpdateInterval(Duration),
    NeuralNetworkLearningRate(Dec),
    NeuralNetworkArchitecture(Architecture),
    ReputationDecayRate(Dec),
    PerformanceAssessmentWindow(u64),
    MinValidatorReputation(Dec),
    MaxMissedBlocks(u64),
    ReputationBonusRate(Dec),
    ReputationPenaltyRate(Dec),
    NeuralNetworkInfluenceRate(Dec),
}

impl ParamField for NeuroPoSParam {
    fn name(&self) -> &'static str {
        match self {
            NeuroPoSParam::NeuralNetworkUpdateInterval(_) => "neural_network_update_interval",
            NeuroPoSParam::NeuralNetworkLearningRate(_) => "neural_network_learning_rate",
            NeuroPoSParam::NeuralNetworkArchitecture(_) => "neural_network_architecture",
            NeuroPoSParam::ReputationDecayRate(_) => "reputation_decay_rate",
            NeuroPoSParam::PerformanceAssessmentWindow(_) => "performance_assessment_window",
            NeuroPoSParam::MinValidatorReputation(_) => "min_validator_reputation",
            NeuroPoSParam::MaxMissedBlocks(_) => "max_missed_blocks",
            NeuroPoSParam::ReputationBonusRate(_) => "reputation_bonus_rate",
            NeuroPoSParam::ReputationPenaltyRate(_) => "reputation_penalty_rate",
            NeuroPoSParam::NeuralNetworkInfluenceRate(_) => "neural_network_influence_rate",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            NeuroPoSParam::NeuralNetworkUpdateInterval(d) => validate_positive(self.name(), d.as_secs()),
            NeuroPoSParam::PerformanceAssessmentWindow(n) | NeuroPoSParam::MaxMissedBlocks(n) => {
                validate_positive(self.name(), *n)
            }
            NeuroPoSParam::NeuralNetworkArchitecture(_) => Ok(()),
            NeuroPoSParam::NeuralNetworkLearningRate(d)
            | NeuroPoSParam::ReputationDecayRate(d)
            | NeuroPoSParam::MinValidatorReputation(d)
            | NeuroPoSParam::ReputationBonusRate(d)
            | NeuroPoSParam::ReputationPenaltyRate(d)
            | NeuroPoSParam::NeuralNetworkInfluenceRate(d) => validate_unit(self.name(), *d),
        }
    }
}

impl ParamSet for NeuroPoSParams {
    const SUBSPACE: &'static str = names::NEUROPOS;
    type Field = NeuroPoSParam;

    fn fields(&self) -> Vec<NeuroPoSParam> {
        vec![
            NeuroPoSParam::NeuralNetworkUpdateInterval(self.neural_network_update_interval),
            NeuroPoSParam::NeuralNetworkLearningRate(self.neural_network_learning_rate),
            NeuroPoSParam::NeuralNetworkArchitecture(self.neural_network_architecture),
            NeuroPoSParam::ReputationDecayRate(self.reputation_decay_rate),
            NeuroPoSParam::PerformanceAssessmentWindow(self.performance_assessment_window),
            NeuroPoSParam::MinValidatorReputation(self.min_validator_reputation),
            NeuroPoSParam::MaxMissedBlocks(self.max_missed_blocks),
            NeuroPoSParam::ReputationBonusRate(self.reputation_bonus_rate),
            NeuroPoSParam::ReputationPenaltyRate(self.reputation_penalty_rate),
            NeuroPoSParam::NeuralNetworkInfluenceRate(self.neural_network_influence_rate),
        ]
    }

    fn apply(&mut self, field: NeuroPoSParam) {
        match field {
            NeuroPoSParam::NeuralNetworkUpdateInterval(v) => self.neural_network_update_interval = v,
            NeuroPoSParam::NeuralNetworkLearningRate(v) => self.neural_network_learning_rate = v,
            NeuroPoSParam::NeuralNetworkArchitecture(v) => self.neural_network_architecture = v,
            NeuroPoSParam::ReputationDecayRate(v) => self.reputation_decay_rate = v,
            NeuroPoSParam::PerformanceAssessmentWindow(v) => self.performance_assessment_window = v,
            NeuroPoSParam::MinValidatorReputation(v) => self.min_validator_reputation = v,
            NeuroPoSParam::MaxMissedBlocks(v) => self.max_missed_blocks = v,
            NeuroPoSParam::ReputationBonusRate(v) => self.reputation_bonus_rate = v,
            NeuroPoSParam::ReputationPenaltyRate(v) => self.reputation_penalty_rate = v,
            NeuroPoSParam::NeuralNetworkInfluenceRate(v) => self.neural_network_influence_rate = v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = NeuroPoSParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.neural_network_learning_rate.to_string(), "0.001000000000000000");
    }

    #[test]
    fn test_field_validation() {
        assert!(NeuroPoSParam::PerformanceAssessmentWindow(0).validate().is_err());
        assert!(NeuroPoSParam::ReputationDecayRate(Dec::from_int(2)).validate().is_err());
        assert!(NeuroPoSParam::NeuralNetworkUpdateInterval(Duration::ZERO).validate().is_err());
        assert!(NeuroPoSParam::ReputationPenaltyRate(Dec::ONE).validate().is_ok());
    }
}
