// src/modules/neuropos/types.rs

//! NeuroPoS records: networks, predictions, reputation and performance.

use crate::errors::{NmxError, Result};
use crate::math::Dec;
use crate::time::Timestamp;
use nmx_crypto::{AccAddress, ValAddress};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Newest reputation changes kept per validator
pub const MAX_REPUTATION_HISTORY: usize = 100;

/// Confidence at which an anomaly report punishes its subject
pub fn anomaly_slash_threshold() -> Dec {
    Dec::percent(90)
}

/// Network topology family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// Multi-layer perceptron
    Mlp,
    /// Convolutional
    Cnn,
    /// Recurrent
    Rnn,
    /// Long short-term memory
    Lstm,
    /// Gated recurrent unit
    Gru,
    /// Attention-based
    Transformer,
    /// Autoencoder
    Autoencoder,
    /// Generative adversarial
    Gan,
}

impl Architecture {
    /// Every supported architecture
    pub const ALL: [Architecture; 8] = [
        Architecture::Mlp,
        Architecture::Cnn,
        Architecture::Rnn,
        Architecture::Lstm,
        Architecture::Gru,
        Architecture::Transformer,
        Architecture::Autoencoder,
        Architecture::Gan,
    ];

    /// Lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Mlp => "mlp",
            Architecture::Cnn => "cnn",
            Architecture::Rnn => "rnn",
            Architecture::Lstm => "lstm",
            Architecture::Gru => "gru",
            Architecture::Transformer => "transformer",
            Architecture::Autoencoder => "autoencoder",
            Architecture::Gan => "gan",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = NmxError;

    fn from_str(s: &str) -> Result<Self> {
        Architecture::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| NmxError::UnknownArchitecture(s.to_string()))
    }
}

/// One layer descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Layer kind, e.g. `dense`
    pub layer_type: String,
    /// Input width
    pub input_size: u32,
    /// Output width
    pub output_size: u32,
    /// Activation function
    #[serde(default)]
    pub activation: String,
}

impl Layer {
    /// Stateless checks
    pub fn validate(&self) -> Result<()> {
        if self.layer_type.trim().is_empty() {
            return Err(NmxError::InvalidMessage("layer type is empty".into()));
        }
        if self.input_size == 0 || self.output_size == 0 {
            return Err(NmxError::InvalidMessage(format!(
                "{} layer has zero width",
                self.layer_type
            )));
        }
        Ok(())
    }
}

/// Validates a non-empty layer list
pub fn validate_layers(layers: &[Layer]) -> Result<()> {
    if layers.is_empty() {
        return Err(NmxError::InvalidMessage("network has no layers".into()));
    }
    layers.iter().try_for_each(Layer::validate)
}

/// Lifecycle state of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    /// Usable for predictions
    Active,
    /// New weights being written
    Updating,
    /// Training in progress
    Training,
    /// Retired
    Inactive,
}

impl NetworkStatus {
    /// Whether an update or training request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, NetworkStatus::Updating | NetworkStatus::Training)
    }
}

/// Registered neural network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    /// Content-derived id `nn-...`
    pub id: String,
    /// Creator, the only account allowed to change it
    pub owner: AccAddress,
    /// Topology family
    pub architecture: Architecture,
    /// Layers in order
    pub layers: Vec<Layer>,
    /// Lifecycle state
    pub status: NetworkStatus,
    /// Accuracy in `[0, 1]`
    pub accuracy: Dec,
    /// Loss in `[0, 1]`
    pub loss: Dec,
    /// Current weights version
    pub version: u64,
    /// Block time of creation
    pub created_time: Timestamp,
    /// Block time of the last update or refinement
    pub last_updated_time: Timestamp,
    /// Block time of the last training request
    pub last_trained_time: Timestamp,
    /// Height of the last training request
    pub last_trained_height: u64,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

impl NeuralNetwork {
    /// Stateless checks shared by genesis and the keeper
    pub fn validate(&self) -> Result<()> {
        validate_layers(&self.layers)?;
        if !self.accuracy.is_unit() || !self.loss.is_unit() {
            return Err(NmxError::InvalidState(format!(
                "network {} has accuracy {} and loss {}",
                self.id, self.accuracy, self.loss
            )));
        }
        Ok(())
    }
}

/// Versioned weights of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuralNetworkWeights {
    /// Owning network
    pub network_id: String,
    /// Version, starting at 1
    pub version: u64,
    /// Opaque weights blob
    pub weights: Vec<u8>,
    /// Block time of the write
    pub updated_at: Timestamp,
}

/// Training request kept for refinement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingData {
    /// Content-derived id `td-...`
    pub id: String,
    /// Trained network
    pub network_id: String,
    /// Feature blob
    pub features: Vec<u8>,
    /// Label blob
    pub labels: Vec<u8>,
    /// Requested epochs
    pub epochs: u64,
    /// Requested learning rate
    pub learning_rate: Dec,
    /// Block time of the request
    pub created_at: Timestamp,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

/// Prediction recorded by a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuralPrediction {
    /// Content-derived id `pred-...`
    pub id: String,
    /// Network that produced it
    pub network_id: String,
    /// Submitting validator
    pub submitter: ValAddress,
    /// Input blob
    pub input: Vec<u8>,
    /// Output blob
    pub output: Vec<u8>,
    /// Confidence, clamped to `[0, 1]`
    pub confidence: Dec,
    /// Validators the prediction is about
    pub validator_set: Vec<ValAddress>,
    /// Height of submission
    pub height: u64,
    /// Block time of submission
    pub timestamp: Timestamp,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

/// One reputation movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationChange {
    /// Block time of the change
    pub timestamp: Timestamp,
    /// Requested delta, before clamping
    pub change: Dec,
    /// Cause
    pub reason: String,
}

/// Reputation of a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorReputation {
    /// Validator
    pub validator: ValAddress,
    /// Score in `[0, 1]`
    pub reputation: Dec,
    /// Block time of the last change, the decay reference
    pub last_updated: Timestamp,
    /// Newest changes, at most [`MAX_REPUTATION_HISTORY`]
    pub history: Vec<ReputationChange>,
}

impl ValidatorReputation {
    /// Fresh record with full reputation
    pub fn new(validator: ValAddress, now: Timestamp) -> Self {
        Self {
            validator,
            reputation: Dec::ONE,
            last_updated: now,
            history: Vec::new(),
        }
    }

    /// Appends a change, dropping the oldest beyond the bound
    pub fn record(&mut self, change: ReputationChange) {
        self.history.push(change);
        if self.history.len() > MAX_REPUTATION_HISTORY {
            let excess = self.history.len() - MAX_REPUTATION_HISTORY;
            self.history.drain(..excess);
        }
    }
}

/// Block-production counters of the current assessment window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPerformance {
    /// Validator
    pub validator: ValAddress,
    /// Blocks proposed in the window
    pub blocks_proposed: u64,
    /// Blocks validated in the window
    pub blocks_validated: u64,
    /// Blocks missed in the window
    pub missed_blocks: u64,
    /// Mean confidence of the predictions of the last assessment
    pub prediction_accuracy: Dec,
    /// Block time of the last counter change
    pub last_updated: Timestamp,
    /// `1 - missed / (proposed + validated)`, clamped to `[0, 1]`
    pub performance_score: Dec,
    /// Window size the counters close at
    pub assessment_window: u64,
    /// Height of the last assessment
    pub last_assessment_height: u64,
}

impl ValidatorPerformance {
    /// Fresh record with a perfect score
    pub fn new(validator: ValAddress, window: u64, height: u64, now: Timestamp) -> Self {
        Self {
            validator,
            blocks_proposed: 0,
            blocks_validated: 0,
            missed_blocks: 0,
            prediction_accuracy: Dec::ONE,
            last_updated: now,
            performance_score: Dec::ONE,
            assessment_window: window,
            last_assessment_height: height,
        }
    }

    /// Proposed plus validated blocks
    pub fn total_blocks(&self) -> u64 {
        self.blocks_proposed.saturating_add(self.blocks_validated)
    }

    /// Recomputes the score from the counters
    pub fn refresh_score(&mut self) {
        let total = self.total_blocks();
        if total > 0 {
            let miss_rate = Dec::from_ratio(self.missed_blocks as i128, total as i128);
            self.performance_score = (Dec::ONE - miss_rate).clamp_unit();
        }
    }

    /// Whether the counters fill the window
    pub fn window_full(&self) -> bool {
        self.assessment_window > 0 && self.total_blocks() >= self.assessment_window
    }
}

/// Report that a validator behaved anomalously
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Sequential id
    pub id: u64,
    /// Reporting validator
    pub reporter: ValAddress,
    /// Reported validator
    pub validator: ValAddress,
    /// Height of submission
    pub height: u64,
    /// Free-form classification
    pub anomaly_type: String,
    /// Confidence in `[0, 1]`
    pub confidence: Dec,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Opaque evidence
    #[serde(default)]
    pub evidence: Vec<u8>,
    /// Block time of submission
    pub timestamp: Timestamp,
    /// Set once BeginBlock has acted on the report
    #[serde(default)]
    pub processed: bool,
}

/// Per-block snapshot of the validator set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    /// Height of the snapshot
    pub height: u64,
    /// Bonded validators
    pub bonded_validators: u64,
    /// Tokens held by bonded validators
    pub bonded_tokens: crate::math::Int,
    /// Mean reputation of the bonded validators
    pub mean_reputation: Dec,
    /// Block time
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_names() {
        assert_eq!("transformer".parse::<Architecture>().unwrap(), Architecture::Transformer);
        assert!(matches!(
            "perceptron".parse::<Architecture>(),
            Err(NmxError::UnknownArchitecture(_))
        ));
        assert_eq!(serde_json::to_string(&Architecture::Lstm).unwrap(), "\"lstm\"");
    }

    #[test]
    fn test_history_keeps_newest() {
        let mut rep = ValidatorReputation::new(ValAddress::new([1u8; 20]), Timestamp::EPOCH);
        for i in 0..105 {
            rep.record(ReputationChange {
                timestamp: Timestamp::from_unix_secs(i),
                change: Dec::ZERO,
                reason: format!("change {}", i),
            });
        }
        assert_eq!(rep.history.len(), MAX_REPUTATION_HISTORY);
        assert_eq!(rep.history[0].reason, "change 5");
        assert_eq!(rep.history[99].reason, "change 104");
    }

    #[test]
    fn test_performance_score() {
        let mut perf = ValidatorPerformance::new(ValAddress::new([1u8; 20]), 10, 0, Timestamp::EPOCH);
        perf.blocks_proposed = 2;
        perf.blocks_validated = 6;
        perf.missed_blocks = 2;
        perf.refresh_score();
        assert_eq!(perf.performance_score, Dec::percent(75));
        assert!(!perf.window_full());

        perf.missed_blocks = 20;
        perf.refresh_score();
        assert_eq!(perf.performance_score, Dec::ZERO);
    }

    #[test]
    fn test_layers_must_be_present() {
        assert!(validate_layers(&[]).is_err());
        let layer = Layer {
            layer_type: "dense".into(),
            input_size: 4,
            output_size: 0,
            activation: "relu".into(),
        };
        assert!(validate_layers(&[layer]).is_err());
    }
}
