// src/modules/neuropos/msgs.rs

//! NeuroPoS messages.

use super::types::{validate_layers, Architecture, Layer};
use crate::errors::{NmxError, Result};
use crate::math::Dec;
use nmx_crypto::{AccAddress, ValAddress};
use serde::{Deserialize, Serialize};

fn require_address(empty: bool, what: &str) -> Result<()> {
    if empty {
        return Err(NmxError::InvalidAddress(format!("empty {} address", what)));
    }
    Ok(())
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(NmxError::InvalidMessage("network id is empty".into()));
    }
    Ok(())
}

/// Registers a network with zeroed weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateNeuralNetwork {
    /// Creator and owner
    pub creator: AccAddress,
    /// Architecture name
    pub architecture: String,
    /// Layers
    pub layers: Vec<Layer>,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

impl MsgCreateNeuralNetwork {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.creator
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_address(self.creator.is_empty(), "creator")?;
        self.architecture.parse::<Architecture>()?;
        validate_layers(&self.layers)
    }
}

/// Replaces a network's topology and writes a new weights version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateNeuralNetwork {
    /// Owner
    pub owner: AccAddress,
    /// Updated network
    pub network_id: String,
    /// Architecture name
    pub architecture: String,
    /// Layers
    pub layers: Vec<Layer>,
    /// New weights blob
    pub weights: Vec<u8>,
    /// Replacement metadata, kept when absent
    #[serde(default)]
    pub metadata: Option<Vec<u8>>,
}

impl MsgUpdateNeuralNetwork {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_address(self.owner.is_empty(), "owner")?;
        require_id(&self.network_id)?;
        self.architecture.parse::<Architecture>()?;
        validate_layers(&self.layers)?;
        if self.weights.is_empty() {
            return Err(NmxError::InvalidMessage("weights are empty".into()));
        }
        Ok(())
    }
}

/// Submits training data; training completes in the next block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTrainNeuralNetwork {
    /// Owner
    pub owner: AccAddress,
    /// Trained network
    pub network_id: String,
    /// Feature blob
    pub features: Vec<u8>,
    /// Label blob
    pub labels: Vec<u8>,
    /// Epochs, positive
    pub epochs: u64,
    /// Learning rate in `[0, 1]`
    pub learning_rate: Dec,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

impl MsgTrainNeuralNetwork {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_address(self.owner.is_empty(), "owner")?;
        require_id(&self.network_id)?;
        if self.features.is_empty() || self.labels.is_empty() {
            return Err(NmxError::InvalidMessage("training data needs features and labels".into()));
        }
        if self.epochs == 0 {
            return Err(NmxError::InvalidMessage("epochs must be positive".into()));
        }
        if !self.learning_rate.is_unit() {
            return Err(NmxError::InvalidMessage(format!(
                "learning rate {} outside [0, 1]",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Records a validator's prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitNeuralPrediction {
    /// Submitting validator; its operator account signs
    pub validator_address: ValAddress,
    /// Network used
    pub network_id: String,
    /// Input blob
    pub input: Vec<u8>,
    /// Output blob
    pub output: Vec<u8>,
    /// Confidence; clamped to `[0, 1]` when stored
    pub confidence: Dec,
    /// Validators the prediction concerns
    pub validator_set: Vec<ValAddress>,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

impl MsgSubmitNeuralPrediction {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        AccAddress::from(self.validator_address)
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_address(self.validator_address.is_empty(), "validator")?;
        require_id(&self.network_id)?;
        if self.input.is_empty() || self.output.is_empty() {
            return Err(NmxError::InvalidMessage("prediction needs input and output".into()));
        }
        if self.validator_set.is_empty() {
            return Err(NmxError::InvalidMessage("prediction has an empty validator set".into()));
        }
        if self.validator_set.iter().any(|v| v.is_empty()) {
            return Err(NmxError::InvalidAddress("empty address in validator set".into()));
        }
        Ok(())
    }
}

/// Reports anomalous behaviour of another validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgReportAnomaly {
    /// Reporting validator; its operator account signs
    pub reporter: ValAddress,
    /// Reported validator
    pub validator_address: ValAddress,
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
}

impl MsgReportAnomaly {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        AccAddress::from(self.reporter)
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_address(self.reporter.is_empty(), "reporter")?;
        require_address(self.validator_address.is_empty(), "validator")?;
        if self.reporter == self.validator_address {
            return Err(NmxError::InvalidMessage("a validator cannot report itself".into()));
        }
        if self.anomaly_type.trim().is_empty() {
            return Err(NmxError::InvalidMessage("anomaly type is empty".into()));
        }
        if !self.confidence.is_unit() {
            return Err(NmxError::InvalidMessage(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_layers() -> Vec<Layer> {
        vec![Layer {
            layer_type: "dense".into(),
            input_size: 8,
            output_size: 2,
            activation: "relu".into(),
        }]
    }

    #[test]
    fn test_create_rejects_unknown_architecture() {
        let mut msg = MsgCreateNeuralNetwork {
            creator: AccAddress::new([1u8; 20]),
            architecture: "mlp".into(),
            layers: create_test_layers(),
            metadata: Vec::new(),
        };
        assert!(msg.validate_basic().is_ok());
        msg.architecture = "svm".into();
        assert!(matches!(msg.validate_basic(), Err(NmxError::UnknownArchitecture(_))));
    }

    #[test]
    fn test_train_validation() {
        let mut msg = MsgTrainNeuralNetwork {
            owner: AccAddress::new([1u8; 20]),
            network_id: "nn-1-00000000".into(),
            features: vec![1],
            labels: vec![0],
            epochs: 3,
            learning_rate: Dec::from_ratio(1, 1_000),
            metadata: Vec::new(),
        };
        assert!(msg.validate_basic().is_ok());
        msg.epochs = 0;
        assert!(msg.validate_basic().is_err());
        msg.epochs = 1;
        msg.learning_rate = Dec::from_int(2);
        assert!(msg.validate_basic().is_err());
        msg.learning_rate = Dec::ONE;
        msg.labels.clear();
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_self_report_rejected() {
        let val = ValAddress::new([3u8; 20]);
        let msg = MsgReportAnomaly {
            reporter: val,
            validator_address: val,
            anomaly_type: "equivocation-pattern".into(),
            confidence: Dec::percent(95),
            description: String::new(),
            evidence: Vec::new(),
        };
        assert!(msg.validate_basic().is_err());
        assert_eq!(msg.signer(), AccAddress::new([3u8; 20]));
    }
}
