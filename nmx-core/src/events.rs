// src/events.rs

//! Structured events emitted by transactions and block hooks.

use serde::{Deserialize, Serialize};

/// Event type names
pub mod types {
    #![allow(missing_docs)]

    pub const TRANSFER: &str = "transfer";
    pub const MINT: &str = "mint";
    pub const BURN: &str = "burn";
    pub const CREATE_VALIDATOR: &str = "create_validator";
    pub const EDIT_VALIDATOR: &str = "edit_validator";
    pub const DELEGATE: &str = "delegate";
    pub const UNBOND: &str = "unbond";
    pub const REDELEGATE: &str = "redelegate";
    pub const COMPLETE_UNBONDING: &str = "complete_unbonding";
    pub const COMPLETE_REDELEGATION: &str = "complete_redelegation";
    pub const SLASH: &str = "slash";
    pub const LIVENESS: &str = "liveness";
    pub const UNJAIL: &str = "unjail";
    pub const CREATE_NEURAL_NETWORK: &str = "create_neural_network";
    pub const UPDATE_NEURAL_NETWORK: &str = "update_neural_network";
    pub const TRAIN_NEURAL_NETWORK: &str = "train_neural_network";
    pub const NEURAL_PREDICTION: &str = "neural_prediction";
    pub const VALIDATOR_PERFORMANCE: &str = "validator_performance";
    pub const REPUTATION_UPDATE: &str = "reputation_update";
    pub const REPUTATION_BELOW_THRESHOLD: &str = "reputation_below_threshold";
    pub const ANOMALY: &str = "anomaly";
    pub const ORACLE_QUERY: &str = "oracle_query";
    pub const ORACLE_RESPONSE: &str = "oracle_response";
    pub const ORACLE_QUERY_FAILED: &str = "oracle_query_failed";
    pub const DATA_SOURCE: &str = "data_source";
    pub const DATA_SOURCE_BLOCKED: &str = "data_source_blocked";
    pub const SOURCE_RANK: &str = "source_rank";
    pub const AI_MODEL: &str = "ai_model";
    pub const MISINFORMATION: &str = "misinformation";
    pub const VERIFICATION_TASK: &str = "verification_task";
    pub const CREATE_CONTRACT: &str = "create_contract";
    pub const UPDATE_CONTRACT: &str = "update_contract";
    pub const EXECUTE_CONTRACT: &str = "execute_contract";
    pub const CONTRACT_PARAMETER: &str = "contract_parameter";
    pub const CREATE_CHAIN: &str = "create_chain";
    pub const DEPLOY_CHAIN: &str = "deploy_chain";
    pub const CHAIN_DEPLOYMENT: &str = "chain_deployment";
    pub const PROPOSAL_VOTE: &str = "proposal_vote";
    pub const CONTRACT_PROPOSAL: &str = "contract_proposal";
    pub const CHAIN_PROPOSAL: &str = "chain_proposal";
    pub const UPGRADE: &str = "upgrade";
    pub const REWARDS: &str = "rewards";
    pub const COMMUNITY_POOL: &str = "community_pool";
    pub const MESSAGE: &str = "message";
}

/// Typed key/value attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute key
    pub key: String,
    /// Attribute value
    pub value: String,
}

/// Event with an ordered attribute list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, see [`types`]
    pub kind: String,
    /// Attributes in emission order
    pub attributes: Vec<Attribute>,
}

impl Event {
    /// Creates an event with no attributes
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute
    pub fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push(Attribute {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Value of the first attribute named `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let event = Event::new(types::SLASH)
            .attr("validator", "nmxvaloper1abc")
            .attr("power", 1500);
        assert_eq!(event.kind, "slash");
        assert_eq!(event.get("power"), Some("1500"));
        assert_eq!(event.get("missing"), None);
    }
}
