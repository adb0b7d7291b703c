// src/modules/hyperchains/msgs.rs

//! HyperChains messages.

use super::types::{ChainType, ProposalType};
use crate::errors::{NmxError, Result};
use crate::modules::proposals::{validate_proposal_text, VoteOption};
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1_000;
const MAX_MODULES: usize = 64;

fn require_signer(addr: &AccAddress, what: &str) -> Result<()> {
    if addr.is_empty() {
        return Err(NmxError::InvalidAddress(format!("empty {} address", what)));
    }
    Ok(())
}

fn require_json(text: &str, what: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(text)
        .map(|_| ())
        .map_err(|e| NmxError::InvalidMessage(format!("{} is not JSON: {}", what, e)))
}

/// Registers a chain in the `proposed` state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateChain {
    /// Creator
    pub creator: AccAddress,
    /// Display name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Execution model
    pub chain_type: ChainType,
    /// Modules the chain runs
    #[serde(default)]
    pub modules: Vec<String>,
    /// Configuration, JSON text
    #[serde(default)]
    pub config: String,
    /// Metadata, JSON text
    #[serde(default)]
    pub metadata: String,
}

impl MsgCreateChain {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.creator
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.creator, "creator")?;
        if self.name.trim().is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(NmxError::InvalidMessage(format!(
                "chain name must be 1 to {} bytes",
                MAX_NAME_LEN
            )));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(NmxError::InvalidMessage("chain description is too long".into()));
        }
        if self.modules.len() > MAX_MODULES || self.modules.iter().any(|m| m.trim().is_empty()) {
            return Err(NmxError::InvalidMessage("chain modules must be named, at most 64".into()));
        }
        require_json(&self.config, "chain config")?;
        require_json(&self.metadata, "chain metadata")
    }
}

/// Starts deploying a chain as its creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeployChain {
    /// Creator
    pub deployer: AccAddress,
    /// Chain
    pub chain_id: String,
}

impl MsgDeployChain {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.deployer
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.deployer, "deployer")?;
        if self.chain_id.trim().is_empty() {
            return Err(NmxError::InvalidMessage("chain id is empty".into()));
        }
        Ok(())
    }
}

/// Proposes a change to an active chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitChainProposal {
    /// Proposer
    pub proposer: AccAddress,
    /// Target chain
    pub chain_id: String,
    /// Title
    pub title: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Kind of change
    pub proposal_type: ProposalType,
    /// Change payload, JSON text
    #[serde(default)]
    pub content: String,
}

impl MsgSubmitChainProposal {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.proposer
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.proposer, "proposer")?;
        if self.chain_id.trim().is_empty() {
            return Err(NmxError::InvalidMessage("chain id is empty".into()));
        }
        validate_proposal_text(&self.title, &self.description)?;
        require_json(&self.content, "proposal content")
    }
}

/// Votes on a chain proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVoteChainProposal {
    /// Voter
    pub voter: AccAddress,
    /// Proposal
    pub proposal_id: u64,
    /// Choice
    pub option: VoteOption,
}

impl MsgVoteChainProposal {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.voter
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.voter, "voter")?;
        if self.proposal_id == 0 {
            return Err(NmxError::InvalidMessage("proposal id 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_chain_requires_json_config() {
        let mut msg = MsgCreateChain {
            creator: AccAddress::new([3; 20]),
            name: "game".into(),
            description: String::new(),
            chain_type: ChainType::Appchain,
            modules: vec!["core".into(), "token".into()],
            config: r#"{"block_time":2}"#.into(),
            metadata: String::new(),
        };
        assert!(msg.validate_basic().is_ok());
        msg.config = "{block_time".into();
        assert!(msg.validate_basic().is_err());
        msg.config.clear();
        msg.modules.push(" ".into());
        assert!(msg.validate_basic().is_err());
    }
}
