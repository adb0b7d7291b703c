// src/modules/dynacontracts/msgs.rs

//! DynaContracts messages.

use super::types::ContractLanguage;
use crate::errors::{NmxError, Result};
use crate::modules::proposals::{validate_proposal_text, VoteOption};
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1_000;

fn require_signer(addr: &AccAddress, what: &str) -> Result<()> {
    if addr.is_empty() {
        return Err(NmxError::InvalidAddress(format!("empty {} address", what)));
    }
    Ok(())
}

fn require_id(id: &str, what: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(NmxError::InvalidMessage(format!("{} id is empty", what)));
    }
    Ok(())
}

/// Creates a contract at version 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateContract {
    /// Creator and owner
    pub creator: AccAddress,
    /// Display name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Source language
    pub language: ContractLanguage,
    /// Code blob
    pub code: Vec<u8>,
    /// Opaque metadata stored with the code
    #[serde(default)]
    pub metadata: Vec<u8>,
    /// Enables AI-controlled parameters
    #[serde(default)]
    pub ai_enabled: bool,
    /// Model adjusting them
    #[serde(default)]
    pub ai_model_id: Option<String>,
    /// Oracle data sources read by the contract
    #[serde(default)]
    pub data_source_ids: Vec<String>,
    /// Routes changes through proposals
    #[serde(default)]
    pub governance_enabled: bool,
}

impl MsgCreateContract {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.creator
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.creator, "creator")?;
        if self.name.trim().is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(NmxError::InvalidMessage(format!(
                "contract name must be 1 to {} bytes",
                MAX_NAME_LEN
            )));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(NmxError::InvalidMessage("contract description is too long".into()));
        }
        if self.code.is_empty() {
            return Err(NmxError::InvalidMessage("contract code is empty".into()));
        }
        if self.ai_enabled && self.ai_model_id.as_deref().map_or(true, |m| m.trim().is_empty()) {
            return Err(NmxError::InvalidMessage("AI-enabled contract needs a model id".into()));
        }
        Ok(())
    }
}

/// Replaces a contract's code as its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateContract {
    /// Owner
    pub owner: AccAddress,
    /// Contract
    pub contract_id: String,
    /// New code blob
    pub code: Vec<u8>,
    /// New description, when set
    #[serde(default)]
    pub description: Option<String>,
}

impl MsgUpdateContract {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.owner, "owner")?;
        require_id(&self.contract_id, "contract")?;
        if self.code.is_empty() {
            return Err(NmxError::InvalidMessage("contract code is empty".into()));
        }
        if self.description.as_ref().is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN) {
            return Err(NmxError::InvalidMessage("contract description is too long".into()));
        }
        Ok(())
    }
}

/// Records a call to an active contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExecuteContract {
    /// Caller
    pub caller: AccAddress,
    /// Contract
    pub contract_id: String,
    /// Method name
    pub method: String,
    /// Call arguments
    #[serde(default)]
    pub params: Vec<u8>,
}

impl MsgExecuteContract {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.caller
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.caller, "caller")?;
        require_id(&self.contract_id, "contract")?;
        if self.method.trim().is_empty() {
            return Err(NmxError::InvalidMessage("method is empty".into()));
        }
        Ok(())
    }
}

/// Sets one contract parameter as the owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetContractParameter {
    /// Owner
    pub owner: AccAddress,
    /// Contract
    pub contract_id: String,
    /// Parameter name
    pub name: String,
    /// Declared type
    #[serde(default)]
    pub param_type: String,
    /// Value
    pub value: String,
    /// Lower bound
    #[serde(default)]
    pub min_value: Option<String>,
    /// Upper bound
    #[serde(default)]
    pub max_value: Option<String>,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Hands the parameter to the contract's model
    #[serde(default)]
    pub ai_controlled: bool,
}

impl MsgSetContractParameter {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.owner, "owner")?;
        require_id(&self.contract_id, "contract")?;
        if self.name.trim().is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(NmxError::InvalidMessage(format!(
                "parameter name must be 1 to {} bytes",
                MAX_NAME_LEN
            )));
        }
        Ok(())
    }
}

/// Proposes new code or parameters for a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitContractProposal {
    /// Proposer
    pub proposer: AccAddress,
    /// Target contract
    pub contract_id: String,
    /// Title
    pub title: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Replacement code
    #[serde(default)]
    pub new_code: Option<Vec<u8>>,
    /// Parameter values to set
    #[serde(default)]
    pub new_params: BTreeMap<String, String>,
}

impl MsgSubmitContractProposal {
    /// Signer
    pub fn signer(&self) -> AccAddress {
        self.proposer
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.proposer, "proposer")?;
        require_id(&self.contract_id, "contract")?;
        validate_proposal_text(&self.title, &self.description)?;
        if self.new_code.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(NmxError::InvalidMessage("proposed code is empty".into()));
        }
        if self.new_code.is_none() && self.new_params.is_empty() {
            return Err(NmxError::InvalidMessage("proposal changes nothing".into()));
        }
        Ok(())
    }
}

/// Votes on a contract proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVoteContractProposal {
    /// Voter
    pub voter: AccAddress,
    /// Proposal
    pub proposal_id: u64,
    /// Choice
    pub option: VoteOption,
}

impl MsgVoteContractProposal {
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

    fn create_test_contract_msg() -> MsgCreateContract {
        MsgCreateContract {
            creator: AccAddress::new([1; 20]),
            name: "escrow".into(),
            description: String::new(),
            language: ContractLanguage::Rust,
            code: b"code".to_vec(),
            metadata: Vec::new(),
            ai_enabled: false,
            ai_model_id: None,
            data_source_ids: Vec::new(),
            governance_enabled: true,
        }
    }

    #[test]
    fn test_create_contract_validation() {
        assert!(create_test_contract_msg().validate_basic().is_ok());

        let mut msg = create_test_contract_msg();
        msg.code.clear();
        assert!(msg.validate_basic().is_err());

        let mut msg = create_test_contract_msg();
        msg.ai_enabled = true;
        assert!(msg.validate_basic().is_err());
        msg.ai_model_id = Some("default-ai-model".into());
        assert!(msg.validate_basic().is_ok());
    }

    #[test]
    fn test_empty_proposal_rejected() {
        let mut msg = MsgSubmitContractProposal {
            proposer: AccAddress::new([1; 20]),
            contract_id: "contract-1".into(),
            title: "Raise limit".into(),
            description: String::new(),
            new_code: None,
            new_params: BTreeMap::new(),
        };
        assert!(msg.validate_basic().is_err());
        msg.new_params.insert("limit".into(), "10".into());
        assert!(msg.validate_basic().is_ok());
        msg.new_code = Some(Vec::new());
        assert!(msg.validate_basic().is_err());
    }
}
