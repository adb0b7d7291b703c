// src/modules/dynacontracts/types.rs

//! DynaContracts records.

use crate::modules::proposals::{Proposal, Voting};
use crate::time::Timestamp;
use nmx_crypto::hash::{hash_to_hex, keccak_hash};
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result blob of a recorded execution
pub const EXECUTION_RESULT: &[u8] = br#"{"status":"success"}"#;

/// Source language of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ContractLanguage {
    Rust,
    Solidity,
}

/// Lifecycle of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ContractStatus {
    Active,
    Inactive,
    Proposed,
    Rejected,
    Upgrading,
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractStatus::Active => "active",
            ContractStatus::Inactive => "inactive",
            ContractStatus::Proposed => "proposed",
            ContractStatus::Rejected => "rejected",
            ContractStatus::Upgrading => "upgrading",
        };
        f.write_str(s)
    }
}

/// A registered contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Id
    pub id: String,
    /// Display name
    pub name: String,
    /// Free text
    pub description: String,
    /// Account that created it
    pub creator: AccAddress,
    /// Account allowed to change it directly
    pub owner: AccAddress,
    /// Source language
    pub language: ContractLanguage,
    /// Current code version, starting at 1
    pub version: u64,
    /// Status
    pub status: ContractStatus,
    /// Creation time
    pub created_at: Timestamp,
    /// Last change
    pub updated_at: Timestamp,
    /// Whether a model may adjust AI-controlled parameters
    pub ai_enabled: bool,
    /// Model that adjusts them
    pub ai_model_id: Option<String>,
    /// Oracle data sources the contract reads
    pub data_source_ids: Vec<String>,
    /// Whether changes go through proposals
    pub governance_enabled: bool,
}

/// Code of one contract version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCode {
    /// Contract
    pub contract_id: String,
    /// Version this code belongs to
    pub version: u64,
    /// Code blob
    pub code: Vec<u8>,
    /// Hex keccak of `code`
    pub checksum: String,
    /// Opaque metadata
    pub metadata: Vec<u8>,
}

impl ContractCode {
    /// Code record with its checksum
    pub fn new(contract_id: &str, version: u64, code: Vec<u8>, metadata: Vec<u8>) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            version,
            checksum: checksum(&code),
            code,
            metadata,
        }
    }
}

/// Hex keccak checksum of a code blob
pub fn checksum(code: &[u8]) -> String {
    hash_to_hex(&keccak_hash(code))
}

/// A named contract parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractParameter {
    /// Contract
    pub contract_id: String,
    /// Name
    pub name: String,
    /// Declared type, free text
    pub param_type: String,
    /// Value in its string form
    pub value: String,
    /// Lower bound
    pub min_value: Option<String>,
    /// Upper bound
    pub max_value: Option<String>,
    /// Free text
    pub description: String,
    /// Adjusted by the contract's model rather than its owner
    pub ai_controlled: bool,
    /// Last change
    pub updated_at: Timestamp,
}

/// Proposal to change a contract's code or parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractProposal {
    /// Sequential id
    pub id: u64,
    /// Target contract
    pub contract_id: String,
    /// Title
    pub title: String,
    /// Free text
    pub description: String,
    /// Submitter
    pub proposer: AccAddress,
    /// Replacement code
    pub new_code: Option<Vec<u8>>,
    /// Parameter values to set
    pub new_params: BTreeMap<String, String>,
    /// Voting state
    pub voting: Voting,
}

impl Proposal for ContractProposal {
    fn voting(&self) -> &Voting {
        &self.voting
    }
}

/// Record of one execution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractExecution {
    /// Id
    pub id: String,
    /// Contract
    pub contract_id: String,
    /// Caller
    pub caller: AccAddress,
    /// Method name
    pub method: String,
    /// Call arguments
    pub params: Vec<u8>,
    /// Result blob
    pub result: Vec<u8>,
    /// Gas charged
    pub gas_used: u64,
    /// Execution time
    pub timestamp: Timestamp,
    /// Success flag
    pub success: bool,
    /// Error text on failure
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_keccak_hex() {
        let code = ContractCode::new("contract-1", 1, b"fn main() {}".to_vec(), Vec::new());
        assert_eq!(code.checksum.len(), 64);
        assert_eq!(code.checksum, checksum(b"fn main() {}"));
        assert_ne!(code.checksum, checksum(b"fn main() { }"));
    }
}
