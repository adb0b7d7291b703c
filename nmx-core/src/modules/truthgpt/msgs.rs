// src/modules/truthgpt/msgs.rs

//! TruthGPT messages.

use super::types::{DataSourceStatus, DataSourceType};
use crate::coins::Coins;
use crate::errors::{NmxError, Result};
use crate::math::Dec;
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_CONTENT_LEN: usize = 1_000;

fn require_signer(addr: &AccAddress, what: &str) -> Result<()> {
    if addr.is_empty() {
        return Err(NmxError::InvalidAddress(format!("empty {} address", what)));
    }
    Ok(())
}

fn require_text(value: &str, what: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(NmxError::InvalidMessage(format!("{} is empty", what)));
    }
    if value.len() > max {
        return Err(NmxError::InvalidMessage(format!("{} is longer than {} bytes", what, max)));
    }
    Ok(())
}

fn limit_text(value: &str, what: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(NmxError::InvalidMessage(format!("{} is longer than {} bytes", what, max)));
    }
    Ok(())
}

/// Registers a data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegisterDataSource {
    /// Owner
    pub owner: AccAddress,
    /// Display name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Endpoint kind
    pub source_type: DataSourceType,
    /// Endpoint
    pub endpoint: String,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

impl MsgRegisterDataSource {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.owner, "owner")?;
        require_text(&self.name, "name", MAX_NAME_LEN)?;
        limit_text(&self.description, "description", MAX_DESCRIPTION_LEN)?;
        require_text(&self.endpoint, "endpoint", MAX_DESCRIPTION_LEN)
    }
}

/// Edits a data source the signer owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateDataSource {
    /// Owner
    pub owner: AccAddress,
    /// Source
    pub id: String,
    /// New name, when given
    #[serde(default)]
    pub name: Option<String>,
    /// New description, when given
    #[serde(default)]
    pub description: Option<String>,
    /// New endpoint, when given
    #[serde(default)]
    pub endpoint: Option<String>,
    /// New status, when given
    #[serde(default)]
    pub status: Option<DataSourceStatus>,
}

impl MsgUpdateDataSource {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.owner, "owner")?;
        require_text(&self.id, "source id", MAX_NAME_LEN)?;
        if let Some(name) = &self.name {
            require_text(name, "name", MAX_NAME_LEN)?;
        }
        if let Some(description) = &self.description {
            limit_text(description, "description", MAX_DESCRIPTION_LEN)?;
        }
        if let Some(endpoint) = &self.endpoint {
            require_text(endpoint, "endpoint", MAX_DESCRIPTION_LEN)?;
        }
        if let Some(status) = self.status {
            if !status.owner_settable() {
                return Err(NmxError::InvalidMessage(format!("owners cannot set status {}", status)));
            }
        }
        Ok(())
    }
}

/// Registers an AI model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegisterAiModel {
    /// Owner
    pub owner: AccAddress,
    /// Display name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Model family
    pub model_type: String,
    /// Artifact location
    #[serde(default)]
    pub model_url: String,
    /// Artifact digest
    #[serde(default)]
    pub model_hash: String,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

impl MsgRegisterAiModel {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.owner, "owner")?;
        require_text(&self.name, "name", MAX_NAME_LEN)?;
        require_text(&self.model_type, "model type", MAX_NAME_LEN)?;
        limit_text(&self.description, "description", MAX_DESCRIPTION_LEN)
    }
}

/// Replaces a model's artifact and bumps its version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateAiModel {
    /// Owner
    pub owner: AccAddress,
    /// Model
    pub id: String,
    /// Artifact location
    pub model_url: String,
    /// Artifact digest
    pub model_hash: String,
    /// New description, when given
    #[serde(default)]
    pub description: Option<String>,
}

impl MsgUpdateAiModel {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.owner
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.owner, "owner")?;
        require_text(&self.id, "model id", MAX_NAME_LEN)?;
        require_text(&self.model_hash, "model hash", MAX_DESCRIPTION_LEN)?;
        if let Some(description) = &self.description {
            limit_text(description, "description", MAX_DESCRIPTION_LEN)?;
        }
        Ok(())
    }
}

/// Submits a query and escrows its fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateOracleQuery {
    /// Payer
    pub requester: AccAddress,
    /// Caller-defined kind
    pub query_type: String,
    /// Query text
    pub query: String,
    /// Sources to ask
    pub data_sources: Vec<String>,
    /// Fee
    pub fee: Coins,
    /// Opaque data handed back on completion
    #[serde(default)]
    pub callback_data: Vec<u8>,
}

impl MsgCreateOracleQuery {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.requester
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.requester, "requester")?;
        require_text(&self.query_type, "query type", MAX_NAME_LEN)?;
        require_text(&self.query, "query", MAX_CONTENT_LEN)?;
        if self.data_sources.is_empty() {
            return Err(NmxError::InvalidMessage("query lists no data sources".into()));
        }
        let unique: BTreeSet<&String> = self.data_sources.iter().collect();
        if unique.len() != self.data_sources.len() {
            return Err(NmxError::InvalidMessage("query lists a data source twice".into()));
        }
        self.fee.validate()?;
        if self.fee.is_empty() {
            return Err(NmxError::InvalidCoins("query fee is empty".into()));
        }
        Ok(())
    }
}

/// A source owner's answer to a dispatched query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitSourceResponse {
    /// Source owner
    pub responder: AccAddress,
    /// Answered query
    pub query_id: String,
    /// Answering source
    pub source_id: String,
    /// Opaque payload
    #[serde(default)]
    pub response: Vec<u8>,
    /// Confidence in `[0, 1]`
    pub confidence: Dec,
}

impl MsgSubmitSourceResponse {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.responder
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.responder, "responder")?;
        require_text(&self.query_id, "query id", MAX_NAME_LEN)?;
        require_text(&self.source_id, "source id", MAX_NAME_LEN)?;
        if !self.confidence.is_unit() {
            return Err(NmxError::InvalidMessage(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Reports misinformation and raises a verification task for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgReportMisinformation {
    /// Reporter
    pub reporter: AccAddress,
    /// Reported content
    pub content: String,
    /// Where it was seen
    pub source: String,
    /// Supporting evidence
    #[serde(default)]
    pub evidence: String,
}

impl MsgReportMisinformation {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.reporter
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.reporter, "reporter")?;
        require_text(&self.content, "content", MAX_CONTENT_LEN)?;
        require_text(&self.source, "source", MAX_DESCRIPTION_LEN)?;
        limit_text(&self.evidence, "evidence", MAX_CONTENT_LEN)
    }
}

/// Asks for a piece of content to be verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateVerificationTask {
    /// Creator
    pub creator: AccAddress,
    /// Content to verify
    pub content: String,
    /// Where it was seen
    pub source: String,
    /// Caller-chosen priority
    #[serde(default)]
    pub priority: u64,
}

impl MsgCreateVerificationTask {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.creator
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        require_signer(&self.creator, "creator")?;
        require_text(&self.content, "content", MAX_CONTENT_LEN)?;
        require_text(&self.source, "source", MAX_DESCRIPTION_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_query() -> MsgCreateOracleQuery {
        MsgCreateOracleQuery {
            requester: AccAddress::new([1u8; 20]),
            query_type: "price".into(),
            query: "NMX/USD".into(),
            data_sources: vec!["source-a".into(), "source-b".into()],
            fee: Coins::single(crate::BOND_DENOM, 100u64),
            callback_data: Vec::new(),
        }
    }

    #[test]
    fn test_query_validation() {
        assert!(create_test_query().validate_basic().is_ok());

        let mut msg = create_test_query();
        msg.data_sources.push("source-a".into());
        assert!(matches!(msg.validate_basic(), Err(NmxError::InvalidMessage(_))));

        let mut msg = create_test_query();
        msg.fee = Coins::empty();
        assert!(matches!(msg.validate_basic(), Err(NmxError::InvalidCoins(_))));

        let mut msg = create_test_query();
        msg.query = "x".repeat(MAX_CONTENT_LEN + 1);
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_owner_cannot_block_source() {
        let msg = MsgUpdateDataSource {
            owner: AccAddress::new([1u8; 20]),
            id: "source-1-00000000".into(),
            name: None,
            description: None,
            endpoint: None,
            status: Some(DataSourceStatus::Blocked),
        };
        assert!(msg.validate_basic().is_err());
        let msg = MsgUpdateDataSource {
            status: Some(DataSourceStatus::Inactive),
            ..msg
        };
        assert!(msg.validate_basic().is_ok());
    }

    #[test]
    fn test_response_confidence_range() {
        let msg = MsgSubmitSourceResponse {
            responder: AccAddress::new([1u8; 20]),
            query_id: "query-1-00000000".into(),
            source_id: "source-1-00000000".into(),
            response: b"42".to_vec(),
            confidence: Dec::from_ratio(11, 10),
        };
        assert!(msg.validate_basic().is_err());
    }
}
