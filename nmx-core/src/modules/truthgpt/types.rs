// src/modules/truthgpt/types.rs

//! TruthGPT records.

use crate::coins::Coins;
use crate::errors::{NmxError, Result};
use crate::math::Dec;
use crate::time::Timestamp;
use nmx_crypto::AccAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confidence given to sources that answer at dispatch
pub fn dispatch_confidence() -> Dec {
    Dec::percent(90)
}

/// Confidence a verification task settles on
pub fn verification_confidence() -> Dec {
    Dec::percent(85)
}

/// Confidence of a freshly reported misinformation record
pub fn reported_confidence() -> Dec {
    Dec::percent(50)
}

/// Result blob of a completed verification task
pub const VERIFICATION_RESULT: &[u8] = br#"{"verified":true,"confidence":0.85}"#;

/// Kind of endpoint a data source serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum DataSourceType {
    Api,
    Website,
    Blockchain,
    Ipfs,
    Custom,
}

/// Lifecycle of a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceStatus {
    /// Registered, not yet vetted
    Pending,
    /// Serving queries
    Active,
    /// Paused by its owner
    Inactive,
    /// Trust fell below the minimum; terminal
    Blocked,
}

impl DataSourceStatus {
    /// Statuses an owner may set
    pub fn owner_settable(&self) -> bool {
        !matches!(self, DataSourceStatus::Blocked)
    }
}

impl fmt::Display for DataSourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataSourceStatus::Pending => "pending",
            DataSourceStatus::Active => "active",
            DataSourceStatus::Inactive => "inactive",
            DataSourceStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

impl FromStr for DataSourceStatus {
    type Err = NmxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DataSourceStatus::Pending),
            "active" => Ok(DataSourceStatus::Active),
            "inactive" => Ok(DataSourceStatus::Inactive),
            "blocked" => Ok(DataSourceStatus::Blocked),
            other => Err(NmxError::InvalidMessage(format!("unknown data source status {}", other))),
        }
    }
}

/// Registered data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Content-derived id
    pub id: String,
    /// Display name
    pub name: String,
    /// Free text
    pub description: String,
    /// Endpoint kind
    pub source_type: DataSourceType,
    /// Where off-chain workers fetch from
    pub endpoint: String,
    /// Status
    pub status: DataSourceStatus,
    /// Owner, paid for responses
    pub owner: AccAddress,
    /// Registration time
    pub created_at: Timestamp,
    /// Last change
    pub updated_at: Timestamp,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

/// Trust ranking of a data source
///
/// The four components move toward the ratios observed over one ranking
/// period; the counters collect those observations and reset afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceRank {
    /// Ranked source
    pub source_id: String,
    /// Share of assigned queries answered
    pub reliability: Dec,
    /// Mean confidence of answers
    pub accuracy: Dec,
    /// Share of answers in time
    pub timeliness: Dec,
    /// Share of answers with a payload
    pub completeness: Dec,
    /// Mean of the four components
    pub trust_score: Dec,
    /// Last evaluation
    pub last_evaluated: Timestamp,
    /// Queries dispatched to the source this period
    pub assigned: u64,
    /// Answers this period
    pub responded: u64,
    /// Answers in the first half of the timeout
    pub on_time: u64,
    /// Answers with a payload
    pub complete: u64,
    /// Sum of answer confidences
    pub confidence_sum: Dec,
}

impl DataSourceRank {
    /// Neutral rank of a new source
    pub fn new(source_id: &str, now: Timestamp) -> Self {
        let half = Dec::percent(50);
        Self {
            source_id: source_id.to_string(),
            reliability: half,
            accuracy: half,
            timeliness: half,
            completeness: half,
            trust_score: half,
            last_evaluated: now,
            assigned: 0,
            responded: 0,
            on_time: 0,
            complete: 0,
            confidence_sum: Dec::ZERO,
        }
    }

    /// Records one answer
    pub fn record_response(&mut self, on_time: bool, complete: bool, confidence: Dec) {
        self.responded += 1;
        if on_time {
            self.on_time += 1;
        }
        if complete {
            self.complete += 1;
        }
        self.confidence_sum += confidence;
    }

    /// Whether anything happened since the last evaluation
    pub fn has_activity(&self) -> bool {
        self.assigned > 0 || self.responded > 0
    }

    /// Recomputes the trust score from the components
    pub fn refresh_trust(&mut self) {
        let sum = self.reliability + self.accuracy + self.timeliness + self.completeness;
        self.trust_score = sum.quo_int(4).unwrap_or(Dec::ZERO).clamp_unit();
    }

    /// Clears the period counters
    pub fn reset_counters(&mut self) {
        self.assigned = 0;
        self.responded = 0;
        self.on_time = 0;
        self.complete = 0;
        self.confidence_sum = Dec::ZERO;
    }
}

/// State of an oracle query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum QueryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Disputed,
}

impl QueryStatus {
    /// Whether the fee is still escrowed
    pub fn is_open(&self) -> bool {
        matches!(self, QueryStatus::Pending | QueryStatus::Processing)
    }
}

/// State of one source's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceResponseStatus {
    /// Dispatched, no answer yet
    Awaiting,
    /// Answered
    Success,
    /// Never answered before the query closed
    Failed,
}

/// One source's answer to a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResponse {
    /// Answering source
    pub source_id: String,
    /// Opaque payload
    #[serde(default)]
    pub response: Vec<u8>,
    /// Confidence of the answer
    pub confidence: Dec,
    /// Block time of the answer
    pub timestamp: Timestamp,
    /// Status
    pub status: SourceResponseStatus,
}

impl SourceResponse {
    /// Stub written at dispatch
    pub fn awaiting(source_id: &str, now: Timestamp) -> Self {
        Self {
            source_id: source_id.to_string(),
            response: Vec::new(),
            confidence: Dec::ZERO,
            timestamp: now,
            status: SourceResponseStatus::Awaiting,
        }
    }
}

/// Request for off-chain data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleQuery {
    /// Content-derived id
    pub id: String,
    /// Payer
    pub requester: AccAddress,
    /// Caller-defined kind
    pub query_type: String,
    /// Query text
    pub query: String,
    /// Sources asked
    pub data_sources: Vec<String>,
    /// Status
    pub status: QueryStatus,
    /// Escrowed fee
    pub fee: Coins,
    /// Submission time
    pub created_at: Timestamp,
    /// Submission height
    pub created_height: u64,
    /// Height of the dispatching BeginBlock
    #[serde(default)]
    pub dispatched_height: Option<u64>,
    /// Completion or failure time
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    /// Response id once completed
    #[serde(default)]
    pub response_id: Option<String>,
    /// Per-source answers while processing
    #[serde(default)]
    pub source_responses: Vec<SourceResponse>,
    /// Opaque data handed back to the requester
    #[serde(default)]
    pub callback_data: Vec<u8>,
}

impl OracleQuery {
    /// Answers received so far
    pub fn answered(&self) -> usize {
        self.source_responses
            .iter()
            .filter(|r| r.status == SourceResponseStatus::Success)
            .count()
    }
}

/// Aggregated answer to a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponse {
    /// `response-<query id>`
    pub id: String,
    /// Answered query
    pub query_id: String,
    /// Per-source answers
    pub source_responses: Vec<SourceResponse>,
    /// Aggregated confidence
    pub confidence: Dec,
    /// Model id, or empty
    pub processed_by: String,
    /// Completion time
    pub created_at: Timestamp,
}

/// Response id of a query
pub fn response_id(query_id: &str) -> String {
    format!("response-{}", query_id)
}

/// Registered AI model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiModel {
    /// Id
    pub id: String,
    /// Owner, the only account allowed to update it
    pub owner: AccAddress,
    /// Display name
    pub name: String,
    /// Free text
    pub description: String,
    /// Model family
    pub model_type: String,
    /// Artifact location
    pub model_url: String,
    /// Artifact digest
    pub model_hash: String,
    /// Bumped on every update
    pub version: u64,
    /// Registration time
    pub created_at: Timestamp,
    /// Last change
    pub updated_at: Timestamp,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: Vec<u8>,
}

/// Check state of a misinformation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum MisinformationStatus {
    Pending,
    Verified,
}

/// Reported misinformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misinformation {
    /// Content-derived id
    pub id: String,
    /// Reported content
    pub content: String,
    /// Where it was seen
    pub source: String,
    /// Reporter
    pub reporter: AccAddress,
    /// Confidence that it is misinformation
    pub confidence: Dec,
    /// Supporting evidence
    pub evidence: String,
    /// Report time
    pub created_at: Timestamp,
    /// Status
    pub status: MisinformationStatus,
    /// Models that checked it
    #[serde(default)]
    pub verified_by: Vec<String>,
}

/// State of a verification task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// Request to verify a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationTask {
    /// Id; `task-<misinformation id>` for tasks raised by a report
    pub id: String,
    /// Content to verify
    pub content: String,
    /// Where it was seen
    pub source: String,
    /// Creator
    pub creator: AccAddress,
    /// Status
    pub status: TaskStatus,
    /// Caller-chosen priority
    pub priority: u64,
    /// Linked misinformation record
    #[serde(default)]
    pub misinformation_id: Option<String>,
    /// Creation time
    pub created_at: Timestamp,
    /// Completion time
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    /// Opaque result
    #[serde(default)]
    pub result: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rank_is_neutral() {
        let mut rank = DataSourceRank::new("source-1-aabbccdd", Timestamp::EPOCH);
        assert_eq!(rank.trust_score, Dec::percent(50));
        assert!(!rank.has_activity());
        rank.reliability = Dec::ONE;
        rank.refresh_trust();
        assert_eq!(rank.trust_score, Dec::from_ratio(5, 8));
    }

    #[test]
    fn test_record_response_counts() {
        let mut rank = DataSourceRank::new("s", Timestamp::EPOCH);
        rank.record_response(true, false, Dec::percent(70));
        rank.record_response(false, true, Dec::percent(90));
        assert_eq!((rank.responded, rank.on_time, rank.complete), (2, 1, 1));
        assert_eq!(rank.confidence_sum, Dec::from_ratio(16, 10));
        rank.reset_counters();
        assert!(!rank.has_activity());
    }

    #[test]
    fn test_status_names() {
        assert_eq!("blocked".parse::<DataSourceStatus>().unwrap(), DataSourceStatus::Blocked);
        assert!("gone".parse::<DataSourceStatus>().is_err());
        assert!(!DataSourceStatus::Blocked.owner_settable());
        assert_eq!(response_id("query-3-0a0b0c0d"), "response-query-3-0a0b0c0d");
    }
}
