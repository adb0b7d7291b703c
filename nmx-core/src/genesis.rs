// src/genesis.rs

//! Genesis document and application state.
//!
//! The genesis file is JSON. Its `app_state` holds one section per module;
//! a missing section means that module's defaults.

use crate::abci::ConsensusParams;
use crate::errors::{NmxError, Result};
use crate::modules::auth::AuthGenesis;
use crate::modules::bank::BankGenesis;
use crate::modules::capability::CapabilityGenesis;
use crate::modules::crisis::CrisisGenesis;
use crate::modules::distribution::DistributionGenesis;
use crate::modules::dynacontracts::DynaContractsGenesis;
use crate::modules::evidence::EvidenceGenesis;
use crate::modules::genutil::GenutilGenesis;
use crate::modules::hyperchains::HyperChainsGenesis;
use crate::modules::neuropos::NeuroPoSGenesis;
use crate::modules::slashing::SlashingGenesis;
use crate::modules::staking::StakingGenesis;
use crate::modules::truthgpt::TruthGptGenesis;
use crate::modules::upgrade::UpgradeGenesis;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Per-module genesis sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    /// Accounts and auth parameters
    #[serde(default)]
    pub auth: AuthGenesis,
    /// Balances and supply
    #[serde(default)]
    pub bank: BankGenesis,
    /// Capability owners
    #[serde(default)]
    pub capability: CapabilityGenesis,
    /// Crisis section, empty
    #[serde(default)]
    pub crisis: CrisisGenesis,
    /// Community pool
    #[serde(default)]
    pub distribution: DistributionGenesis,
    /// Contract registry
    #[serde(default)]
    pub dynacontracts: DynaContractsGenesis,
    /// Processed evidence
    #[serde(default)]
    pub evidence: EvidenceGenesis,
    /// Genesis create-validator messages
    #[serde(default)]
    pub genutil: GenutilGenesis,
    /// Chain registry
    #[serde(default)]
    pub hyperchains: HyperChainsGenesis,
    /// Reputation and neural networks
    #[serde(default)]
    pub neuropos: NeuroPoSGenesis,
    /// Signing records
    #[serde(default)]
    pub slashing: SlashingGenesis,
    /// Validators and delegations
    #[serde(default)]
    pub staking: StakingGenesis,
    /// Oracle state
    #[serde(default)]
    pub truthgpt: TruthGptGenesis,
    /// Upgrade plan and history
    #[serde(default)]
    pub upgrade: UpgradeGenesis,
}

impl AppState {
    /// Parses the JSON `app_state` bytes delivered with InitChain
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encodes the state as JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Genesis file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDoc {
    /// Genesis time
    pub genesis_time: Timestamp,
    /// Chain identifier
    pub chain_id: String,
    /// Height of the first block
    #[serde(default = "first_height")]
    pub initial_height: u64,
    /// Initial consensus parameters
    #[serde(default)]
    pub consensus_params: ConsensusParams,
    /// Module sections
    #[serde(default)]
    pub app_state: AppState,
}

fn first_height() -> u64 {
    1
}

impl GenesisDoc {
    /// Genesis with default module sections
    pub fn new(chain_id: impl Into<String>, genesis_time: Timestamp) -> Self {
        Self {
            genesis_time,
            chain_id: chain_id.into(),
            initial_height: first_height(),
            consensus_params: ConsensusParams::default(),
            app_state: AppState::default(),
        }
    }

    /// Checks the document fields; module sections are checked by their modules
    pub fn validate(&self) -> Result<()> {
        if self.chain_id.trim().is_empty() || self.chain_id.len() > 50 {
            return Err(NmxError::InvalidState(format!("invalid chain id {:?}", self.chain_id)));
        }
        if self.initial_height == 0 {
            return Err(NmxError::InvalidState("initial height must be at least 1".into()));
        }
        Ok(())
    }

    /// Reads and validates a genesis file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc: GenesisDoc = serde_json::from_slice(&fs::read(path)?)?;
        doc.validate()?;
        info!(
            "loaded genesis for {} at height {} from {}",
            doc.chain_id,
            doc.initial_height,
            path.display()
        );
        Ok(doc)
    }

    /// Writes the document as pretty JSON
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_default() {
        let json = br#"{
            "genesis_time": "2023-11-14T22:13:20Z",
            "chain_id": "nmx-1",
            "app_state": { "bank": { "balances": [] } }
        }"#;
        let doc: GenesisDoc = serde_json::from_slice(json).unwrap();
        assert_eq!(doc.initial_height, 1);
        assert_eq!(doc.app_state, AppState::default());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_empty_app_state_bytes() {
        assert_eq!(AppState::from_json(&[]).unwrap(), AppState::default());
        let state = AppState::default();
        assert_eq!(AppState::from_json(&state.to_json().unwrap()).unwrap(), state);
    }

    #[test]
    fn test_invalid_documents() {
        let mut doc = GenesisDoc::new("", Timestamp::EPOCH);
        assert!(doc.validate().is_err());
        doc.chain_id = "nmx-1".into();
        doc.initial_height = 0;
        assert!(doc.validate().is_err());
    }
}
