// src/modules/slashing/genesis.rs

//! Slashing genesis import and export.

use super::keeper::SlashingKeeper;
use super::params::SlashingParams;
use super::store;
use super::types::{ValidatorMissedBlocks, ValidatorSigningInfo};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::params::{ParamSet, ParamsKeeper};
use crate::modules::staking::ValidatorSlashEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Slashing genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingGenesis {
    /// Parameters
    #[serde(default)]
    pub params: SlashingParams,
    /// Signing records
    #[serde(default)]
    pub signing_infos: Vec<ValidatorSigningInfo>,
    /// Missed-block bitmaps
    #[serde(default)]
    pub missed_blocks: Vec<ValidatorMissedBlocks>,
    /// Applied slashes
    #[serde(default)]
    pub slash_events: Vec<ValidatorSlashEvent>,
}

impl SlashingKeeper {
    /// Writes the slashing genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &SlashingGenesis) -> Result<()> {
        ParamsKeeper.set(ctx, &genesis.params)?;
        for info in &genesis.signing_infos {
            store::set_signing_info(ctx, info)?;
        }
        for missed in &genesis.missed_blocks {
            for index in &missed.missed_indices {
                store::set_missed(ctx, &missed.address, *index, true)?;
            }
        }
        for event in &genesis.slash_events {
            store::set_slash_event(ctx, event)?;
        }
        Ok(())
    }

    /// Reads the slashing genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<SlashingGenesis> {
        Ok(SlashingGenesis {
            params: self.params(ctx)?,
            signing_infos: store::all_signing_infos(ctx)?,
            missed_blocks: store::all_missed(ctx)?,
            slash_events: store::all_slash_events(ctx)?,
        })
    }
}

/// Stateless check of a slashing genesis section
pub fn validate_genesis(genesis: &SlashingGenesis) -> Result<()> {
    genesis.params.validate()?;
    let mut seen = BTreeSet::new();
    for info in &genesis.signing_infos {
        if !seen.insert(info.address) {
            return Err(NmxError::InvalidState(format!("duplicate signing info for {}", info.address)));
        }
        if info.signed_blocks_window <= 0 || info.index_offset >= info.signed_blocks_window as u64 {
            return Err(NmxError::InvalidState(format!(
                "signing info {} has offset {} outside its window {}",
                info.address, info.index_offset, info.signed_blocks_window
            )));
        }
        if info.missed_blocks_counter > info.signed_blocks_window as u64 {
            return Err(NmxError::InvalidState(format!(
                "signing info {} counts {} misses in a window of {}",
                info.address, info.missed_blocks_counter, info.signed_blocks_window
            )));
        }
    }
    for missed in &genesis.missed_blocks {
        let info = genesis
            .signing_infos
            .iter()
            .find(|i| i.address == missed.address)
            .ok_or_else(|| NmxError::InvalidState(format!("missed blocks without signing info for {}", missed.address)))?;
        if missed.missed_indices.len() as u64 != info.missed_blocks_counter {
            return Err(NmxError::InvalidState(format!(
                "bitmap of {} holds {} misses, counter says {}",
                missed.address,
                missed.missed_indices.len(),
                info.missed_blocks_counter
            )));
        }
        if missed.missed_indices.iter().any(|i| *i >= info.signed_blocks_window as u64) {
            return Err(NmxError::InvalidState(format!("bitmap index outside window for {}", missed.address)));
        }
    }
    Ok(())
}
