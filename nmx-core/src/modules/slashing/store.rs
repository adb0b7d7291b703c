// src/modules/slashing/store.rs

//! Key layout of the slashing subtree.

use super::types::{ValidatorMissedBlocks, ValidatorSigningInfo};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::staking::ValidatorSlashEvent;
use crate::store::{key, names};
use nmx_crypto::{ConsAddress, ValAddress, ADDRESS_SIZE};
use std::collections::BTreeMap;

pub(crate) const SLASH_EVENT: u8 = 0x0D;
pub(crate) const MISSED_BLOCK: u8 = 0x0E;
pub(crate) const SIGNING_INFO: u8 = 0x0F;

const MISSED: &[u8] = &[1];

pub(crate) fn get_signing_info(ctx: &mut Context<'_>, cons: &ConsAddress) -> Result<Option<ValidatorSigningInfo>> {
    ctx.kv(names::SLASHING).get(&key(SIGNING_INFO, &[cons.as_bytes()]))
}

pub(crate) fn set_signing_info(ctx: &mut Context<'_>, info: &ValidatorSigningInfo) -> Result<()> {
    ctx.kv(names::SLASHING)
        .set(&key(SIGNING_INFO, &[info.address.as_bytes()]), info)
}

pub(crate) fn all_signing_infos(ctx: &mut Context<'_>) -> Result<Vec<ValidatorSigningInfo>> {
    ctx.kv(names::SLASHING).values(&[SIGNING_INFO])
}

// missed-block bitmap; an absent slot means signed

fn missed_key(cons: &ConsAddress, index: u64) -> Vec<u8> {
    key(MISSED_BLOCK, &[cons.as_bytes(), &index.to_be_bytes()])
}

pub(crate) fn is_missed(ctx: &mut Context<'_>, cons: &ConsAddress, index: u64) -> Result<bool> {
    ctx.kv(names::SLASHING).has(&missed_key(cons, index))
}

pub(crate) fn set_missed(ctx: &mut Context<'_>, cons: &ConsAddress, index: u64, missed: bool) -> Result<()> {
    let mut store = ctx.kv(names::SLASHING);
    if missed {
        store.set_raw(&missed_key(cons, index), MISSED.to_vec())
    } else {
        store.delete(&missed_key(cons, index))
    }
}

pub(crate) fn clear_missed(ctx: &mut Context<'_>, cons: &ConsAddress) -> Result<()> {
    let mut store = ctx.kv(names::SLASHING);
    for (k, _) in store.iter_raw(&key(MISSED_BLOCK, &[cons.as_bytes()]))? {
        store.delete(&k)?;
    }
    Ok(())
}

/// Bitmap of every validator, grouped by consensus address
pub(crate) fn all_missed(ctx: &mut Context<'_>) -> Result<Vec<ValidatorMissedBlocks>> {
    let mut grouped: BTreeMap<ConsAddress, Vec<u64>> = BTreeMap::new();
    for (k, _) in ctx.kv(names::SLASHING).iter_raw(&[MISSED_BLOCK])? {
        if k.len() != 1 + ADDRESS_SIZE + 8 {
            return Err(NmxError::StoreError(format!("bad missed-block key {}", hex::encode(&k))));
        }
        let cons = ConsAddress::from_slice(&k[1..1 + ADDRESS_SIZE])?;
        let mut index = [0u8; 8];
        index.copy_from_slice(&k[1 + ADDRESS_SIZE..]);
        grouped.entry(cons).or_default().push(u64::from_be_bytes(index));
    }
    Ok(grouped
        .into_iter()
        .map(|(address, missed_indices)| ValidatorMissedBlocks {
            address,
            missed_indices,
        })
        .collect())
}

// slash events

fn slash_event_prefix(val: &ValAddress, height: u64) -> Vec<u8> {
    key(SLASH_EVENT, &[val.as_bytes(), &height.to_be_bytes()])
}

/// Stores `event` under the next free sequence for its validator and height
pub(crate) fn append_slash_event(ctx: &mut Context<'_>, event: &ValidatorSlashEvent) -> Result<ValidatorSlashEvent> {
    let prefix = slash_event_prefix(&event.validator, event.height);
    let mut store = ctx.kv(names::SLASHING);
    let sequence = store.iter_raw(&prefix)?.len() as u32;
    let stored = ValidatorSlashEvent {
        sequence,
        ..event.clone()
    };
    set_slash_event_in(&mut store, &stored)?;
    Ok(stored)
}

fn set_slash_event_in(store: &mut crate::store::KvStore<'_>, event: &ValidatorSlashEvent) -> Result<()> {
    let mut k = slash_event_prefix(&event.validator, event.height);
    k.extend_from_slice(&event.sequence.to_be_bytes());
    store.set(&k, event)
}

pub(crate) fn set_slash_event(ctx: &mut Context<'_>, event: &ValidatorSlashEvent) -> Result<()> {
    set_slash_event_in(&mut ctx.kv(names::SLASHING), event)
}

pub(crate) fn validator_slash_events(ctx: &mut Context<'_>, val: &ValAddress) -> Result<Vec<ValidatorSlashEvent>> {
    ctx.kv(names::SLASHING).values(&key(SLASH_EVENT, &[val.as_bytes()]))
}

pub(crate) fn all_slash_events(ctx: &mut Context<'_>) -> Result<Vec<ValidatorSlashEvent>> {
    ctx.kv(names::SLASHING).values(&[SLASH_EVENT])
}
