// src/modules/staking/store.rs

//! Key layout and record access for the staking subtree.
//!
//! Queues are set-like: the key carries everything, the value is empty.
//! Rebuilding them from the records they index reproduces the same keys.

use super::types::{Delegation, HistoricalInfo, Redelegation, UnbondingDelegation, Validator};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::store::{key, names};
use crate::time::Timestamp;
use nmx_crypto::{AccAddress, ConsAddress, ValAddress, ADDRESS_SIZE};

pub(crate) const VALIDATOR: u8 = 0x01;
pub(crate) const DELEGATION: u8 = 0x02;
pub(crate) const UNBONDING: u8 = 0x03;
pub(crate) const REDELEGATION: u8 = 0x04;
pub(crate) const VALIDATOR_QUEUE: u8 = 0x05;
pub(crate) const HISTORICAL_INFO: u8 = 0x06;
pub(crate) const LAST_POWER: u8 = 0x11;
pub(crate) const BY_CONS_ADDR: u8 = 0x12;
pub(crate) const UNBONDING_QUEUE: u8 = 0x13;
pub(crate) const REDELEGATION_QUEUE: u8 = 0x14;
pub(crate) const REDELEGATION_BY_DST: u8 = 0x15;
const LAST_TOTAL_POWER: &[u8] = &[0x16];

const A: usize = ADDRESS_SIZE;

fn addr_at<T>(bytes: &[u8], offset: usize, f: impl Fn(&[u8]) -> nmx_crypto::Result<T>) -> Result<T> {
    let part = bytes
        .get(offset..offset + A)
        .ok_or_else(|| NmxError::StoreError(format!("staking key too short: {}", hex::encode(bytes))))?;
    Ok(f(part)?)
}

fn time_at(bytes: &[u8], offset: usize) -> Result<Timestamp> {
    let mut raw = [0u8; 8];
    let part = bytes
        .get(offset..offset + 8)
        .ok_or_else(|| NmxError::StoreError("queue key too short".into()))?;
    raw.copy_from_slice(part);
    Ok(Timestamp::from_key_bytes(raw))
}

// validators

pub(crate) fn get_validator(ctx: &mut Context<'_>, addr: &ValAddress) -> Result<Option<Validator>> {
    ctx.kv(names::STAKING).get(&key(VALIDATOR, &[addr.as_bytes()]))
}

/// Writes the validator and its consensus-address index
pub(crate) fn set_validator(ctx: &mut Context<'_>, validator: &Validator) -> Result<()> {
    let mut store = ctx.kv(names::STAKING);
    store.set(&key(VALIDATOR, &[validator.operator_address.as_bytes()]), validator)?;
    store.set(
        &key(BY_CONS_ADDR, &[validator.cons_address().as_bytes()]),
        &validator.operator_address,
    )
}

pub(crate) fn remove_validator(ctx: &mut Context<'_>, validator: &Validator) -> Result<()> {
    let mut store = ctx.kv(names::STAKING);
    store.delete(&key(VALIDATOR, &[validator.operator_address.as_bytes()]))?;
    store.delete(&key(BY_CONS_ADDR, &[validator.cons_address().as_bytes()]))
}

pub(crate) fn get_validator_by_cons(ctx: &mut Context<'_>, cons: &ConsAddress) -> Result<Option<Validator>> {
    let operator: Option<ValAddress> = ctx.kv(names::STAKING).get(&key(BY_CONS_ADDR, &[cons.as_bytes()]))?;
    match operator {
        Some(addr) => get_validator(ctx, &addr),
        None => Ok(None),
    }
}

pub(crate) fn has_cons_address(ctx: &mut Context<'_>, cons: &ConsAddress) -> Result<bool> {
    ctx.kv(names::STAKING).has(&key(BY_CONS_ADDR, &[cons.as_bytes()]))
}

/// Every validator in operator-address order
pub(crate) fn all_validators(ctx: &mut Context<'_>) -> Result<Vec<Validator>> {
    ctx.kv(names::STAKING).values(&[VALIDATOR])
}

// delegations

fn delegation_key(del: &AccAddress, val: &ValAddress) -> Vec<u8> {
    key(DELEGATION, &[del.as_bytes(), val.as_bytes()])
}

pub(crate) fn get_delegation(ctx: &mut Context<'_>, del: &AccAddress, val: &ValAddress) -> Result<Option<Delegation>> {
    ctx.kv(names::STAKING).get(&delegation_key(del, val))
}

pub(crate) fn set_delegation(ctx: &mut Context<'_>, delegation: &Delegation) -> Result<()> {
    ctx.kv(names::STAKING).set(
        &delegation_key(&delegation.delegator_address, &delegation.validator_address),
        delegation,
    )
}

pub(crate) fn remove_delegation(ctx: &mut Context<'_>, del: &AccAddress, val: &ValAddress) -> Result<()> {
    ctx.kv(names::STAKING).delete(&delegation_key(del, val))
}

pub(crate) fn delegator_delegations(ctx: &mut Context<'_>, del: &AccAddress) -> Result<Vec<Delegation>> {
    ctx.kv(names::STAKING).values(&key(DELEGATION, &[del.as_bytes()]))
}

pub(crate) fn all_delegations(ctx: &mut Context<'_>) -> Result<Vec<Delegation>> {
    ctx.kv(names::STAKING).values(&[DELEGATION])
}

pub(crate) fn validator_delegations(ctx: &mut Context<'_>, val: &ValAddress) -> Result<Vec<Delegation>> {
    Ok(all_delegations(ctx)?
        .into_iter()
        .filter(|d| d.validator_address == *val)
        .collect())
}

// unbonding delegations

fn unbonding_key(del: &AccAddress, val: &ValAddress) -> Vec<u8> {
    key(UNBONDING, &[del.as_bytes(), val.as_bytes()])
}

pub(crate) fn get_unbonding(ctx: &mut Context<'_>, del: &AccAddress, val: &ValAddress) -> Result<Option<UnbondingDelegation>> {
    ctx.kv(names::STAKING).get(&unbonding_key(del, val))
}

pub(crate) fn set_unbonding(ctx: &mut Context<'_>, ubd: &UnbondingDelegation) -> Result<()> {
    ctx.kv(names::STAKING)
        .set(&unbonding_key(&ubd.delegator_address, &ubd.validator_address), ubd)
}

pub(crate) fn remove_unbonding(ctx: &mut Context<'_>, del: &AccAddress, val: &ValAddress) -> Result<()> {
    ctx.kv(names::STAKING).delete(&unbonding_key(del, val))
}

pub(crate) fn all_unbondings(ctx: &mut Context<'_>) -> Result<Vec<UnbondingDelegation>> {
    ctx.kv(names::STAKING).values(&[UNBONDING])
}

pub(crate) fn delegator_unbondings(ctx: &mut Context<'_>, del: &AccAddress) -> Result<Vec<UnbondingDelegation>> {
    ctx.kv(names::STAKING).values(&key(UNBONDING, &[del.as_bytes()]))
}

pub(crate) fn validator_unbondings(ctx: &mut Context<'_>, val: &ValAddress) -> Result<Vec<UnbondingDelegation>> {
    Ok(all_unbondings(ctx)?
        .into_iter()
        .filter(|u| u.validator_address == *val)
        .collect())
}

// redelegations

fn redelegation_key(del: &AccAddress, src: &ValAddress, dst: &ValAddress) -> Vec<u8> {
    key(REDELEGATION, &[del.as_bytes(), src.as_bytes(), dst.as_bytes()])
}

fn redelegation_by_dst_key(del: &AccAddress, dst: &ValAddress, src: &ValAddress) -> Vec<u8> {
    key(REDELEGATION_BY_DST, &[del.as_bytes(), dst.as_bytes(), src.as_bytes()])
}

pub(crate) fn get_redelegation(
    ctx: &mut Context<'_>,
    del: &AccAddress,
    src: &ValAddress,
    dst: &ValAddress,
) -> Result<Option<Redelegation>> {
    ctx.kv(names::STAKING).get(&redelegation_key(del, src, dst))
}

/// Writes the record and its destination index
pub(crate) fn set_redelegation(ctx: &mut Context<'_>, red: &Redelegation) -> Result<()> {
    let mut store = ctx.kv(names::STAKING);
    store.set(
        &redelegation_key(&red.delegator_address, &red.validator_src_address, &red.validator_dst_address),
        red,
    )?;
    store.set_raw(
        &redelegation_by_dst_key(&red.delegator_address, &red.validator_dst_address, &red.validator_src_address),
        Vec::new(),
    )
}

pub(crate) fn remove_redelegation(ctx: &mut Context<'_>, red: &Redelegation) -> Result<()> {
    let mut store = ctx.kv(names::STAKING);
    store.delete(&redelegation_key(
        &red.delegator_address,
        &red.validator_src_address,
        &red.validator_dst_address,
    ))?;
    store.delete(&redelegation_by_dst_key(
        &red.delegator_address,
        &red.validator_dst_address,
        &red.validator_src_address,
    ))
}

pub(crate) fn all_redelegations(ctx: &mut Context<'_>) -> Result<Vec<Redelegation>> {
    ctx.kv(names::STAKING).values(&[REDELEGATION])
}

/// Redelegations of `del` that landed on `dst`
pub(crate) fn redelegations_into(ctx: &mut Context<'_>, del: &AccAddress, dst: &ValAddress) -> Result<Vec<Redelegation>> {
    let prefix = key(REDELEGATION_BY_DST, &[del.as_bytes(), dst.as_bytes()]);
    let keys = ctx.kv(names::STAKING).iter_raw(&prefix)?;
    let mut out = Vec::with_capacity(keys.len());
    for (k, _) in keys {
        let src = addr_at(&k, prefix.len(), ValAddress::from_slice)?;
        if let Some(red) = get_redelegation(ctx, del, &src, dst)? {
            out.push(red);
        }
    }
    Ok(out)
}

pub(crate) fn validator_redelegations_from(ctx: &mut Context<'_>, src: &ValAddress) -> Result<Vec<Redelegation>> {
    Ok(all_redelegations(ctx)?
        .into_iter()
        .filter(|r| r.validator_src_address == *src)
        .collect())
}

// queues

pub(crate) fn insert_validator_queue(ctx: &mut Context<'_>, time: Timestamp, val: &ValAddress) -> Result<()> {
    ctx.kv(names::STAKING)
        .set_raw(&key(VALIDATOR_QUEUE, &[&time.to_key_bytes(), val.as_bytes()]), Vec::new())
}

pub(crate) fn remove_validator_queue(ctx: &mut Context<'_>, time: Timestamp, val: &ValAddress) -> Result<()> {
    ctx.kv(names::STAKING)
        .delete(&key(VALIDATOR_QUEUE, &[&time.to_key_bytes(), val.as_bytes()]))
}

/// Validators whose unbonding time is at or before `now`, removing their queue keys
pub(crate) fn take_mature_validators(ctx: &mut Context<'_>, now: Timestamp) -> Result<Vec<ValAddress>> {
    let entries = ctx.kv(names::STAKING).iter_raw(&[VALIDATOR_QUEUE])?;
    let mut out = Vec::new();
    for (k, _) in entries {
        if time_at(&k, 1)? > now {
            break;
        }
        out.push(addr_at(&k, 9, ValAddress::from_slice)?);
        ctx.kv(names::STAKING).delete(&k)?;
    }
    Ok(out)
}

pub(crate) fn insert_unbonding_queue(ctx: &mut Context<'_>, time: Timestamp, del: &AccAddress, val: &ValAddress) -> Result<()> {
    ctx.kv(names::STAKING).set_raw(
        &key(UNBONDING_QUEUE, &[&time.to_key_bytes(), del.as_bytes(), val.as_bytes()]),
        Vec::new(),
    )
}

/// (delegator, validator) pairs with an entry due at or before `now`
pub(crate) fn take_mature_unbondings(ctx: &mut Context<'_>, now: Timestamp) -> Result<Vec<(AccAddress, ValAddress)>> {
    let entries = ctx.kv(names::STAKING).iter_raw(&[UNBONDING_QUEUE])?;
    let mut out: Vec<(AccAddress, ValAddress)> = Vec::new();
    for (k, _) in entries {
        if time_at(&k, 1)? > now {
            break;
        }
        let pair = (
            addr_at(&k, 9, AccAddress::from_slice)?,
            addr_at(&k, 9 + A, ValAddress::from_slice)?,
        );
        if !out.contains(&pair) {
            out.push(pair);
        }
        ctx.kv(names::STAKING).delete(&k)?;
    }
    Ok(out)
}

pub(crate) fn insert_redelegation_queue(
    ctx: &mut Context<'_>,
    time: Timestamp,
    del: &AccAddress,
    src: &ValAddress,
    dst: &ValAddress,
) -> Result<()> {
    ctx.kv(names::STAKING).set_raw(
        &key(
            REDELEGATION_QUEUE,
            &[&time.to_key_bytes(), del.as_bytes(), src.as_bytes(), dst.as_bytes()],
        ),
        Vec::new(),
    )
}

/// (delegator, source, destination) triples with an entry due at or before `now`
pub(crate) fn take_mature_redelegations(
    ctx: &mut Context<'_>,
    now: Timestamp,
) -> Result<Vec<(AccAddress, ValAddress, ValAddress)>> {
    let entries = ctx.kv(names::STAKING).iter_raw(&[REDELEGATION_QUEUE])?;
    let mut out: Vec<(AccAddress, ValAddress, ValAddress)> = Vec::new();
    for (k, _) in entries {
        if time_at(&k, 1)? > now {
            break;
        }
        let triple = (
            addr_at(&k, 9, AccAddress::from_slice)?,
            addr_at(&k, 9 + A, ValAddress::from_slice)?,
            addr_at(&k, 9 + 2 * A, ValAddress::from_slice)?,
        );
        if !out.contains(&triple) {
            out.push(triple);
        }
        ctx.kv(names::STAKING).delete(&k)?;
    }
    Ok(out)
}

// last powers

pub(crate) fn get_last_power(ctx: &mut Context<'_>, val: &ValAddress) -> Result<i64> {
    Ok(ctx
        .kv(names::STAKING)
        .get(&key(LAST_POWER, &[val.as_bytes()]))?
        .unwrap_or(0))
}

pub(crate) fn set_last_power(ctx: &mut Context<'_>, val: &ValAddress, power: i64) -> Result<()> {
    ctx.kv(names::STAKING).set(&key(LAST_POWER, &[val.as_bytes()]), &power)
}

pub(crate) fn remove_last_power(ctx: &mut Context<'_>, val: &ValAddress) -> Result<()> {
    ctx.kv(names::STAKING).delete(&key(LAST_POWER, &[val.as_bytes()]))
}

/// Last reported powers in operator-address order
pub(crate) fn all_last_powers(ctx: &mut Context<'_>) -> Result<Vec<(ValAddress, i64)>> {
    let entries = ctx.kv(names::STAKING).iter::<i64>(&[LAST_POWER])?;
    entries
        .into_iter()
        .map(|(k, power)| Ok((addr_at(&k, 1, ValAddress::from_slice)?, power)))
        .collect()
}

pub(crate) fn get_last_total_power(ctx: &mut Context<'_>) -> Result<i64> {
    Ok(ctx.kv(names::STAKING).get(LAST_TOTAL_POWER)?.unwrap_or(0))
}

pub(crate) fn set_last_total_power(ctx: &mut Context<'_>, power: i64) -> Result<()> {
    ctx.kv(names::STAKING).set(LAST_TOTAL_POWER, &power)
}

// historical info

pub(crate) fn get_historical_info(ctx: &mut Context<'_>, height: u64) -> Result<Option<HistoricalInfo>> {
    ctx.kv(names::STAKING)
        .get(&key(HISTORICAL_INFO, &[&height.to_be_bytes()]))
}

pub(crate) fn set_historical_info(ctx: &mut Context<'_>, info: &HistoricalInfo) -> Result<()> {
    ctx.kv(names::STAKING)
        .set(&key(HISTORICAL_INFO, &[&info.height.to_be_bytes()]), info)
}

pub(crate) fn remove_historical_info(ctx: &mut Context<'_>, height: u64) -> Result<()> {
    ctx.kv(names::STAKING)
        .delete(&key(HISTORICAL_INFO, &[&height.to_be_bytes()]))
}

pub(crate) fn all_historical_info(ctx: &mut Context<'_>) -> Result<Vec<HistoricalInfo>> {
    ctx.kv(names::STAKING).values(&[HISTORICAL_INFO])
}
