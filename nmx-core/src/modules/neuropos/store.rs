// src/modules/neuropos/store.rs

//! Key layout of the neuropos subtree.
//!
//! String ids are length-prefixed inside composite keys, so one network's
//! weights never share a prefix with another's.

use super::types::{
    AnomalyReport, NetworkState, NeuralNetwork, NeuralNetworkWeights, NeuralPrediction, TrainingData,
    ValidatorPerformance, ValidatorReputation,
};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::store::{id_key, key, names, push_length_prefixed};
use nmx_crypto::{ValAddress, ADDRESS_SIZE};

pub(crate) const NETWORK: u8 = 0x07;
pub(crate) const WEIGHTS: u8 = 0x08;
pub(crate) const TRAINING_DATA: u8 = 0x09;
pub(crate) const PREDICTION: u8 = 0x0A;
pub(crate) const PERFORMANCE: u8 = 0x0B;
pub(crate) const REPUTATION: u8 = 0x0C;
pub(crate) const ANOMALY_REPORT: u8 = 0x31;
pub(crate) const PREDICTION_BY_VALIDATOR: u8 = 0x32;
pub(crate) const ANOMALY_QUEUE: u8 = 0x33;
pub(crate) const NETWORK_STATE: u8 = 0x40;

fn nested_key(family: u8, outer: &str, inner: &[u8]) -> Vec<u8> {
    let mut out = vec![family];
    push_length_prefixed(&mut out, outer.as_bytes());
    out.extend_from_slice(inner);
    out
}

// networks

pub(crate) fn get_network(ctx: &mut Context<'_>, id: &str) -> Result<Option<NeuralNetwork>> {
    ctx.kv(names::NEUROPOS).get(&id_key(NETWORK, id))
}

pub(crate) fn set_network(ctx: &mut Context<'_>, network: &NeuralNetwork) -> Result<()> {
    ctx.kv(names::NEUROPOS).set(&id_key(NETWORK, &network.id), network)
}

pub(crate) fn all_networks(ctx: &mut Context<'_>) -> Result<Vec<NeuralNetwork>> {
    ctx.kv(names::NEUROPOS).values(&[NETWORK])
}

// weights

pub(crate) fn set_weights(ctx: &mut Context<'_>, weights: &NeuralNetworkWeights) -> Result<()> {
    ctx.kv(names::NEUROPOS).set(
        &nested_key(WEIGHTS, &weights.network_id, &weights.version.to_be_bytes()),
        weights,
    )
}

pub(crate) fn get_weights(ctx: &mut Context<'_>, network_id: &str, version: u64) -> Result<Option<NeuralNetworkWeights>> {
    ctx.kv(names::NEUROPOS)
        .get(&nested_key(WEIGHTS, network_id, &version.to_be_bytes()))
}

/// Highest version, found by reverse prefix iteration
pub(crate) fn latest_weights(ctx: &mut Context<'_>, network_id: &str) -> Result<Option<NeuralNetworkWeights>> {
    let prefix = nested_key(WEIGHTS, network_id, &[]);
    Ok(ctx
        .kv(names::NEUROPOS)
        .iter_rev::<NeuralNetworkWeights>(&prefix)?
        .into_iter()
        .next()
        .map(|(_, w)| w))
}

pub(crate) fn all_weights(ctx: &mut Context<'_>) -> Result<Vec<NeuralNetworkWeights>> {
    ctx.kv(names::NEUROPOS).values(&[WEIGHTS])
}

// training data

pub(crate) fn set_training_data(ctx: &mut Context<'_>, data: &TrainingData) -> Result<()> {
    let mut id = Vec::new();
    push_length_prefixed(&mut id, data.id.as_bytes());
    ctx.kv(names::NEUROPOS)
        .set(&nested_key(TRAINING_DATA, &data.network_id, &id), data)
}

pub(crate) fn network_training_data(ctx: &mut Context<'_>, network_id: &str) -> Result<Vec<TrainingData>> {
    ctx.kv(names::NEUROPOS)
        .values(&nested_key(TRAINING_DATA, network_id, &[]))
}

pub(crate) fn has_training_data(ctx: &mut Context<'_>, network_id: &str) -> Result<bool> {
    Ok(!ctx
        .kv(names::NEUROPOS)
        .iter_raw(&nested_key(TRAINING_DATA, network_id, &[]))?
        .is_empty())
}

pub(crate) fn all_training_data(ctx: &mut Context<'_>) -> Result<Vec<TrainingData>> {
    ctx.kv(names::NEUROPOS).values(&[TRAINING_DATA])
}

// predictions and their per-validator index

fn prediction_index_key(prediction: &NeuralPrediction) -> Vec<u8> {
    let mut out = key(
        PREDICTION_BY_VALIDATOR,
        &[prediction.submitter.as_bytes(), &prediction.height.to_be_bytes()],
    );
    push_length_prefixed(&mut out, prediction.id.as_bytes());
    out
}

pub(crate) fn set_prediction(ctx: &mut Context<'_>, prediction: &NeuralPrediction) -> Result<()> {
    let mut store = ctx.kv(names::NEUROPOS);
    store.set(&id_key(PREDICTION, &prediction.id), prediction)?;
    store.set_raw(&prediction_index_key(prediction), Vec::new())
}

pub(crate) fn get_prediction(ctx: &mut Context<'_>, id: &str) -> Result<Option<NeuralPrediction>> {
    ctx.kv(names::NEUROPOS).get(&id_key(PREDICTION, id))
}

pub(crate) fn all_predictions(ctx: &mut Context<'_>) -> Result<Vec<NeuralPrediction>> {
    ctx.kv(names::NEUROPOS).values(&[PREDICTION])
}

/// Predictions submitted by `val` at a height above `after`, in height order
pub(crate) fn predictions_since(ctx: &mut Context<'_>, val: &ValAddress, after: u64) -> Result<Vec<NeuralPrediction>> {
    let header = 1 + ADDRESS_SIZE;
    let keys = ctx
        .kv(names::NEUROPOS)
        .iter_raw(&key(PREDICTION_BY_VALIDATOR, &[val.as_bytes()]))?;
    let mut out = Vec::new();
    for (k, _) in keys {
        let bad = || NmxError::StoreError(format!("bad prediction index key {}", hex::encode(&k)));
        let height_bytes = k.get(header..header + 8).ok_or_else(bad)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(height_bytes);
        if u64::from_be_bytes(raw) <= after {
            continue;
        }
        let id_bytes = k.get(header + 9..).ok_or_else(bad)?;
        let id = std::str::from_utf8(id_bytes).map_err(|_| bad())?.to_string();
        if let Some(prediction) = get_prediction(ctx, &id)? {
            out.push(prediction);
        }
    }
    Ok(out)
}

// reputation and performance

pub(crate) fn get_reputation(ctx: &mut Context<'_>, val: &ValAddress) -> Result<Option<ValidatorReputation>> {
    ctx.kv(names::NEUROPOS).get(&key(REPUTATION, &[val.as_bytes()]))
}

pub(crate) fn set_reputation(ctx: &mut Context<'_>, reputation: &ValidatorReputation) -> Result<()> {
    ctx.kv(names::NEUROPOS)
        .set(&key(REPUTATION, &[reputation.validator.as_bytes()]), reputation)
}

pub(crate) fn all_reputations(ctx: &mut Context<'_>) -> Result<Vec<ValidatorReputation>> {
    ctx.kv(names::NEUROPOS).values(&[REPUTATION])
}

pub(crate) fn get_performance(ctx: &mut Context<'_>, val: &ValAddress) -> Result<Option<ValidatorPerformance>> {
    ctx.kv(names::NEUROPOS).get(&key(PERFORMANCE, &[val.as_bytes()]))
}

pub(crate) fn set_performance(ctx: &mut Context<'_>, performance: &ValidatorPerformance) -> Result<()> {
    ctx.kv(names::NEUROPOS)
        .set(&key(PERFORMANCE, &[performance.validator.as_bytes()]), performance)
}

pub(crate) fn all_performances(ctx: &mut Context<'_>) -> Result<Vec<ValidatorPerformance>> {
    ctx.kv(names::NEUROPOS).values(&[PERFORMANCE])
}

// anomaly reports

fn anomaly_queue_key(height: u64, id: u64) -> Vec<u8> {
    key(ANOMALY_QUEUE, &[&height.to_be_bytes(), &id.to_be_bytes()])
}

/// Writes the report; unprocessed reports are also queued under their height
pub(crate) fn set_anomaly_report(ctx: &mut Context<'_>, report: &AnomalyReport) -> Result<()> {
    let mut store = ctx.kv(names::NEUROPOS);
    store.set(&key(ANOMALY_REPORT, &[&report.id.to_be_bytes()]), report)?;
    let queued = anomaly_queue_key(report.height, report.id);
    if report.processed {
        store.delete(&queued)
    } else {
        store.set_raw(&queued, Vec::new())
    }
}

pub(crate) fn get_anomaly_report(ctx: &mut Context<'_>, id: u64) -> Result<Option<AnomalyReport>> {
    ctx.kv(names::NEUROPOS)
        .get(&key(ANOMALY_REPORT, &[&id.to_be_bytes()]))
}

/// Ids of unprocessed reports submitted before `height`, in (height, id) order
pub(crate) fn due_anomaly_ids(ctx: &mut Context<'_>, height: u64) -> Result<Vec<u64>> {
    let keys = ctx.kv(names::NEUROPOS).iter_raw(&[ANOMALY_QUEUE])?;
    let mut out = Vec::new();
    for (k, _) in keys {
        let bad = || NmxError::StoreError(format!("bad anomaly queue key {}", hex::encode(&k)));
        let mut raw = [0u8; 8];
        raw.copy_from_slice(k.get(1..9).ok_or_else(bad)?);
        if u64::from_be_bytes(raw) >= height {
            break;
        }
        raw.copy_from_slice(k.get(9..17).ok_or_else(bad)?);
        out.push(u64::from_be_bytes(raw));
    }
    Ok(out)
}

/// Id following the highest stored report
pub(crate) fn next_anomaly_id(ctx: &mut Context<'_>) -> Result<u64> {
    Ok(ctx
        .kv(names::NEUROPOS)
        .iter_rev::<AnomalyReport>(&[ANOMALY_REPORT])?
        .into_iter()
        .next()
        .map(|(_, r)| r.id + 1)
        .unwrap_or(1))
}

pub(crate) fn all_anomaly_reports(ctx: &mut Context<'_>) -> Result<Vec<AnomalyReport>> {
    ctx.kv(names::NEUROPOS).values(&[ANOMALY_REPORT])
}

// network state

pub(crate) fn set_network_state(ctx: &mut Context<'_>, state: &NetworkState) -> Result<()> {
    ctx.kv(names::NEUROPOS)
        .set(&key(NETWORK_STATE, &[&state.height.to_be_bytes()]), state)
}

pub(crate) fn get_network_state(ctx: &mut Context<'_>, height: u64) -> Result<Option<NetworkState>> {
    ctx.kv(names::NEUROPOS)
        .get(&key(NETWORK_STATE, &[&height.to_be_bytes()]))
}

pub(crate) fn latest_network_state(ctx: &mut Context<'_>) -> Result<Option<NetworkState>> {
    Ok(ctx
        .kv(names::NEUROPOS)
        .iter_rev::<NetworkState>(&[NETWORK_STATE])?
        .into_iter()
        .next()
        .map(|(_, s)| s))
}

pub(crate) fn all_network_states(ctx: &mut Context<'_>) -> Result<Vec<NetworkState>> {
    ctx.kv(names::NEUROPOS).values(&[NETWORK_STATE])
}

/// Deletes snapshots below `min_height`
pub(crate) fn prune_network_states(ctx: &mut Context<'_>, min_height: u64) -> Result<()> {
    let mut store = ctx.kv(names::NEUROPOS);
    for (k, state) in store.iter::<NetworkState>(&[NETWORK_STATE])? {
        if state.height >= min_height {
            break;
        }
        store.delete(&k)?;
    }
    Ok(())
}
