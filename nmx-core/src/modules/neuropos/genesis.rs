// src/modules/neuropos/genesis.rs

//! NeuroPoS genesis import and export.

use super::keeper::NeuroPoSKeeper;
use super::params::NeuroPoSParams;
use super::store;
use super::types::{
    AnomalyReport, NetworkState, NeuralNetwork, NeuralNetworkWeights, NeuralPrediction, TrainingData,
    ValidatorPerformance, ValidatorReputation, MAX_REPUTATION_HISTORY,
};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::modules::params::{ParamSet, ParamsKeeper};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// NeuroPoS genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuroPoSGenesis {
    /// Parameters
    #[serde(default)]
    pub params: NeuroPoSParams,
    /// Networks
    #[serde(default)]
    pub networks: Vec<NeuralNetwork>,
    /// Every weights version
    #[serde(default)]
    pub weights: Vec<NeuralNetworkWeights>,
    /// Training data
    #[serde(default)]
    pub training_data: Vec<TrainingData>,
    /// Predictions
    #[serde(default)]
    pub predictions: Vec<NeuralPrediction>,
    /// Reputation records
    #[serde(default)]
    pub reputations: Vec<ValidatorReputation>,
    /// Performance records
    #[serde(default)]
    pub performances: Vec<ValidatorPerformance>,
    /// Anomaly reports
    #[serde(default)]
    pub anomaly_reports: Vec<AnomalyReport>,
    /// Network-state snapshots
    #[serde(default)]
    pub network_states: Vec<NetworkState>,
}

impl NeuroPoSKeeper {
    /// Writes the NeuroPoS genesis section
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &NeuroPoSGenesis) -> Result<()> {
        ParamsKeeper.set(ctx, &genesis.params)?;
        for network in &genesis.networks {
            store::set_network(ctx, network)?;
        }
        for weights in &genesis.weights {
            store::set_weights(ctx, weights)?;
        }
        for data in &genesis.training_data {
            store::set_training_data(ctx, data)?;
        }
        for prediction in &genesis.predictions {
            store::set_prediction(ctx, prediction)?;
        }
        for reputation in &genesis.reputations {
            store::set_reputation(ctx, reputation)?;
        }
        for performance in &genesis.performances {
            store::set_performance(ctx, performance)?;
        }
        for report in &genesis.anomaly_reports {
            store::set_anomaly_report(ctx, report)?;
        }
        for state in &genesis.network_states {
            store::set_network_state(ctx, state)?;
        }
        Ok(())
    }

    /// Reads the NeuroPoS genesis section
    pub fn export_genesis(&self, ctx: &mut Context<'_>) -> Result<NeuroPoSGenesis> {
        Ok(NeuroPoSGenesis {
            params: self.params(ctx)?,
            networks: store::all_networks(ctx)?,
            weights: store::all_weights(ctx)?,
            training_data: store::all_training_data(ctx)?,
            predictions: store::all_predictions(ctx)?,
            reputations: store::all_reputations(ctx)?,
            performances: store::all_performances(ctx)?,
            anomaly_reports: store::all_anomaly_reports(ctx)?,
            network_states: store::all_network_states(ctx)?,
        })
    }
}

fn unique<T: Ord>(seen: &mut BTreeSet<T>, item: T, what: impl FnOnce() -> String) -> Result<()> {
    if !seen.insert(item) {
        return Err(NmxError::InvalidState(format!("duplicate {}", what())));
    }
    Ok(())
}

/// Stateless check of a NeuroPoS genesis section
pub fn validate_genesis(genesis: &NeuroPoSGenesis) -> Result<()> {
    genesis.params.validate()?;

    let mut networks = BTreeSet::new();
    for network in &genesis.networks {
        unique(&mut networks, network.id.as_str(), || format!("network {}", network.id))?;
        network.validate()?;
    }
    let mut versions = BTreeSet::new();
    for weights in &genesis.weights {
        if !networks.contains(weights.network_id.as_str()) {
            return Err(NmxError::InvalidState(format!(
                "weights for unknown network {}",
                weights.network_id
            )));
        }
        if weights.weights.is_empty() || weights.version == 0 {
            return Err(NmxError::InvalidState(format!(
                "weights version {} of {} is empty or unnumbered",
                weights.version, weights.network_id
            )));
        }
        unique(&mut versions, (weights.network_id.as_str(), weights.version), || {
            format!("weights version {} of {}", weights.version, weights.network_id)
        })?;
    }
    for data in &genesis.training_data {
        if !networks.contains(data.network_id.as_str()) {
            return Err(NmxError::InvalidState(format!(
                "training data {} for unknown network {}",
                data.id, data.network_id
            )));
        }
    }
    for prediction in &genesis.predictions {
        if !prediction.confidence.is_unit() {
            return Err(NmxError::InvalidState(format!(
                "prediction {} has confidence {}",
                prediction.id, prediction.confidence
            )));
        }
    }

    let mut validators = BTreeSet::new();
    for reputation in &genesis.reputations {
        unique(&mut validators, reputation.validator, || {
            format!("reputation for {}", reputation.validator)
        })?;
        if !reputation.reputation.is_unit() {
            return Err(NmxError::InvalidState(format!(
                "reputation of {} is {}",
                reputation.validator, reputation.reputation
            )));
        }
        if reputation.history.len() > MAX_REPUTATION_HISTORY {
            return Err(NmxError::InvalidState(format!(
                "reputation history of {} holds {} entries",
                reputation.validator,
                reputation.history.len()
            )));
        }
    }
    let mut performers = BTreeSet::new();
    for performance in &genesis.performances {
        unique(&mut performers, performance.validator, || {
            format!("performance for {}", performance.validator)
        })?;
        if !performance.performance_score.is_unit() {
            return Err(NmxError::InvalidState(format!(
                "performance score of {} is {}",
                performance.validator, performance.performance_score
            )));
        }
    }
    let mut reports = BTreeSet::new();
    for report in &genesis.anomaly_reports {
        unique(&mut reports, report.id, || format!("anomaly report {}", report.id))?;
        if !report.confidence.is_unit() {
            return Err(NmxError::InvalidState(format!(
                "anomaly report {} has confidence {}",
                report.id, report.confidence
            )));
        }
    }
    Ok(())
}
