// src/modules/neuropos/mod.rs

//! NeuroPoS reputation engine and neural-network registry.
//!
//! Staking decides who validates; this module decides how well they are
//! doing. It keeps a reputation per validator fed by block production,
//! predictions and slash feedback, a registry of network descriptors with
//! versioned weights, and the anomaly reports that can turn into slashes.

pub mod anomaly;
pub mod genesis;
pub mod invariants;
pub mod keeper;
pub mod msgs;
pub mod network;
pub mod params;
pub mod reputation;
pub(crate) mod store;
pub mod types;

pub use genesis::NeuroPoSGenesis;
pub use keeper::NeuroPoSKeeper;
pub use msgs::{
    MsgCreateNeuralNetwork, MsgReportAnomaly, MsgSubmitNeuralPrediction, MsgTrainNeuralNetwork,
    MsgUpdateNeuralNetwork,
};
pub use params::{NeuroPoSParam, NeuroPoSParams};
pub use reputation::ReputationHooks;
pub use types::*;

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::crisis::InvariantRegistry;
use crate::modules::{msg_result, query_params, query_result, AppModule};
use crate::store::names;
use crate::tx::Msg;
use nmx_crypto::ValAddress;
use serde::Deserialize;

#[derive(Deserialize)]
struct ValidatorQuery {
    validator: ValAddress,
}

#[derive(Deserialize)]
struct IdQuery {
    id: String,
}

#[derive(Deserialize)]
struct WeightsQuery {
    network_id: String,
    #[serde(default)]
    version: u64,
}

#[derive(Deserialize, Default)]
struct HeightQuery {
    #[serde(default)]
    height: u64,
}

/// NeuroPoS module
#[derive(Debug, Clone)]
pub struct NeuroPoSModule {
    keeper: NeuroPoSKeeper,
}

impl NeuroPoSModule {
    /// Wraps a keeper
    pub fn new(keeper: NeuroPoSKeeper) -> Self {
        Self { keeper }
    }

    /// Keeper
    pub fn keeper(&self) -> &NeuroPoSKeeper {
        &self.keeper
    }
}

impl AppModule for NeuroPoSModule {
    fn name(&self) -> &'static str {
        names::NEUROPOS
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        genesis::validate_genesis(&state.neuropos)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.keeper.init_genesis(ctx, &state.neuropos)
    }

    fn export_genesis(&self, ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.neuropos = self.keeper.export_genesis(ctx)?;
        Ok(())
    }

    fn begin_block(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.keeper.begin_block(ctx)
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        invariants::register(registry);
    }

    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        match msg {
            Msg::CreateNeuralNetwork(m) => msg_result(&self.keeper.create_network(ctx, m)?.id),
            Msg::UpdateNeuralNetwork(m) => msg_result(&self.keeper.update_network(ctx, m)?),
            Msg::TrainNeuralNetwork(m) => msg_result(&self.keeper.train_network(ctx, m)?),
            Msg::SubmitNeuralPrediction(m) => msg_result(&self.keeper.submit_prediction(ctx, m)?),
            Msg::ReportAnomaly(m) => msg_result(&self.keeper.report_anomaly(ctx, m)?),
            other => Err(NmxError::UnknownRequest(format!("neuropos cannot handle {}", other.type_name()))),
        }
    }

    fn query(&self, ctx: &mut Context<'_>, endpoint: &str, data: &[u8]) -> Result<Vec<u8>> {
        match endpoint {
            "reputation" => {
                let q: ValidatorQuery = query_params(data)?;
                query_result(&self.keeper.reputation(ctx, &q.validator)?)
            }
            "performance" => {
                let q: ValidatorQuery = query_params(data)?;
                query_result(&self.keeper.performance(ctx, &q.validator)?)
            }
            "network" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.network(ctx, &q.id)?)
            }
            "networks" => query_result(&self.keeper.networks(ctx)?),
            "weights" => {
                let q: WeightsQuery = query_params(data)?;
                query_result(&self.keeper.weights(ctx, &q.network_id, q.version)?)
            }
            "prediction" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.prediction(ctx, &q.id)?)
            }
            "training-data" => {
                let q: IdQuery = query_params(data)?;
                query_result(&self.keeper.training_data(ctx, &q.id)?)
            }
            "anomalies" => query_result(&self.keeper.anomaly_reports(ctx)?),
            "network-state" => {
                let q: HeightQuery = if data.is_empty() { HeightQuery::default() } else { query_params(data)? };
                query_result(&self.keeper.network_state(ctx, q.height)?)
            }
            "params" => query_result(&self.keeper.params(ctx)?),
            _ => Err(NmxError::UnknownRequest(format!("neuropos/{}", endpoint))),
        }
    }
}
