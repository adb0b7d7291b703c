// src/modules/neuropos/network.rs

//! Neural-network registry.
//!
//! Networks are descriptors plus versioned weights. Nothing here runs a
//! model; training is recorded and its outcome checkpointed by a fixed
//! improvement step in the following block.

use super::keeper::NeuroPoSKeeper;
use super::msgs::{MsgCreateNeuralNetwork, MsgSubmitNeuralPrediction, MsgTrainNeuralNetwork, MsgUpdateNeuralNetwork};
use super::store;
use super::types::{
    Architecture, Layer, NetworkStatus, NeuralNetwork, NeuralNetworkWeights, NeuralPrediction, TrainingData,
};
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::events::{types, Event};
use crate::math::Dec;
use crate::time::Timestamp;
use nmx_crypto::AccAddress;
use tracing::{debug, info};

/// Accuracy reached by a completed training run, at least
pub fn trained_accuracy() -> Dec {
    Dec::percent(85)
}

/// Loss reached by a completed training run, at most
pub fn trained_loss() -> Dec {
    Dec::percent(15)
}

/// Accuracy gained and loss shed per refinement step
pub fn refinement_step() -> Dec {
    Dec::percent(1)
}

/// Zero-initialised weights blob describing each layer
fn initial_weights(layers: &[Layer]) -> Result<Vec<u8>> {
    let described: Vec<serde_json::Value> = layers
        .iter()
        .map(|l| {
            serde_json::json!({
                "layer_type": l.layer_type,
                "input_size": l.input_size,
                "output_size": l.output_size,
                "init": "zeros",
            })
        })
        .collect();
    Ok(serde_json::to_vec(&described)?)
}

fn owned_network(ctx: &mut Context<'_>, id: &str, owner: &AccAddress) -> Result<NeuralNetwork> {
    let network = store::get_network(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("neural network {}", id)))?;
    if network.owner != *owner {
        return Err(NmxError::Unauthorized(format!("{} does not own network {}", owner, id)));
    }
    Ok(network)
}

impl NeuroPoSKeeper {
    /// Network by id
    pub fn network(&self, ctx: &mut Context<'_>, id: &str) -> Result<NeuralNetwork> {
        store::get_network(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("neural network {}", id)))
    }

    /// Every network in id order
    pub fn networks(&self, ctx: &mut Context<'_>) -> Result<Vec<NeuralNetwork>> {
        store::all_networks(ctx)
    }

    /// Weights of `network_id` at `version`; version 0 means the latest
    pub fn weights(&self, ctx: &mut Context<'_>, network_id: &str, version: u64) -> Result<NeuralNetworkWeights> {
        let weights = if version == 0 {
            store::latest_weights(ctx, network_id)?
        } else {
            store::get_weights(ctx, network_id, version)?
        };
        weights.ok_or_else(|| NmxError::NotFound(format!("weights {} of network {}", version, network_id)))
    }

    /// Training runs recorded for an existing network, in id order
    pub fn training_data(&self, ctx: &mut Context<'_>, network_id: &str) -> Result<Vec<TrainingData>> {
        self.network(ctx, network_id)?;
        store::network_training_data(ctx, network_id)
    }

    /// Prediction by id
    pub fn prediction(&self, ctx: &mut Context<'_>, id: &str) -> Result<NeuralPrediction> {
        store::get_prediction(ctx, id)?.ok_or_else(|| NmxError::NotFound(format!("prediction {}", id)))
    }

    /// Executes [`MsgCreateNeuralNetwork`]
    ///
    /// The network starts `active` with accuracy 0, loss 1 and zeroed
    /// weights as version 1.
    pub fn create_network(&self, ctx: &mut Context<'_>, msg: &MsgCreateNeuralNetwork) -> Result<NeuralNetwork> {
        let architecture: Architecture = msg.architecture.parse()?;
        let id = ctx.derive_id("nn");
        if store::get_network(ctx, &id)?.is_some() {
            return Err(NmxError::AlreadyExists(format!("neural network {}", id)));
        }
        let now = ctx.block_time();
        let network = NeuralNetwork {
            id: id.clone(),
            owner: msg.creator,
            architecture,
            layers: msg.layers.clone(),
            status: NetworkStatus::Active,
            accuracy: Dec::ZERO,
            loss: Dec::ONE,
            version: 1,
            created_time: now,
            last_updated_time: now,
            last_trained_time: Timestamp::EPOCH,
            last_trained_height: 0,
            metadata: msg.metadata.clone(),
        };
        network.validate()?;
        store::set_network(ctx, &network)?;
        store::set_weights(
            ctx,
            &NeuralNetworkWeights {
                network_id: id.clone(),
                version: 1,
                weights: initial_weights(&network.layers)?,
                updated_at: now,
            },
        )?;
        ctx.emit(
            Event::new(types::CREATE_NEURAL_NETWORK)
                .attr("network_id", &id)
                .attr("architecture", architecture)
                .attr("owner", msg.creator),
        );
        info!("created {} network {} for {}", architecture, id, msg.creator);
        Ok(network)
    }

    /// Executes [`MsgUpdateNeuralNetwork`]
    ///
    /// # Returns
    /// The new weights version
    pub fn update_network(&self, ctx: &mut Context<'_>, msg: &MsgUpdateNeuralNetwork) -> Result<u64> {
        let mut network = owned_network(ctx, &msg.network_id, &msg.owner)?;
        if network.status.is_busy() {
            return Err(NmxError::InvalidState(format!(
                "network {} is {:?}",
                network.id, network.status
            )));
        }
        if msg.weights.is_empty() {
            return Err(NmxError::InvalidMessage("weights are empty".into()));
        }
        let now = ctx.block_time();
        let version = store::latest_weights(ctx, &network.id)?
            .map(|w| w.version + 1)
            .unwrap_or(1);

        network.architecture = msg.architecture.parse()?;
        network.layers = msg.layers.clone();
        network.status = NetworkStatus::Active;
        network.version = version;
        network.last_updated_time = now;
        if let Some(metadata) = &msg.metadata {
            network.metadata = metadata.clone();
        }
        network.validate()?;
        store::set_network(ctx, &network)?;
        store::set_weights(
            ctx,
            &NeuralNetworkWeights {
                network_id: network.id.clone(),
                version,
                weights: msg.weights.clone(),
                updated_at: now,
            },
        )?;
        ctx.emit(
            Event::new(types::UPDATE_NEURAL_NETWORK)
                .attr("network_id", &network.id)
                .attr("version", version),
        );
        info!("network {} updated to weights version {}", network.id, version);
        Ok(version)
    }

    /// Executes [`MsgTrainNeuralNetwork`]
    ///
    /// Stores the training data and marks the network `training` until the
    /// next BeginBlock.
    ///
    /// # Returns
    /// Id of the training data
    pub fn train_network(&self, ctx: &mut Context<'_>, msg: &MsgTrainNeuralNetwork) -> Result<String> {
        let mut network = owned_network(ctx, &msg.network_id, &msg.owner)?;
        if network.status.is_busy() {
            return Err(NmxError::InvalidState(format!(
                "network {} is {:?}",
                network.id, network.status
            )));
        }
        if network.status == NetworkStatus::Inactive {
            return Err(NmxError::InvalidState(format!("network {} is inactive", network.id)));
        }
        let id = ctx.derive_id("td");
        let now = ctx.block_time();
        store::set_training_data(
            ctx,
            &TrainingData {
                id: id.clone(),
                network_id: network.id.clone(),
                features: msg.features.clone(),
                labels: msg.labels.clone(),
                epochs: msg.epochs,
                learning_rate: msg.learning_rate,
                created_at: now,
                metadata: msg.metadata.clone(),
            },
        )?;
        network.status = NetworkStatus::Training;
        network.last_trained_time = now;
        network.last_trained_height = ctx.height();
        store::set_network(ctx, &network)?;
        ctx.emit(
            Event::new(types::TRAIN_NEURAL_NETWORK)
                .attr("network_id", &network.id)
                .attr("training_data_id", &id)
                .attr("epochs", msg.epochs),
        );
        debug!("network {} training on {} for {} epochs", network.id, id, msg.epochs);
        Ok(id)
    }

    /// Executes [`MsgSubmitNeuralPrediction`]
    ///
    /// # Returns
    /// Id of the prediction
    pub fn submit_prediction(&self, ctx: &mut Context<'_>, msg: &MsgSubmitNeuralPrediction) -> Result<String> {
        self.staking.validator(ctx, &msg.validator_address)?;
        let network = self.network(ctx, &msg.network_id)?;
        if network.status != NetworkStatus::Active {
            return Err(NmxError::InvalidState(format!(
                "network {} is {:?}, predictions need an active network",
                network.id, network.status
            )));
        }
        if msg.validator_set.is_empty() {
            return Err(NmxError::InvalidMessage("prediction has an empty validator set".into()));
        }
        let id = ctx.derive_id("pred");
        let confidence = msg.confidence.clamp_unit();
        let prediction = NeuralPrediction {
            id: id.clone(),
            network_id: network.id,
            submitter: msg.validator_address,
            input: msg.input.clone(),
            output: msg.output.clone(),
            confidence,
            validator_set: msg.validator_set.clone(),
            height: ctx.height(),
            timestamp: ctx.block_time(),
            metadata: msg.metadata.clone(),
        };
        store::set_prediction(ctx, &prediction)?;
        ctx.emit(
            Event::new(types::NEURAL_PREDICTION)
                .attr("prediction_id", &id)
                .attr("validator", msg.validator_address)
                .attr("confidence", confidence),
        );
        Ok(id)
    }

    /// Completes training requested before this block
    pub fn complete_training(&self, ctx: &mut Context<'_>) -> Result<()> {
        let height = ctx.height();
        let now = ctx.block_time();
        for mut network in store::all_networks(ctx)? {
            if network.status != NetworkStatus::Training || network.last_trained_height >= height {
                continue;
            }
            network.accuracy = network.accuracy.max(trained_accuracy());
            network.loss = network.loss.min(trained_loss());
            network.status = NetworkStatus::Active;
            network.last_updated_time = now;
            store::set_network(ctx, &network)?;
            ctx.emit(
                Event::new(types::UPDATE_NEURAL_NETWORK)
                    .attr("network_id", &network.id)
                    .attr("accuracy", network.accuracy)
                    .attr("loss", network.loss),
            );
            info!(
                "training of network {} completed: accuracy {}, loss {}",
                network.id, network.accuracy, network.loss
            );
        }
        Ok(())
    }

    /// Refines every active, trained network whose update interval elapsed
    pub fn refine_networks(&self, ctx: &mut Context<'_>) -> Result<()> {
        let interval = self.params(ctx)?.neural_network_update_interval;
        let now = ctx.block_time();
        for mut network in store::all_networks(ctx)? {
            if network.status != NetworkStatus::Active || now.since(network.last_updated_time) < interval {
                continue;
            }
            if !store::has_training_data(ctx, &network.id)? {
                continue;
            }
            network.accuracy = (network.accuracy + refinement_step()).min(Dec::ONE);
            network.loss = (network.loss - refinement_step()).max(Dec::ZERO);
            network.last_updated_time = now;
            store::set_network(ctx, &network)?;
            ctx.emit(
                Event::new(types::UPDATE_NEURAL_NETWORK)
                    .attr("network_id", &network.id)
                    .attr("accuracy", network.accuracy)
                    .attr("loss", network.loss),
            );
            debug!("refined network {} to accuracy {}", network.id, network.accuracy);
        }
        Ok(())
    }
}
