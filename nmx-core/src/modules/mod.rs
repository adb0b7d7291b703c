// src/modules/mod.rs

//! State-machine modules.
//!
//! Each module owns one store subtree and exposes a keeper for other
//! modules plus an [`AppModule`] implementation for the module manager.
//! Keepers are cheap to clone and carry no state of their own; everything
//! lives in the store reached through the [`Context`].

pub mod auth;
pub mod bank;
pub mod capability;
pub mod crisis;
pub mod distribution;
pub mod dynacontracts;
pub mod evidence;
pub mod genutil;
pub mod hyperchains;
pub mod neuropos;
pub mod params;
pub mod proposals;
pub mod slashing;
pub mod staking;
pub mod truthgpt;
pub mod upgrade;

use crate::abci::ValidatorUpdate;
use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::tx::Msg;
use crisis::InvariantRegistry;

/// Hooks a module contributes to the block lifecycle
///
/// Every method except [`AppModule::name`] has a no-op default, so a
/// module implements only what it takes part in.
pub trait AppModule {
    /// Module name, also its store name
    fn name(&self) -> &'static str;

    /// Stateless check of the module's genesis section
    fn validate_genesis(&self, _state: &AppState) -> Result<()> {
        Ok(())
    }

    /// Writes the module's genesis section into the store
    fn init_genesis(&self, _ctx: &mut Context<'_>, _state: &AppState) -> Result<()> {
        Ok(())
    }

    /// Reads the module's state back into its genesis section
    fn export_genesis(&self, _ctx: &mut Context<'_>, _state: &mut AppState) -> Result<()> {
        Ok(())
    }

    /// Runs at the start of every block
    fn begin_block(&self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs at the end of every block
    fn end_block(&self, _ctx: &mut Context<'_>) -> Result<Vec<ValidatorUpdate>> {
        Ok(Vec::new())
    }

    /// Adds the module's invariants
    fn register_invariants(&self, _registry: &mut InvariantRegistry) {}

    /// Executes a message routed to this module
    ///
    /// # Returns
    /// Result bytes for the transaction envelope
    fn handle(&self, _ctx: &mut Context<'_>, msg: &Msg) -> Result<Vec<u8>> {
        Err(NmxError::UnknownRequest(format!(
            "{} does not handle {}",
            self.name(),
            msg.type_name()
        )))
    }

    /// Answers a `custom/<module>/<endpoint>` query with JSON
    fn query(&self, _ctx: &mut Context<'_>, endpoint: &str, _data: &[u8]) -> Result<Vec<u8>> {
        Err(NmxError::UnknownRequest(format!(
            "unknown query endpoint {}/{}",
            self.name(),
            endpoint
        )))
    }
}

/// Decodes JSON query parameters
pub(crate) fn query_params<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}

/// Encodes a query result as JSON
pub(crate) fn query_result<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Encodes a handler result
pub(crate) fn msg_result<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    crate::codec::encode(value)
}
