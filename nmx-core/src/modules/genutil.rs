// src/modules/genutil.rs

//! Genesis transactions.
//!
//! Validators of a fresh network are declared as create-validator
//! messages in the genesis file. They run at InitChain after bank and
//! staking are initialised, without signatures or fees; the self-bond
//! comes from the operator's genesis balance.

use crate::context::Context;
use crate::errors::{NmxError, Result};
use crate::genesis::AppState;
use crate::modules::staking::{MsgCreateValidator, StakingKeeper};
use crate::modules::AppModule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Store-less module name
pub const MODULE_NAME: &str = "genutil";

/// Genutil genesis section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenutilGenesis {
    /// Create-validator messages run at genesis
    #[serde(default)]
    pub gen_msgs: Vec<MsgCreateValidator>,
}

/// Stateless checks of the genutil section
pub fn validate_genesis(genesis: &GenutilGenesis) -> Result<()> {
    let mut operators = BTreeSet::new();
    for msg in &genesis.gen_msgs {
        msg.validate_basic()?;
        if !operators.insert(msg.validator_address) {
            return Err(NmxError::InvalidState(format!(
                "validator {} declared twice in gen_msgs",
                msg.validator_address
            )));
        }
    }
    Ok(())
}

/// Genutil module
#[derive(Debug, Clone)]
pub struct GenutilModule {
    staking: StakingKeeper,
}

impl GenutilModule {
    /// Creates the module over the staking keeper that runs the messages
    pub fn new(staking: StakingKeeper) -> Self {
        Self { staking }
    }

    /// Runs every genesis create-validator message in order
    pub fn deliver_gen_msgs(&self, ctx: &mut Context<'_>, genesis: &GenutilGenesis) -> Result<usize> {
        for msg in &genesis.gen_msgs {
            let validator = self.staking.create_validator(ctx, msg)?;
            info!(
                "genesis validator {} bonded {}",
                validator.operator_address, msg.value
            );
        }
        Ok(genesis.gen_msgs.len())
    }
}

impl AppModule for GenutilModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn validate_genesis(&self, state: &AppState) -> Result<()> {
        validate_genesis(&state.genutil)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, state: &AppState) -> Result<()> {
        self.deliver_gen_msgs(ctx, &state.genutil).map(|_| ())
    }

    // Genesis messages are consumed at InitChain; an export carries the
    // validators they created in the staking section instead.
    fn export_genesis(&self, _ctx: &mut Context<'_>, state: &mut AppState) -> Result<()> {
        state.genutil = GenutilGenesis::default();
        Ok(())
    }
}
