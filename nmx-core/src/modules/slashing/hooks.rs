// src/modules/slashing/hooks.rs

//! Staking callbacks that keep the slashing records in step.

use super::params::SlashingParams;
use super::store;
use super::types::ValidatorSigningInfo;
use crate::context::Context;
use crate::errors::Result;
use crate::modules::params::ParamsKeeper;
use crate::modules::staking::{Validator, ValidatorHooks, ValidatorSlashEvent};
use tracing::debug;

/// Creates signing records and logs slash events
#[derive(Debug, Clone, Copy, Default)]
pub struct SlashingHooks;

impl ValidatorHooks for SlashingHooks {
    fn after_validator_created(&self, ctx: &mut Context<'_>, validator: &Validator) -> Result<()> {
        let cons = validator.cons_address();
        if store::get_signing_info(ctx, &cons)?.is_none() {
            let params: SlashingParams = ParamsKeeper.get(ctx)?;
            store::set_signing_info(ctx, &ValidatorSigningInfo::new(cons, ctx.height(), &params))?;
        }
        Ok(())
    }

    fn after_validator_slashed(&self, ctx: &mut Context<'_>, event: &ValidatorSlashEvent) -> Result<()> {
        let stored = store::append_slash_event(ctx, event)?;
        debug!(
            "recorded slash event {} of {} at height {}",
            stored.sequence, stored.validator, stored.height
        );
        Ok(())
    }
}
