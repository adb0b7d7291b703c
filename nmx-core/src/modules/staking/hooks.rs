// src/modules/staking/hooks.rs

//! Callbacks other modules attach to validator lifecycle events.

use super::types::{Validator, ValidatorSlashEvent};
use crate::context::Context;
use crate::errors::Result;
use nmx_crypto::ValAddress;

/// Receiver of validator lifecycle events
///
/// Hooks run after staking has written its own records, inside the same
/// transaction or block hook, so an error aborts the whole operation.
pub trait ValidatorHooks: Send + Sync {
    /// A validator was created
    fn after_validator_created(&self, _ctx: &mut Context<'_>, _validator: &Validator) -> Result<()> {
        Ok(())
    }

    /// A slash was applied
    fn after_validator_slashed(&self, _ctx: &mut Context<'_>, _event: &ValidatorSlashEvent) -> Result<()> {
        Ok(())
    }

    /// A validator was permanently excluded
    fn after_validator_tombstoned(&self, _ctx: &mut Context<'_>, _validator: &ValAddress) -> Result<()> {
        Ok(())
    }

    /// A fully unbonded validator without shares was deleted
    fn after_validator_removed(&self, _ctx: &mut Context<'_>, _validator: &Validator) -> Result<()> {
        Ok(())
    }
}

impl ValidatorHooks for () {}

impl<A: ValidatorHooks, B: ValidatorHooks> ValidatorHooks for (A, B) {
    fn after_validator_created(&self, ctx: &mut Context<'_>, validator: &Validator) -> Result<()> {
        self.0.after_validator_created(ctx, validator)?;
        self.1.after_validator_created(ctx, validator)
    }

    fn after_validator_slashed(&self, ctx: &mut Context<'_>, event: &ValidatorSlashEvent) -> Result<()> {
        self.0.after_validator_slashed(ctx, event)?;
        self.1.after_validator_slashed(ctx, event)
    }

    fn after_validator_tombstoned(&self, ctx: &mut Context<'_>, validator: &ValAddress) -> Result<()> {
        self.0.after_validator_tombstoned(ctx, validator)?;
        self.1.after_validator_tombstoned(ctx, validator)
    }

    fn after_validator_removed(&self, ctx: &mut Context<'_>, validator: &Validator) -> Result<()> {
        self.0.after_validator_removed(ctx, validator)?;
        self.1.after_validator_removed(ctx, validator)
    }
}
