// src/modules/slashing/params.rs

//! Slashing parameters.

use crate::errors::{NmxError, Result};
use crate::math::Dec;
use crate::modules::params::{validate_positive, validate_unit, ParamField, ParamSet};
use crate::store::names;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slashing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingParams {
    /// Blocks in the liveness window
    pub signed_blocks_window: i64,
    /// Fraction of the window a validator must sign
    pub min_signed_per_window: Dec,
    /// Jail time after downtime
    pub downtime_jail_duration: Duration,
    /// Slash for a duplicate vote
    pub slash_fraction_double_sign: Dec,
    /// Slash for downtime
    pub slash_fraction_downtime: Dec,
}

impl Default for SlashingParams {
    fn default() -> Self {
        Self {
            signed_blocks_window: 10_000,
            min_signed_per_window: Dec::percent(5),
            downtime_jail_duration: Duration::from_secs(86_400),
            slash_fraction_double_sign: Dec::percent(5),
            slash_fraction_downtime: Dec::percent(1),
        }
    }
}

/// One slashing parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SlashingParam {
    SignedBlocksWindow(i64),
    MinSignedPerWindow(Dec),
    DowntimeJailDuration(Duration),
    SlashFractionDoubleSign(Dec),
    SlashFractionDowntime(Dec),
}

fn validate_fraction(name: &str, value: Dec) -> Result<()> {
    validate_unit(name, value)?;
    if value >= Dec::ONE {
        return Err(NmxError::InvalidParams(format!("{} must be below 1, got {}", name, value)));
    }
    Ok(())
}

impl ParamField for SlashingParam {
    fn name(&self) -> &'static str {
        match self {
            SlashingParam::SignedBlocksWindow(_) => "signed_blocks_window",
            SlashingParam::MinSignedPerWindow(_) => "min_signed_per_window",
            SlashingParam::DowntimeJailDuration(_) => "downtime_jail_duration",
            SlashingParam::SlashFractionDoubleSign(_) => "slash_fraction_double_sign",
            SlashingParam::SlashFractionDowntime(_) => "slash_fraction_downtime",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            SlashingParam::SignedBlocksWindow(w) => validate_positive(self.name(), (*w).max(0) as u64),
            SlashingParam::MinSignedPerWindow(d) => validate_unit(self.name(), *d),
            SlashingParam::DowntimeJailDuration(d) => validate_positive(self.name(), d.as_secs()),
            SlashingParam::SlashFractionDoubleSign(d) | SlashingParam::SlashFractionDowntime(d) => {
                validate_fraction(self.name(), *d)
            }
        }
    }
}

impl ParamSet for SlashingParams {
    const SUBSPACE: &'static str = names::SLASHING;
    type Field = SlashingParam;

    fn fields(&self) -> Vec<SlashingParam> {
        vec![
            SlashingParam::SignedBlocksWindow(self.signed_blocks_window),
            SlashingParam::MinSignedPerWindow(self.min_signed_per_window),
            SlashingParam::DowntimeJailDuration(self.downtime_jail_duration),
            SlashingParam::SlashFractionDoubleSign(self.slash_fraction_double_sign),
            SlashingParam::SlashFractionDowntime(self.slash_fraction_downtime),
        ]
    }

    fn apply(&mut self, field: SlashingParam) {
        match field {
            SlashingParam::SignedBlocksWindow(v) => self.signed_blocks_window = v,
            SlashingParam::MinSignedPerWindow(v) => self.min_signed_per_window = v,
            SlashingParam::DowntimeJailDuration(v) => self.downtime_jail_duration = v,
            SlashingParam::SlashFractionDoubleSign(v) => self.slash_fraction_double_sign = v,
            SlashingParam::SlashFractionDowntime(v) => self.slash_fraction_downtime = v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_slash_rejected() {
        assert!(SlashingParam::SlashFractionDowntime(Dec::ONE).validate().is_err());
        assert!(SlashingParam::SlashFractionDowntime(Dec::percent(99)).validate().is_ok());
        assert!(SlashingParam::SignedBlocksWindow(0).validate().is_err());
        assert!(SlashingParams::default().validate().is_ok());
    }
}
