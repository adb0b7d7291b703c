// src/modules/slashing/types.rs

//! Signing records and the unjail message.

use super::params::SlashingParams;
use crate::errors::{NmxError, Result};
use crate::math::Dec;
use crate::time::Timestamp;
use nmx_crypto::{AccAddress, ConsAddress, ValAddress};
use serde::{Deserialize, Serialize};

/// Liveness record of one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSigningInfo {
    /// Consensus address
    pub address: ConsAddress,
    /// Height tracking started
    pub start_height: u64,
    /// Next bitmap slot, always below the window
    pub index_offset: u64,
    /// Earliest unjail time
    pub jailed_until: Timestamp,
    /// Permanently excluded after a double sign
    pub tombstoned: bool,
    /// Set bits in the missed-block bitmap
    pub missed_blocks_counter: u64,
    /// Window the bitmap was sized for
    pub signed_blocks_window: i64,
    /// Signing ratio the record was tracked against
    pub min_signed_per_window: Dec,
}

impl ValidatorSigningInfo {
    /// Fresh record starting at `start_height`
    pub fn new(address: ConsAddress, start_height: u64, params: &SlashingParams) -> Self {
        Self {
            address,
            start_height,
            index_offset: 0,
            jailed_until: Timestamp::EPOCH,
            tombstoned: false,
            missed_blocks_counter: 0,
            signed_blocks_window: params.signed_blocks_window,
            min_signed_per_window: params.min_signed_per_window,
        }
    }

    /// Whether the record was sized for different parameters
    pub fn is_stale(&self, params: &SlashingParams) -> bool {
        self.signed_blocks_window != params.signed_blocks_window
            || self.min_signed_per_window != params.min_signed_per_window
    }
}

/// Missed bitmap slots of one validator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorMissedBlocks {
    /// Consensus address
    pub address: ConsAddress,
    /// Bitmap indices holding a miss, ascending
    pub missed_indices: Vec<u64>,
}

/// Requests re-entry of a jailed validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUnjail {
    /// Jailed validator
    pub validator_address: ValAddress,
}

impl MsgUnjail {
    /// Signer of the message, the operator account
    pub fn signer(&self) -> AccAddress {
        AccAddress::from(self.validator_address)
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.validator_address.is_empty() {
            return Err(NmxError::InvalidAddress("empty validator address".into()));
        }
        Ok(())
    }
}

/// Largest number of misses tolerated inside one window
///
/// `ceil(window * (1 - min_signed_per_window))`; the next miss jails.
pub fn max_missed_blocks(params: &SlashingParams) -> u64 {
    let tolerated = Dec::from_int(params.signed_blocks_window as i128).mul(Dec::ONE - params.min_signed_per_window);
    tolerated.ceil_int().value().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_missed_rounds_up() {
        let mut params = SlashingParams {
            signed_blocks_window: 100,
            min_signed_per_window: Dec::percent(50),
            ..Default::default()
        };
        assert_eq!(max_missed_blocks(&params), 50);
        params.signed_blocks_window = 10;
        params.min_signed_per_window = Dec::percent(5);
        // 9.5 tolerated misses round up to 10
        assert_eq!(max_missed_blocks(&params), 10);
        assert_eq!(max_missed_blocks(&SlashingParams::default()), 9_500);
    }

    #[test]
    fn test_unjail_rejects_empty_address() {
        let msg = MsgUnjail {
            validator_address: ValAddress::new([0u8; 20]),
        };
        assert!(msg.validate_basic().is_err());
    }
}
