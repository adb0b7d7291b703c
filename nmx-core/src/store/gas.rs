// src/store/gas.rs

//! Gas metering for store access.

use crate::errors::{NmxError, Result};

/// Flat cost of a read
pub const READ_COST_FLAT: u64 = 1_000;
/// Cost per byte read (key plus value)
pub const READ_COST_PER_BYTE: u64 = 3;
/// Flat cost of a write
pub const WRITE_COST_FLAT: u64 = 2_000;
/// Cost per byte written (key plus value)
pub const WRITE_COST_PER_BYTE: u64 = 30;
/// Flat cost of a delete
pub const DELETE_COST: u64 = 1_000;
/// Cost per item yielded by an iterator
pub const ITER_COST_PER_ITEM: u64 = 30;

/// Tracks gas consumed against an optional limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasMeter {
    limit: Option<u64>,
    consumed: u64,
}

impl GasMeter {
    /// Meter with a hard limit
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
        }
    }

    /// Meter that never runs out; used by block hooks and genesis
    pub fn infinite() -> Self {
        Self {
            limit: None,
            consumed: 0,
        }
    }

    /// Charges `amount`
    ///
    /// # Returns
    /// `OutOfGas` once consumption passes the limit; the overshoot stays
    /// recorded so the result envelope reports it.
    pub fn consume(&mut self, amount: u64, descriptor: &str) -> Result<()> {
        self.consumed = self.consumed.saturating_add(amount);
        match self.limit {
            Some(limit) if self.consumed > limit => {
                tracing::debug!("out of gas on {}: {} > {}", descriptor, self.consumed, limit);
                Err(NmxError::OutOfGas {
                    limit,
                    used: self.consumed,
                })
            }
            _ => Ok(()),
        }
    }

    /// Gas consumed so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Limit, `None` for an infinite meter
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Whether the meter is infinite
    pub fn is_infinite(&self) -> bool {
        self.limit.is_none()
    }
}

/// Gas for reading `bytes` bytes
pub fn read_cost(bytes: usize) -> u64 {
    READ_COST_FLAT + READ_COST_PER_BYTE * bytes as u64
}

/// Gas for writing `bytes` bytes
pub fn write_cost(bytes: usize) -> u64 {
    WRITE_COST_FLAT + WRITE_COST_PER_BYTE * bytes as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_enforced() {
        let mut meter = GasMeter::new(3_000);
        assert!(meter.consume(read_cost(10), "read").is_ok());
        assert_eq!(meter.consumed(), 1_030);
        let err = meter.consume(write_cost(10), "write").unwrap_err();
        assert_eq!(err, NmxError::OutOfGas { limit: 3_000, used: 3_330 });
    }

    #[test]
    fn test_infinite_meter() {
        let mut meter = GasMeter::infinite();
        assert!(meter.consume(u64::MAX, "huge").is_ok());
        assert!(meter.consume(1, "more").is_ok());
        assert!(meter.is_infinite());
    }
}
