// src/modules/staking/types.rs

//! Staking records and share arithmetic.

use crate::errors::{NmxError, Result};
use crate::math::{Dec, Int};
use crate::time::Timestamp;
use crate::POWER_REDUCTION;
use nmx_crypto::{AccAddress, ConsAddress, PublicKey, ValAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship of a validator to the active set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondStatus {
    /// Not in the active set
    Unbonded,
    /// Left the set, cooling off
    Unbonding,
    /// Signing blocks
    Bonded,
}

impl fmt::Display for BondStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BondStatus::Unbonded => "unbonded",
            BondStatus::Unbonding => "unbonding",
            BondStatus::Bonded => "bonded",
        };
        write!(f, "{}", s)
    }
}

/// Human-readable validator metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    /// Display name
    pub moniker: String,
    /// Optional identity signature
    #[serde(default)]
    pub identity: String,
    /// Optional website
    #[serde(default)]
    pub website: String,
    /// Optional contact
    #[serde(default)]
    pub security_contact: String,
    /// Optional free text
    #[serde(default)]
    pub details: String,
}

impl Description {
    /// Description with only a moniker
    pub fn with_moniker(moniker: impl Into<String>) -> Self {
        Self {
            moniker: moniker.into(),
            ..Default::default()
        }
    }

    /// Length checks
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("moniker", &self.moniker, 70),
            ("identity", &self.identity, 3_000),
            ("website", &self.website, 140),
            ("security_contact", &self.security_contact, 140),
            ("details", &self.details, 280),
        ];
        if self.moniker.trim().is_empty() {
            return Err(NmxError::InvalidMessage("moniker cannot be empty".into()));
        }
        for (name, value, max) in limits {
            if value.chars().count() > max {
                return Err(NmxError::InvalidMessage(format!(
                    "{} longer than {} characters",
                    name, max
                )));
            }
        }
        Ok(())
    }
}

/// Commission rate bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRates {
    /// Current rate
    pub rate: Dec,
    /// Upper bound for `rate`
    pub max_rate: Dec,
    /// Largest change of `rate` per edit
    pub max_change_rate: Dec,
}

impl CommissionRates {
    /// Range checks
    pub fn validate(&self) -> Result<()> {
        if self.max_rate.is_negative() || self.max_rate > Dec::ONE {
            return Err(NmxError::InvalidCommissionRate(format!(
                "max rate {} outside [0, 1]",
                self.max_rate
            )));
        }
        if self.rate.is_negative() || self.rate > self.max_rate {
            return Err(NmxError::InvalidCommissionRate(format!(
                "rate {} outside [0, {}]",
                self.rate, self.max_rate
            )));
        }
        if self.max_change_rate.is_negative() || self.max_change_rate > self.max_rate {
            return Err(NmxError::InvalidCommissionRate(format!(
                "max change rate {} outside [0, {}]",
                self.max_change_rate, self.max_rate
            )));
        }
        Ok(())
    }
}

/// Commission with the time of its last change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    /// Rates in force
    pub rates: CommissionRates,
    /// Time of the last rate change
    pub update_time: Timestamp,
}

/// Validator record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Operator address
    pub operator_address: ValAddress,
    /// Consensus key reported to the host
    pub consensus_pubkey: PublicKey,
    /// Excluded from the set until unjailed
    pub jailed: bool,
    /// Bond status
    pub status: BondStatus,
    /// Tokens backing the validator
    pub tokens: Int,
    /// Shares issued to delegators
    pub delegator_shares: Dec,
    /// Metadata
    pub description: Description,
    /// Height the validator began unbonding
    pub unbonding_height: u64,
    /// Time the validator finishes unbonding
    pub unbonding_time: Timestamp,
    /// Commission
    pub commission: Commission,
    /// Self-delegation the operator must keep
    pub min_self_delegation: Int,
    /// Mirror of the reputation engine's score
    pub reputation: Dec,
    /// Mirror of the current performance score
    pub performance_score: Dec,
    /// Contribution of the validator's neural-network work
    pub neural_network_contribution: Dec,
}

impl Validator {
    /// New unbonded validator without tokens
    pub fn new(
        operator_address: ValAddress,
        consensus_pubkey: PublicKey,
        description: Description,
        rates: CommissionRates,
        min_self_delegation: Int,
        now: Timestamp,
    ) -> Self {
        Self {
            operator_address,
            consensus_pubkey,
            jailed: false,
            status: BondStatus::Unbonded,
            tokens: Int::ZERO,
            delegator_shares: Dec::ZERO,
            description,
            unbonding_height: 0,
            unbonding_time: Timestamp::EPOCH,
            commission: Commission {
                rates,
                update_time: now,
            },
            min_self_delegation,
            reputation: Dec::ONE,
            performance_score: Dec::ONE,
            neural_network_contribution: Dec::ZERO,
        }
    }

    /// Consensus address
    pub fn cons_address(&self) -> ConsAddress {
        self.consensus_pubkey.consensus_address()
    }

    /// Account address of the operator
    pub fn operator_account(&self) -> AccAddress {
        AccAddress::from(self.operator_address)
    }

    /// Whether the validator is bonded
    pub fn is_bonded(&self) -> bool {
        self.status == BondStatus::Bonded
    }

    /// Power the validator would have if bonded
    pub fn potential_power(&self) -> i64 {
        let power = self.tokens.value() / POWER_REDUCTION;
        power.clamp(0, i64::MAX as i128) as i64
    }

    /// Power reported to the host; zero unless bonded
    pub fn consensus_power(&self) -> i64 {
        if self.is_bonded() {
            self.potential_power()
        } else {
            0
        }
    }

    /// Token value of `shares`
    pub fn tokens_from_shares(&self, shares: Dec) -> Dec {
        if self.delegator_shares.is_zero() {
            return Dec::ZERO;
        }
        shares
            .mul_ratio(self.tokens.to_dec().raw(), self.delegator_shares.raw())
            .unwrap_or(Dec::ZERO)
    }

    /// Shares worth `amount` tokens
    pub fn shares_from_tokens(&self, amount: Int) -> Result<Dec> {
        if self.tokens.is_zero() {
            return Err(NmxError::InvalidState(format!(
                "validator {} has no tokens",
                self.operator_address
            )));
        }
        self.delegator_shares
            .mul_ratio(amount.value(), self.tokens.value())
            .ok_or_else(|| NmxError::Overflow("share conversion".into()))
    }

    /// Adds delegated tokens and returns the shares issued
    pub fn add_tokens_from_delegation(&mut self, amount: Int) -> Result<Dec> {
        if self.tokens.is_zero() && self.delegator_shares.is_positive() {
            return Err(NmxError::InvalidExchangeRate(format!(
                "validator {} has {} shares and no tokens",
                self.operator_address, self.delegator_shares
            )));
        }
        let issued = if self.tokens.is_zero() {
            amount.to_dec()
        } else {
            self.shares_from_tokens(amount)?
        };
        self.tokens = self.tokens.checked_add(amount)?;
        self.delegator_shares += issued;
        Ok(issued)
    }

    /// Removes shares and returns the tokens they were worth
    pub fn remove_delegator_shares(&mut self, shares: Dec) -> Result<Int> {
        let removed = if shares >= self.delegator_shares {
            self.tokens
        } else {
            self.tokens_from_shares(shares).truncate_int()
        };
        self.delegator_shares -= shares;
        if self.delegator_shares.is_negative() {
            self.delegator_shares = Dec::ZERO;
        }
        self.tokens = self.tokens.checked_sub(removed)?;
        Ok(removed)
    }
}

/// Delegator's shares in one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Delegator
    pub delegator_address: AccAddress,
    /// Validator
    pub validator_address: ValAddress,
    /// Shares held
    pub shares: Dec,
}

/// One pending unbonding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegationEntry {
    /// Height the unbonding began
    pub creation_height: u64,
    /// Time the tokens are released
    pub completion_time: Timestamp,
    /// Tokens at creation
    pub initial_balance: Int,
    /// Tokens left after slashes
    pub balance: Int,
}

impl UnbondingDelegationEntry {
    /// Whether the entry can complete at `now`
    pub fn is_mature(&self, now: Timestamp) -> bool {
        self.completion_time <= now
    }
}

/// Pending unbondings of one (delegator, validator) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegation {
    /// Delegator
    pub delegator_address: AccAddress,
    /// Validator
    pub validator_address: ValAddress,
    /// Entries in creation order
    pub entries: Vec<UnbondingDelegationEntry>,
}

/// One pending redelegation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedelegationEntry {
    /// Height the redelegation began
    pub creation_height: u64,
    /// Time the source lock ends
    pub completion_time: Timestamp,
    /// Tokens moved
    pub initial_balance: Int,
    /// Shares received at the destination
    pub shares_dst: Dec,
}

impl RedelegationEntry {
    /// Whether the entry can complete at `now`
    pub fn is_mature(&self, now: Timestamp) -> bool {
        self.completion_time <= now
    }
}

/// Pending redelegations of one (delegator, source, destination) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redelegation {
    /// Delegator
    pub delegator_address: AccAddress,
    /// Source validator
    pub validator_src_address: ValAddress,
    /// Destination validator
    pub validator_dst_address: ValAddress,
    /// Entries in creation order
    pub entries: Vec<RedelegationEntry>,
}

/// Power recorded for the last validator-set update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastValidatorPower {
    /// Validator
    pub address: ValAddress,
    /// Power sent to the host
    pub power: i64,
}

/// Header and bonded set of a past height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalInfo {
    /// Height
    pub height: u64,
    /// Block time
    pub time: Timestamp,
    /// Bonded validators, by power
    pub valset: Vec<Validator>,
}

/// Cause of a slash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlashReason {
    /// Duplicate vote evidence
    DoubleSign,
    /// Too many missed blocks
    Downtime,
    /// High-confidence anomaly report
    Anomaly,
}

impl fmt::Display for SlashReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlashReason::DoubleSign => "double-sign",
            SlashReason::Downtime => "downtime",
            SlashReason::Anomaly => "anomaly",
        };
        write!(f, "{}", s)
    }
}

/// Record of one applied slash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashEvent {
    /// Slashed validator
    pub validator: ValAddress,
    /// Height the slash was applied
    pub height: u64,
    /// Position among slashes of the same validator at the same height
    pub sequence: u32,
    /// Height of the infraction
    pub infraction_height: u64,
    /// Block time of the slash
    pub timestamp: Timestamp,
    /// Cause
    pub reason: SlashReason,
    /// Fraction applied
    pub slash_factor: Dec,
    /// Tokens burned
    pub tokens_slashed: Int,
    /// Power reported for the infraction
    pub power: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_validator(tokens: i128) -> Validator {
        let mut v = Validator::new(
            ValAddress::new([1u8; 20]),
            PublicKey([2u8; 32]),
            Description::with_moniker("v1"),
            CommissionRates {
                rate: Dec::percent(10),
                max_rate: Dec::percent(20),
                max_change_rate: Dec::percent(1),
            },
            Int::new(1),
            Timestamp::EPOCH,
        );
        if tokens > 0 {
            v.add_tokens_from_delegation(Int::new(tokens)).unwrap();
        }
        v
    }

    #[test]
    fn test_bootstrap_shares_equal_tokens() {
        let v = create_test_validator(1_000_000);
        assert_eq!(v.delegator_shares, Dec::from_int(1_000_000));
        assert_eq!(v.potential_power(), 1_000);
        assert_eq!(v.consensus_power(), 0);
    }

    #[test]
    fn test_shares_dilute_after_token_loss() {
        let mut v = create_test_validator(1_000);
        v.tokens = Int::new(500);
        let issued = v.add_tokens_from_delegation(Int::new(500)).unwrap();
        assert_eq!(issued, Dec::from_int(1_000));
        assert_eq!(v.tokens_from_shares(Dec::from_int(1_000)), Dec::from_int(500));
    }

    #[test]
    fn test_remove_all_shares_returns_all_tokens() {
        let mut v = create_test_validator(1_000);
        v.tokens = Int::new(999);
        let shares = v.delegator_shares;
        assert_eq!(v.remove_delegator_shares(shares).unwrap(), Int::new(999));
        assert!(v.tokens.is_zero() && v.delegator_shares.is_zero());
    }

    #[test]
    fn test_commission_validation() {
        let ok = CommissionRates {
            rate: Dec::percent(10),
            max_rate: Dec::percent(20),
            max_change_rate: Dec::percent(1),
        };
        assert!(ok.validate().is_ok());
        let bad = CommissionRates { rate: Dec::percent(30), ..ok };
        assert!(matches!(bad.validate(), Err(NmxError::InvalidCommissionRate(_))));
    }

    #[test]
    fn test_slash_reason_display() {
        assert_eq!(SlashReason::DoubleSign.to_string(), "double-sign");
        assert_eq!(SlashReason::Downtime.to_string(), "downtime");
    }
}
