// src/modules/staking/msgs.rs

//! Staking messages.

use super::types::{CommissionRates, Description};
use crate::coins::Coin;
use crate::errors::{NmxError, Result};
use crate::math::{Dec, Int};
use nmx_crypto::{AccAddress, PublicKey, ValAddress};
use serde::{Deserialize, Serialize};

fn validate_amount(coin: &Coin, what: &str) -> Result<()> {
    coin.validate()?;
    if !coin.amount.is_positive() {
        return Err(NmxError::InvalidCoins(format!("{} amount must be positive", what)));
    }
    Ok(())
}

/// Registers a validator with its self-delegation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateValidator {
    /// Metadata
    pub description: Description,
    /// Initial commission
    pub commission: CommissionRates,
    /// Self-delegation the operator commits to keep
    pub min_self_delegation: Int,
    /// Operator account, the signer
    pub delegator_address: AccAddress,
    /// Operator address
    pub validator_address: ValAddress,
    /// Consensus key
    pub pubkey: PublicKey,
    /// Self-delegation
    pub value: Coin,
}

impl MsgCreateValidator {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.delegator_address
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.delegator_address.is_empty() || self.validator_address.is_empty() {
            return Err(NmxError::InvalidAddress("empty address".into()));
        }
        if AccAddress::from(self.validator_address) != self.delegator_address {
            return Err(NmxError::InvalidAddress(
                "validator address must belong to the delegator".into(),
            ));
        }
        validate_amount(&self.value, "self-delegation")?;
        self.description.validate()?;
        self.commission.validate()?;
        if !self.min_self_delegation.is_positive() {
            return Err(NmxError::InvalidMessage("min self delegation must be positive".into()));
        }
        if self.value.amount < self.min_self_delegation {
            return Err(NmxError::SelfDelegationBelowMinimum(format!(
                "{} below declared minimum {}",
                self.value.amount, self.min_self_delegation
            )));
        }
        Ok(())
    }
}

/// Changes validator metadata, commission or minimum self-delegation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgEditValidator {
    /// Operator address
    pub validator_address: ValAddress,
    /// New metadata
    pub description: Option<Description>,
    /// New commission rate
    pub commission_rate: Option<Dec>,
    /// New minimum self-delegation
    pub min_self_delegation: Option<Int>,
}

impl MsgEditValidator {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        AccAddress::from(self.validator_address)
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.validator_address.is_empty() {
            return Err(NmxError::InvalidAddress("empty validator address".into()));
        }
        if let Some(description) = &self.description {
            description.validate()?;
        }
        if let Some(rate) = self.commission_rate {
            if !rate.is_unit() {
                return Err(NmxError::InvalidCommissionRate(format!("rate {} outside [0, 1]", rate)));
            }
        }
        if let Some(min) = self.min_self_delegation {
            if !min.is_positive() {
                return Err(NmxError::InvalidMessage("min self delegation must be positive".into()));
            }
        }
        Ok(())
    }
}

/// Bonds tokens to a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegate {
    /// Delegator, the signer
    pub delegator_address: AccAddress,
    /// Validator
    pub validator_address: ValAddress,
    /// Tokens to bond
    pub amount: Coin,
}

impl MsgDelegate {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.delegator_address
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.delegator_address.is_empty() || self.validator_address.is_empty() {
            return Err(NmxError::InvalidAddress("empty address".into()));
        }
        validate_amount(&self.amount, "delegation")
    }
}

/// Starts unbonding tokens from a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUndelegate {
    /// Delegator, the signer
    pub delegator_address: AccAddress,
    /// Validator
    pub validator_address: ValAddress,
    /// Tokens to unbond
    pub amount: Coin,
}

impl MsgUndelegate {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.delegator_address
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.delegator_address.is_empty() || self.validator_address.is_empty() {
            return Err(NmxError::InvalidAddress("empty address".into()));
        }
        validate_amount(&self.amount, "undelegation")
    }
}

/// Moves bonded tokens from one validator to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBeginRedelegate {
    /// Delegator, the signer
    pub delegator_address: AccAddress,
    /// Source validator
    pub validator_src_address: ValAddress,
    /// Destination validator
    pub validator_dst_address: ValAddress,
    /// Tokens to move
    pub amount: Coin,
}

impl MsgBeginRedelegate {
    /// Signer of the message
    pub fn signer(&self) -> AccAddress {
        self.delegator_address
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<()> {
        if self.delegator_address.is_empty()
            || self.validator_src_address.is_empty()
            || self.validator_dst_address.is_empty()
        {
            return Err(NmxError::InvalidAddress("empty address".into()));
        }
        if self.validator_src_address == self.validator_dst_address {
            return Err(NmxError::SelfRedelegation);
        }
        validate_amount(&self.amount, "redelegation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validator_requires_matching_operator() {
        let msg = MsgCreateValidator {
            description: Description::with_moniker("alice"),
            commission: CommissionRates {
                rate: Dec::percent(5),
                max_rate: Dec::percent(20),
                max_change_rate: Dec::percent(1),
            },
            min_self_delegation: Int::new(1_000_000),
            delegator_address: AccAddress::new([1u8; 20]),
            validator_address: ValAddress::new([1u8; 20]),
            pubkey: PublicKey([3u8; 32]),
            value: Coin::new("unmx", 2_000_000u64),
        };
        assert!(msg.validate_basic().is_ok());

        let wrong = MsgCreateValidator {
            validator_address: ValAddress::new([2u8; 20]),
            ..msg.clone()
        };
        assert!(matches!(wrong.validate_basic(), Err(NmxError::InvalidAddress(_))));

        let small = MsgCreateValidator {
            value: Coin::new("unmx", 10u64),
            ..msg
        };
        assert!(matches!(small.validate_basic(), Err(NmxError::SelfDelegationBelowMinimum(_))));
    }

    #[test]
    fn test_self_redelegation_rejected() {
        let msg = MsgBeginRedelegate {
            delegator_address: AccAddress::new([1u8; 20]),
            validator_src_address: ValAddress::new([2u8; 20]),
            validator_dst_address: ValAddress::new([2u8; 20]),
            amount: Coin::new("unmx", 5u64),
        };
        assert_eq!(msg.validate_basic(), Err(NmxError::SelfRedelegation));
    }

    #[test]
    fn test_zero_delegation_rejected() {
        let msg = MsgDelegate {
            delegator_address: AccAddress::new([1u8; 20]),
            validator_address: ValAddress::new([2u8; 20]),
            amount: Coin::new("unmx", 0u64),
        };
        assert!(msg.validate_basic().is_err());
    }
}
