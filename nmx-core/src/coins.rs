// src/coins.rs

//! Coin amounts.
//!
//! [`Coins`] is kept sorted by denom with no duplicates and no zero or
//! negative entries, so two equal sets always encode to the same bytes.

use crate::errors::{NmxError, Result};
use crate::math::Int;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Single denomination amount
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Denomination, e.g. `unmx`
    pub denom: String,

    /// Amount in the smallest unit
    pub amount: Int,
}

impl Coin {
    /// Creates a coin
    pub fn new(denom: impl Into<String>, amount: impl Into<Int>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    /// Checks the denom format and that the amount is not negative
    pub fn validate(&self) -> Result<()> {
        validate_denom(&self.denom)?;
        if self.amount.is_negative() {
            return Err(NmxError::InvalidCoins(format!("negative amount: {}", self)));
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl fmt::Debug for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coin({})", self)
    }
}

impl FromStr for Coin {
    type Err = NmxError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| NmxError::InvalidCoins(format!("missing denom: {:?}", s)))?;
        if split == 0 {
            return Err(NmxError::InvalidCoins(format!("missing amount: {:?}", s)));
        }
        let coin = Coin::new(&s[split..], s[..split].parse::<Int>()?);
        coin.validate()?;
        Ok(coin)
    }
}

/// Denoms are 3-128 characters: a lowercase letter followed by lowercase
/// letters, digits or `/`
pub fn validate_denom(denom: &str) -> Result<()> {
    let mut chars = denom.chars();
    let first_ok = chars.next().map(|c| c.is_ascii_lowercase()).unwrap_or(false);
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '/');
    if !first_ok || !rest_ok || denom.len() < 3 || denom.len() > 128 {
        return Err(NmxError::InvalidCoins(format!("invalid denom: {:?}", denom)));
    }
    Ok(())
}

/// Sorted set of positive coin amounts
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Empty set
    pub fn empty() -> Self {
        Coins(Vec::new())
    }

    /// Normalizes a list: validates, sorts and drops zero amounts
    ///
    /// Fails on duplicate denoms or negative amounts.
    pub fn new(coins: Vec<Coin>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for coin in coins {
            coin.validate()?;
            if map.insert(coin.denom.clone(), coin.amount).is_some() {
                return Err(NmxError::InvalidCoins(format!("duplicate denom: {}", coin.denom)));
            }
        }
        Ok(Self::from_map(map))
    }

    /// Single-denom set
    pub fn single(denom: impl Into<String>, amount: impl Into<Int>) -> Self {
        let coin = Coin::new(denom, amount);
        if coin.amount.is_positive() {
            Coins(vec![coin])
        } else {
            Coins::empty()
        }
    }

    fn from_map(map: BTreeMap<String, Int>) -> Self {
        Coins(
            map.into_iter()
                .filter(|(_, amount)| amount.is_positive())
                .map(|(denom, amount)| Coin { denom, amount })
                .collect(),
        )
    }

    fn to_map(&self) -> BTreeMap<String, Int> {
        self.0.iter().map(|c| (c.denom.clone(), c.amount)).collect()
    }

    /// Checks the normal form; used on decoded input
    pub fn validate(&self) -> Result<()> {
        for (i, coin) in self.0.iter().enumerate() {
            coin.validate()?;
            if !coin.amount.is_positive() {
                return Err(NmxError::InvalidCoins(format!("non-positive amount: {}", coin)));
            }
            if i > 0 && self.0[i - 1].denom >= coin.denom {
                return Err(NmxError::InvalidCoins(format!("unsorted or duplicate denoms: {}", self)));
            }
        }
        Ok(())
    }

    /// Amount held in `denom`
    pub fn amount_of(&self, denom: &str) -> Int {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .unwrap_or(Int::ZERO)
    }

    /// Whether the set holds nothing
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates coins in denom order
    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    /// Sum of two sets
    pub fn checked_add(&self, other: &Coins) -> Result<Coins> {
        let mut map = self.to_map();
        for coin in other.iter() {
            let entry = map.entry(coin.denom.clone()).or_insert(Int::ZERO);
            *entry = entry.checked_add(coin.amount)?;
        }
        Ok(Self::from_map(map))
    }

    /// Difference; fails with `InsufficientFunds` if any denom goes negative
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins> {
        let mut map = self.to_map();
        for coin in other.iter() {
            let entry = map.entry(coin.denom.clone()).or_insert(Int::ZERO);
            *entry = entry.checked_sub(coin.amount)?;
            if entry.is_negative() {
                return Err(NmxError::InsufficientFunds(format!(
                    "{} is smaller than {}",
                    self, other
                )));
            }
        }
        Ok(Self::from_map(map))
    }

    /// Whether every denom of `other` is covered
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

impl fmt::Debug for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coins({})", self)
    }
}

impl FromStr for Coins {
    type Err = NmxError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Coins::empty());
        }
        let coins = s
            .split(',')
            .map(|part| part.parse::<Coin>())
            .collect::<Result<Vec<_>>>()?;
        Coins::new(coins)
    }
}
