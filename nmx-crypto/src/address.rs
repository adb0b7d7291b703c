// src/address.rs

//! Bech32 addresses with role-specific prefixes.
//!
//! Every address is 20 raw bytes. The role decides the human-readable
//! part: accounts use `nmx`, validator operators `nmxvaloper` and
//! consensus keys `nmxvalcons`, each with a `pub` variant for encoded
//! public keys. Prefixes are configured once per process; the default
//! configuration is the NMX mainnet one.

use crate::errors::{CryptoError, Result};
use crate::keys::PublicKey;
use crate::ADDRESS_SIZE;
use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Address prefix configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bech32Config {
    /// Account address prefix
    pub account: String,
    /// Account public key prefix
    pub account_pub: String,
    /// Validator operator address prefix
    pub validator: String,
    /// Validator operator public key prefix
    pub validator_pub: String,
    /// Consensus address prefix
    pub consensus: String,
    /// Consensus public key prefix
    pub consensus_pub: String,
    /// BIP-44 coin type used by wallets
    pub coin_type: u32,
}

impl Bech32Config {
    /// Builds the six prefixes from a root prefix, e.g. `nmx`
    pub fn from_root(root: &str, coin_type: u32) -> Self {
        Self {
            account: root.to_string(),
            account_pub: format!("{}pub", root),
            validator: format!("{}valoper", root),
            validator_pub: format!("{}valoperpub", root),
            consensus: format!("{}valcons", root),
            consensus_pub: format!("{}valconspub", root),
            coin_type,
        }
    }
}

impl Default for Bech32Config {
    fn default() -> Self {
        Self::from_root(crate::BECH32_ROOT_PREFIX, crate::COIN_TYPE)
    }
}

static CONFIG: OnceLock<Bech32Config> = OnceLock::new();

/// Installs the process-wide prefix configuration
///
/// Succeeds only once, and only before any address has been encoded.
pub fn set_bech32_config(config: Bech32Config) -> Result<()> {
    CONFIG
        .set(config)
        .map_err(|_| CryptoError::InvalidInput("Bech32 configuration already sealed".to_string()))
}

/// Current prefix configuration (seals the default if none was installed)
pub fn bech32_config() -> &'static Bech32Config {
    CONFIG.get_or_init(Bech32Config::default)
}

/// Address role, selecting the prefix pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressRole {
    /// User or module account
    Account,
    /// Validator operator
    Validator,
    /// Validator consensus key
    Consensus,
}

impl AddressRole {
    /// Address prefix for this role
    pub fn prefix(&self) -> &'static str {
        let config = bech32_config();
        match self {
            AddressRole::Account => &config.account,
            AddressRole::Validator => &config.validator,
            AddressRole::Consensus => &config.consensus,
        }
    }

    /// Public key prefix for this role
    pub fn pubkey_prefix(&self) -> &'static str {
        let config = bech32_config();
        match self {
            AddressRole::Account => &config.account_pub,
            AddressRole::Validator => &config.validator_pub,
            AddressRole::Consensus => &config.consensus_pub,
        }
    }
}

/// Encodes raw bytes under a human-readable part
pub fn encode(hrp: &str, data: &[u8]) -> Result<String> {
    Ok(bech32::encode(hrp, data.to_base32(), Variant::Bech32)?)
}

/// Decodes a Bech32 string, checking the human-readable part
pub fn decode(expected_hrp: &str, encoded: &str) -> Result<Vec<u8>> {
    let (hrp, data, variant) = bech32::decode(encoded)?;
    if variant != Variant::Bech32 {
        return Err(CryptoError::Bech32Error("bech32m variant not accepted".to_string()));
    }
    if hrp != expected_hrp {
        return Err(CryptoError::WrongPrefix {
            expected: expected_hrp.to_string(),
            found: hrp,
        });
    }
    Ok(Vec::<u8>::from_base32(&data)?)
}

/// Encodes a public key under the role's `pub` prefix
pub fn encode_pubkey(role: AddressRole, key: &PublicKey) -> Result<String> {
    encode(role.pubkey_prefix(), key.as_bytes())
}

/// Decodes a public key from the role's `pub` prefix
pub fn decode_pubkey(role: AddressRole, encoded: &str) -> Result<PublicKey> {
    let bytes = decode(role.pubkey_prefix(), encoded)?;
    PublicKey::from_slice(&bytes)
}

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident, $role:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; ADDRESS_SIZE]);

        impl $name {
            /// Address role of this type
            pub const ROLE: AddressRole = $role;

            /// Wraps raw address bytes
            pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
                Self(bytes)
            }

            /// Parses raw address bytes from a slice
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                if bytes.len() != ADDRESS_SIZE {
                    return Err(CryptoError::InvalidAddress(format!(
                        "expected {} bytes, got {}",
                        ADDRESS_SIZE,
                        bytes.len()
                    )));
                }
                let mut out = [0u8; ADDRESS_SIZE];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            /// Raw address bytes
            pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
                &self.0
            }

            /// Whether every byte is zero
            pub fn is_empty(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Bech32 encoding under the configured prefix
            pub fn to_bech32(&self) -> Result<String> {
                encode(Self::ROLE.prefix(), &self.0)
            }

            /// Parses a Bech32 string with the configured prefix
            pub fn from_bech32(encoded: &str) -> Result<Self> {
                let bytes = decode(Self::ROLE.prefix(), encoded)?;
                Self::from_slice(&bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let encoded = self.to_bech32().map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = CryptoError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_bech32(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    let encoded = self.to_bech32().map_err(serde::ser::Error::custom)?;
                    serializer.serialize_str(&encoded)
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    Self::from_bech32(&s).map_err(serde::de::Error::custom)
                } else {
                    Ok(Self(<[u8; ADDRESS_SIZE]>::deserialize(deserializer)?))
                }
            }
        }
    };
}

address_type!(
    /// Account address (`nmx1...`)
    AccAddress,
    AddressRole::Account
);

address_type!(
    /// Validator operator address (`nmxvaloper1...`)
    ValAddress,
    AddressRole::Validator
);

address_type!(
    /// Validator consensus address (`nmxvalcons1...`)
    ConsAddress,
    AddressRole::Consensus
);

impl From<ValAddress> for AccAddress {
    fn from(val: ValAddress) -> Self {
        AccAddress(val.0)
    }
}

impl From<AccAddress> for ValAddress {
    fn from(acc: AccAddress) -> Self {
        ValAddress(acc.0)
    }
}

impl AccAddress {
    /// Deterministic address of a named module account
    pub fn module(name: &str) -> Self {
        let digest = crate::hash::hash_chunks(&[b"module/", name.as_bytes()]);
        let mut out = [0u8; ADDRESS_SIZE];
        out.copy_from_slice(&digest[..ADDRESS_SIZE]);
        AccAddress(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn create_test_bytes(fill: u8) -> [u8; ADDRESS_SIZE] {
        [fill; ADDRESS_SIZE]
    }

    #[test]
    fn test_default_prefixes() {
        let config = Bech32Config::default();
        assert_eq!(config.account, "nmx");
        assert_eq!(config.account_pub, "nmxpub");
        assert_eq!(config.validator, "nmxvaloper");
        assert_eq!(config.validator_pub, "nmxvaloperpub");
        assert_eq!(config.consensus, "nmxvalcons");
        assert_eq!(config.consensus_pub, "nmxvalconspub");
        assert_eq!(config.coin_type, 118);
    }

    #[test]
    fn test_account_bech32_roundtrip() {
        let addr = AccAddress::new(create_test_bytes(3));
        let encoded = addr.to_string();
        assert!(encoded.starts_with("nmx1"));
        assert_eq!(encoded.parse::<AccAddress>().unwrap(), addr);
    }

    #[test]
    fn test_role_prefix_is_checked() {
        let val = ValAddress::new(create_test_bytes(9));
        let encoded = val.to_string();
        assert!(encoded.starts_with("nmxvaloper1"));

        let err = AccAddress::from_bech32(&encoded).unwrap_err();
        assert!(matches!(err, CryptoError::WrongPrefix { .. }));
    }

    #[test]
    fn test_invalid_checksum_rejected() {
        let mut encoded = AccAddress::new(create_test_bytes(1)).to_string();
        let last = encoded.pop().unwrap();
        encoded.push(if last == 'q' { 'p' } else { 'q' });
        assert!(AccAddress::from_bech32(&encoded).is_err());
    }

    #[test]
    fn test_operator_account_shares_bytes() {
        let acc = KeyPair::from_label("operator").account_address();
        let val: ValAddress = acc.into();
        assert_eq!(val.as_bytes(), acc.as_bytes());
        assert_eq!(AccAddress::from(val), acc);
    }

    #[test]
    fn test_module_addresses_distinct() {
        assert_ne!(
            AccAddress::module("bonded_tokens_pool"),
            AccAddress::module("not_bonded_tokens_pool")
        );
    }

    #[test]
    fn test_pubkey_encoding() {
        let kp = KeyPair::from_label("cons");
        let encoded = encode_pubkey(AddressRole::Consensus, &kp.public_key).unwrap();
        assert!(encoded.starts_with("nmxvalconspub1"));
        assert_eq!(decode_pubkey(AddressRole::Consensus, &encoded).unwrap(), kp.public_key);
    }

    #[test]
    fn test_serde_forms() {
        let addr = AccAddress::new(create_test_bytes(5));
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));

        let bin = bincode::serialize(&addr).unwrap();
        assert_eq!(bin.len(), ADDRESS_SIZE);
        assert_eq!(bincode::deserialize::<AccAddress>(&bin).unwrap(), addr);
    }
}
