// src/lib.rs

//! # NMX Crypto
//!
//! Cryptographic primitives for the NMX chain.
//!
//! - **Hashing**: BLAKE3 for state and ids, Keccak-256 for contract code checksums
//! - **Merkle nodes**: domain-separated leaf and inner node hashing
//! - **Keys**: Ed25519 keypairs for accounts and validator consensus keys
//! - **Addresses**: 20-byte Bech32 addresses with role-specific prefixes
//!
//! ## Example Usage
//!
//! ```rust
//! use nmx_crypto::{hash, keys, address::AccAddress};
//!
//! let digest = hash::blake3_hash(b"Hello NMX");
//! assert_eq!(digest.len(), nmx_crypto::HASH_SIZE);
//!
//! let keypair = keys::KeyPair::from_label("alice");
//! let signature = keypair.sign(b"payload");
//! assert!(keys::verify(b"payload", &signature, &keypair.public_key).unwrap());
//!
//! let addr: AccAddress = keypair.account_address();
//! assert!(addr.to_string().starts_with("nmx1"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod address;
pub mod errors;
pub mod hash;
pub mod keys;

// Re-export commonly used types
pub use crate::address::{AccAddress, AddressRole, Bech32Config, ConsAddress, ValAddress};
pub use crate::errors::{CryptoError, Result};
pub use crate::hash::Hash;
pub use crate::keys::{KeyPair, PublicKey};

/// Standard hash output size (32 bytes / 256 bits)
pub const HASH_SIZE: usize = 32;

/// Address payload size
pub const ADDRESS_SIZE: usize = 20;

/// Ed25519 public key size
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const SIGNATURE_SIZE: usize = 64;

/// BIP-44 coin type
pub const COIN_TYPE: u32 = 118;

/// Root Bech32 prefix from which all role prefixes derive
pub const BECH32_ROOT_PREFIX: &str = "nmx";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(HASH_SIZE, 32);
        assert_eq!(ADDRESS_SIZE, 20);
        assert_eq!(SIGNATURE_SIZE, 64);
        assert_eq!(COIN_TYPE, 118);
    }
}

#[cfg(test)]
#[path = "tests/integration.rs"]
mod integration_tests;
