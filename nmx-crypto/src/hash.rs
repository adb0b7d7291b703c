// src/hash.rs

//! Cryptographic hash functions for the NMX chain.
//!
//! BLAKE3 is the state hash: Merkle leaves and inner nodes, transaction
//! hashes, content-derived ids and address derivation all go through it.
//! Keccak-256 is kept for contract code checksums so that Solidity tooling
//! can cross-check them.

use crate::errors::{CryptoError, Result};
use crate::HASH_SIZE;
use sha3::{Digest, Keccak256};

/// 32-byte digest
pub type Hash = [u8; HASH_SIZE];

/// Computes BLAKE3 hash of input data
///
/// # Arguments
/// * `data` - Input data to hash
///
/// # Returns
/// 32-byte hash digest
///
/// # Example
/// ```
/// use nmx_crypto::hash::blake3_hash;
///
/// let hash = blake3_hash(b"Hello NMX");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Computes Keccak-256 hash of input data
///
/// # Arguments
/// * `data` - Input data to hash
///
/// # Returns
/// 32-byte hash digest
pub fn keccak_hash(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&result[..HASH_SIZE]);
    out
}

/// Converts a hash to hexadecimal string
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parses hexadecimal string to hash
///
/// # Arguments
/// * `hex_str` - 64-character hexadecimal string
///
/// # Returns
/// 32-byte hash array or error
pub fn hex_to_hash(hex_str: &str) -> Result<Hash> {
    if hex_str.len() != HASH_SIZE * 2 {
        return Err(CryptoError::HashError(format!(
            "Invalid hex length: expected {}, got {}",
            HASH_SIZE * 2,
            hex_str.len()
        )));
    }

    let bytes = hex::decode(hex_str)
        .map_err(|e| CryptoError::HashError(format!("Hex decode failed: {}", e)))?;

    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Hashes multiple data chunks together
///
/// Equivalent to hashing the concatenation, without allocating it.
pub fn hash_chunks(chunks: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    *hasher.finalize().as_bytes()
}

/// Hashes a Merkle leaf: `H(0x00 || len(key) || key || len(value) || value)`
///
/// Lengths are 4-byte big-endian so that no (key, value) split is ambiguous.
pub fn merkle_leaf(key: &[u8], value: &[u8]) -> Hash {
    let key_len = (key.len() as u32).to_be_bytes();
    let value_len = (value.len() as u32).to_be_bytes();
    hash_chunks(&[&[0x00], &key_len, key, &value_len, value])
}

/// Hashes a Merkle inner node: `H(0x01 || left || right)`
pub fn merkle_inner(left: &Hash, right: &Hash) -> Hash {
    hash_chunks(&[&[0x01], left, right])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_deterministic() {
        let data = b"test data";
        assert_eq!(blake3_hash(data), blake3_hash(data));
    }

    #[test]
    fn test_blake3_different_input() {
        assert_ne!(blake3_hash(b"data1"), blake3_hash(b"data2"));
    }

    #[test]
    fn test_blake3_vs_keccak() {
        let data = b"same input";
        assert_ne!(blake3_hash(data), keccak_hash(data));
    }

    #[test]
    fn test_keccak_known_vector() {
        // keccak256("") from the Ethereum yellow paper
        assert_eq!(
            hash_to_hex(&keccak_hash(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_to_hex_and_back() {
        let original = blake3_hash(b"test");
        let hex = hash_to_hex(&original);
        assert_eq!(hex.len(), 64);
        assert_eq!(hex_to_hash(&hex).unwrap(), original);
    }

    #[test]
    fn test_hex_to_hash_invalid() {
        assert!(hex_to_hash("abcd").is_err());
        assert!(hex_to_hash(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_hash_chunks() {
        assert_eq!(hash_chunks(&[b"hello", b"world"]), blake3_hash(b"helloworld"));
    }

    #[test]
    fn test_merkle_leaf_is_unambiguous() {
        // Same concatenation, different split
        assert_ne!(merkle_leaf(b"ab", b"c"), merkle_leaf(b"a", b"bc"));
    }

    #[test]
    fn test_merkle_inner_order_matters() {
        let a = blake3_hash(b"a");
        let b = blake3_hash(b"b");
        assert_ne!(merkle_inner(&a, &b), merkle_inner(&b, &a));
    }
}
