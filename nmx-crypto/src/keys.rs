// src/keys.rs

//! Ed25519 keypairs for account and consensus keys.
//!
//! Accounts sign transactions with Ed25519. Validators register an
//! Ed25519 consensus key, whose address is what the host engine reports
//! in commit votes and evidence.

use crate::address::{AccAddress, ConsAddress};
use crate::errors::{CryptoError, Result};
use crate::hash::blake3_hash;
use crate::{ADDRESS_SIZE, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Ed25519 public key bytes
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Parses a public key from a byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "Invalid public key size: expected {}, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// 20-byte address derived from the key: the first bytes of BLAKE3(key)
    pub fn address_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let digest = blake3_hash(&self.0);
        let mut out = [0u8; ADDRESS_SIZE];
        out.copy_from_slice(&digest[..ADDRESS_SIZE]);
        out
    }

    /// Account address owned by this key
    pub fn account_address(&self) -> AccAddress {
        AccAddress::new(self.address_bytes())
    }

    /// Consensus address of this key when used as a validator key
    pub fn consensus_address(&self) -> ConsAddress {
        ConsAddress::new(self.address_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            PublicKey::from_slice(&bytes).map_err(serde::de::Error::custom)
        } else {
            let bytes = <[u8; PUBLIC_KEY_SIZE]>::deserialize(deserializer)?;
            Ok(PublicKey(bytes))
        }
    }
}

/// Ed25519 keypair
///
/// The secret seed is zeroized on drop.
#[derive(Clone)]
pub struct KeyPair {
    /// Public key
    pub public_key: PublicKey,

    secret: SecretSeed,
}

/// Secret seed wrapper that zeroizes on drop
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
struct SecretSeed {
    data: [u8; 32],
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generates a keypair using system randomness
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let seed: [u8; 32] = rng.gen();
        Self::from_seed(&seed)
    }

    /// Derives a keypair from a 32-byte seed
    ///
    /// # Example
    /// ```
    /// use nmx_crypto::keys::KeyPair;
    ///
    /// let a = KeyPair::from_seed(&[7u8; 32]);
    /// let b = KeyPair::from_seed(&[7u8; 32]);
    /// assert_eq!(a.public_key, b.public_key);
    /// ```
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(seed);
        Self {
            public_key: PublicKey(signing.verifying_key().to_bytes()),
            secret: SecretSeed { data: *seed },
        }
    }

    /// Derives a keypair from an arbitrary label, for tests and devnets
    pub fn from_label(label: &str) -> Self {
        let mut rng = StdRng::from_seed(blake3_hash(label.as_bytes()));
        let seed: [u8; 32] = rng.gen();
        Self::from_seed(&seed)
    }

    /// Signs a message
    ///
    /// # Returns
    /// 64-byte Ed25519 signature
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signing = SigningKey::from_bytes(&self.secret.data);
        signing.sign(message).to_bytes().to_vec()
    }

    /// Account address owned by this keypair
    pub fn account_address(&self) -> AccAddress {
        self.public_key.account_address()
    }
}

/// Verifies an Ed25519 signature
///
/// # Arguments
/// * `message` - Data that was signed
/// * `signature` - 64-byte signature
/// * `public_key` - Signer's public key
///
/// # Returns
/// `Ok(true)` if valid, `Ok(false)` if the signature does not match,
/// `Err` if the key or signature is malformed
pub fn verify(message: &[u8], signature: &[u8], public_key: &PublicKey) -> Result<bool> {
    if signature.len() != SIGNATURE_SIZE {
        return Err(CryptoError::SignatureError(format!(
            "Invalid signature size: expected {}, got {}",
            SIGNATURE_SIZE,
            signature.len()
        )));
    }

    let key = VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let sig = ed25519_dalek::Signature::from_slice(signature)
        .map_err(|e| CryptoError::SignatureError(e.to_string()))?;

    Ok(key.verify(message, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_keypair() {
        let kp1 = KeyPair::from_seed(&[42u8; 32]);
        let kp2 = KeyPair::from_seed(&[42u8; 32]);
        assert_eq!(kp1.public_key, kp2.public_key);
    }

    #[test]
    fn test_different_labels_different_keys() {
        let kp1 = KeyPair::from_label("alice");
        let kp2 = KeyPair::from_label("bob");
        assert_ne!(kp1.public_key, kp2.public_key);
        assert_ne!(kp1.account_address(), kp2.account_address());
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let data = b"test message";

        let signature = kp.sign(data);
        assert_eq!(signature.len(), SIGNATURE_SIZE);
        assert!(verify(data, &signature, &kp.public_key).unwrap());
    }

    #[test]
    fn test_verify_wrong_data() {
        let kp = KeyPair::from_label("signer");
        let signature = kp.sign(b"original message");
        assert!(!verify(b"wrong message", &signature, &kp.public_key).unwrap());
    }

    #[test]
    fn test_verify_wrong_key() {
        let kp1 = KeyPair::from_label("one");
        let kp2 = KeyPair::from_label("two");
        let signature = kp1.sign(b"message");
        assert!(!verify(b"message", &signature, &kp2.public_key).unwrap());
    }

    #[test]
    fn test_verify_invalid_signature_size() {
        let kp = KeyPair::from_label("short");
        assert!(verify(b"test", &[0u8; 10], &kp.public_key).is_err());
    }

    #[test]
    fn test_public_key_json_is_hex() {
        let kp = KeyPair::from_label("json");
        let json = serde_json::to_string(&kp.public_key).unwrap();
        assert_eq!(json, format!("\"{}\"", hex::encode(kp.public_key.0)));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kp.public_key);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let kp = KeyPair::from_label("debug");
        let shown = format!("{:?}", kp);
        assert!(shown.contains("REDACTED"));
    }
}
