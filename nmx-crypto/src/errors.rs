// src/errors.rs

//! Error types for cryptographic operations.
//!
//! Covers hashing helpers, Ed25519 keys and signatures, and the
//! Bech32 address codec.

use std::fmt;

/// Main error type for cryptographic operations
#[derive(Debug, Clone, PartialEq)]
pub enum CryptoError {
    /// Invalid key format or size
    InvalidKey(String),

    /// Hash operation failed
    HashError(String),

    /// Signature generation or verification failed
    SignatureError(String),

    /// Address has the wrong length or payload
    InvalidAddress(String),

    /// Bech32 human-readable part does not match the expected role
    WrongPrefix {
        /// Prefix required by the address role
        expected: String,
        /// Prefix found in the encoded string
        found: String,
    },

    /// Bech32 encoding or decoding failed
    Bech32Error(String),

    /// Invalid input data
    InvalidInput(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            CryptoError::HashError(msg) => write!(f, "Hash error: {}", msg),
            CryptoError::SignatureError(msg) => write!(f, "Signature error: {}", msg),
            CryptoError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            CryptoError::WrongPrefix { expected, found } => {
                write!(f, "Wrong address prefix: expected {}, found {}", expected, found)
            }
            CryptoError::Bech32Error(msg) => write!(f, "Bech32 error: {}", msg),
            CryptoError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

impl From<bech32::Error> for CryptoError {
    fn from(err: bech32::Error) -> Self {
        CryptoError::Bech32Error(err.to_string())
    }
}

/// Result type alias for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryptoError::InvalidKey("key too short".to_string());
        assert_eq!(format!("{}", err), "Invalid key: key too short");
    }

    #[test]
    fn test_wrong_prefix_display() {
        let err = CryptoError::WrongPrefix {
            expected: "nmxvaloper".to_string(),
            found: "nmx".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Wrong address prefix: expected nmxvaloper, found nmx"
        );
    }

    #[test]
    fn test_error_clone() {
        let err1 = CryptoError::SignatureError("failed".to_string());
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
