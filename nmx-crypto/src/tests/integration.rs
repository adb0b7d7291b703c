// tests/integration.rs

//! Integration tests for the NMX cryptography module.
//!
//! Exercises the flow a transaction goes through: key derivation,
//! address encoding, signing a canonical payload and hashing it into
//! a Merkle leaf.

use crate::address::{self, AccAddress, AddressRole, ConsAddress, ValAddress};
use crate::hash;
use crate::keys::{self, KeyPair};
use crate::{ADDRESS_SIZE, HASH_SIZE, SIGNATURE_SIZE};

#[test]
fn test_complete_signing_flow() {
    // 1. Derive a keypair and its addresses
    let keypair = KeyPair::from_label("validator-1");
    let account = keypair.account_address();
    let operator: ValAddress = account.into();
    let consensus = keypair.public_key.consensus_address();

    assert_eq!(account.as_bytes().len(), ADDRESS_SIZE);
    assert_eq!(operator.as_bytes(), consensus.as_bytes());

    // 2. Encode each role under its own prefix
    let acc_str = account.to_string();
    let val_str = operator.to_string();
    let cons_str = consensus.to_string();
    assert!(acc_str.starts_with("nmx1"));
    assert!(val_str.starts_with("nmxvaloper1"));
    assert!(cons_str.starts_with("nmxvalcons1"));

    // 3. Parse back
    assert_eq!(acc_str.parse::<AccAddress>().unwrap(), account);
    assert_eq!(val_str.parse::<ValAddress>().unwrap(), operator);
    assert_eq!(cons_str.parse::<ConsAddress>().unwrap(), consensus);

    // 4. Sign and verify a payload
    let payload = b"chain-id|account|sequence|fee";
    let signature = keypair.sign(payload);
    assert_eq!(signature.len(), SIGNATURE_SIZE);
    assert!(keys::verify(payload, &signature, &keypair.public_key).unwrap());

    // 5. Hash the signed payload into a leaf
    let tx_hash = hash::blake3_hash(&signature);
    let leaf = hash::merkle_leaf(&tx_hash, payload);
    assert_eq!(leaf.len(), HASH_SIZE);
    assert_ne!(leaf, tx_hash);
}

#[test]
fn test_tampered_signature_rejected() {
    let keypair = KeyPair::from_label("tamper");
    let mut signature = keypair.sign(b"amount=100");
    signature[0] ^= 0xff;
    assert!(!keys::verify(b"amount=100", &signature, &keypair.public_key).unwrap_or(false));
}

#[test]
fn test_cross_role_parsing_fails() {
    let keypair = KeyPair::from_label("cross");
    let cons = keypair.public_key.consensus_address().to_string();
    assert!(cons.parse::<ValAddress>().is_err());
    assert!(cons.parse::<AccAddress>().is_err());

    let pubkey = address::encode_pubkey(AddressRole::Validator, &keypair.public_key).unwrap();
    assert!(address::decode_pubkey(AddressRole::Account, &pubkey).is_err());
}

#[test]
fn test_merkle_pair_of_leaves() {
    let left = hash::merkle_leaf(b"bank/balance/a", b"100");
    let right = hash::merkle_leaf(b"bank/balance/b", b"200");
    let root = hash::merkle_inner(&left, &right);
    assert_eq!(root, hash::merkle_inner(&left, &right));
    assert_ne!(root, hash::merkle_inner(&right, &left));
}
