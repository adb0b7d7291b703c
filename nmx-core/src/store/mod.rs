// src/store/mod.rs

//! Versioned, Merkleised key-value store.
//!
//! One flat key space is split into named module subtrees (`staking/...`,
//! `bank/...`). Writes of the current block collect in an overlay on top
//! of the latest committed snapshot; `commit` folds the overlay into a new
//! immutable snapshot and computes the app hash.

pub mod gas;
pub mod kv;
pub mod merkle;
pub mod versioned;

pub use gas::GasMeter;
pub use kv::KvStore;
pub use merkle::{MerkleProof, StoreProof};
pub use versioned::{CommitInfo, Snapshot, VersionedStore};

/// Store names of every module subtree
pub mod names {
    #![allow(missing_docs)]

    pub const AUTH: &str = "auth";
    pub const BANK: &str = "bank";
    pub const STAKING: &str = "staking";
    pub const SLASHING: &str = "slashing";
    pub const GOV: &str = "gov";
    pub const PARAMS: &str = "params";
    pub const UPGRADE: &str = "upgrade";
    pub const EVIDENCE: &str = "evidence";
    pub const CAPABILITY: &str = "capability";
    pub const NEUROPOS: &str = "neuropos";
    pub const TRUTHGPT: &str = "truthgpt";
    pub const DEAI: &str = "deai";
    pub const DYNACONTRACTS: &str = "dynacontracts";
    pub const HYPERCHAINS: &str = "hyperchains";
    pub const DISTRIBUTION: &str = "distribution";
    pub const CRISIS: &str = "crisis";

    /// Every registered store, including the reserved `gov` and `deai`
    pub const ALL: &[&str] = &[
        AUTH,
        BANK,
        CAPABILITY,
        CRISIS,
        DEAI,
        DISTRIBUTION,
        DYNACONTRACTS,
        EVIDENCE,
        GOV,
        HYPERCHAINS,
        NEUROPOS,
        PARAMS,
        SLASHING,
        STAKING,
        TRUTHGPT,
        UPGRADE,
    ];
}

/// Separator between the store name and the module key
pub const NAME_SEPARATOR: u8 = b'/';

/// Full key of `key` inside store `name`
pub fn full_key(name: &str, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1 + key.len());
    out.extend_from_slice(name.as_bytes());
    out.push(NAME_SEPARATOR);
    out.extend_from_slice(key);
    out
}

/// Splits a full key into store name and module key
pub fn split_key(full: &[u8]) -> Option<(&str, &[u8])> {
    let pos = full.iter().position(|b| *b == NAME_SEPARATOR)?;
    let name = std::str::from_utf8(&full[..pos]).ok()?;
    Some((name, &full[pos + 1..]))
}

/// Appends `part` preceded by its one-byte length
///
/// Used for variable-length ids inside composite keys so that one id is
/// never a key prefix of another.
pub fn push_length_prefixed(out: &mut Vec<u8>, part: &[u8]) {
    out.push(part.len().min(u8::MAX as usize) as u8);
    out.extend_from_slice(&part[..part.len().min(u8::MAX as usize)]);
}

/// Builds a key from a family byte followed by raw parts
pub fn key(family: u8, parts: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![family];
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Family byte followed by a length-prefixed string id
pub fn id_key(family: u8, id: &str) -> Vec<u8> {
    let mut out = vec![family];
    push_length_prefixed(&mut out, id.as_bytes());
    out
}

/// Smallest key greater than every key starting with `prefix`
///
/// `None` when no such key exists (empty prefix or all `0xff`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_sorted() {
        let mut sorted = names::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, names::ALL);
    }

    #[test]
    fn test_full_and_split_key() {
        let full = full_key("bank", &[0x02, 0xaa]);
        assert_eq!(full, b"bank/\x02\xaa".to_vec());
        let (name, key) = split_key(&full).unwrap();
        assert_eq!(name, "bank");
        assert_eq!(key, &[0x02, 0xaa]);
    }

    #[test]
    fn test_id_keys_do_not_nest() {
        let short = id_key(0x07, "nn-1");
        let long = id_key(0x07, "nn-12");
        assert!(!long.starts_with(&short));
        assert_eq!(key(0x02, &[b"ab", b"c"]), vec![0x02, b'a', b'b', b'c']);
    }

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[0x01, 0x02]), Some(vec![0x01, 0x03]));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(&[]), None);
    }
}
