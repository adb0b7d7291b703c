// src/codec.rs

//! Canonical binary encoding.
//!
//! Every value written to the store, every transaction and every sign
//! document goes through this codec: bincode with big-endian fixed-width
//! integers, rejecting trailing bytes so that each value has exactly one
//! accepted encoding.

use crate::errors::Result;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encodes a value canonically
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(options().serialize(value)?)
}

/// Decodes a canonically encoded value
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(options().deserialize(bytes)?)
}
