// src/store/kv.rs

//! Gas-charging handle onto one module's subtree.

use crate::codec;
use crate::errors::Result;
use crate::store::gas::{self, GasMeter};
use crate::store::{full_key, VersionedStore};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Module-scoped view of the working state
///
/// Keys passed in and returned are relative to the module. Every access
/// is charged to the borrowed gas meter.
pub struct KvStore<'a> {
    store: &'a mut VersionedStore,
    gas: &'a mut GasMeter,
    name: &'static str,
    transient: bool,
}

impl<'a> KvStore<'a> {
    /// Persistent scope of store `name`
    pub fn new(store: &'a mut VersionedStore, gas: &'a mut GasMeter, name: &'static str) -> Self {
        Self {
            store,
            gas,
            name,
            transient: false,
        }
    }

    /// Transient scope of store `name`; discarded on commit
    pub fn transient(store: &'a mut VersionedStore, gas: &'a mut GasMeter, name: &'static str) -> Self {
        Self {
            store,
            gas,
            name,
            transient: true,
        }
    }

    /// Store name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Raw value at `key`
    pub fn get_raw(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let full = full_key(self.name, key);
        let value = if self.transient {
            self.store.transient_get(&full)
        } else {
            self.store.get(&full)
        };
        let len = key.len() + value.as_ref().map(|v| v.len()).unwrap_or(0);
        self.gas.consume(gas::read_cost(len), "read")?;
        Ok(value)
    }

    /// Decoded value at `key`
    pub fn get<T: DeserializeOwned>(&mut self, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether `key` holds a value
    pub fn has(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.get_raw(key)?.is_some())
    }

    /// Writes raw bytes
    pub fn set_raw(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.gas
            .consume(gas::write_cost(key.len() + value.len()), "write")?;
        let full = full_key(self.name, key);
        if self.transient {
            self.store.transient_set(full, value);
        } else {
            self.store.set(full, value);
        }
        Ok(())
    }

    /// Encodes and writes a value
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let bytes = codec::encode(value)?;
        self.set_raw(key, bytes)
    }

    /// Deletes `key`
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.gas.consume(gas::DELETE_COST, "delete")?;
        let full = full_key(self.name, key);
        if self.transient {
            self.store.transient_delete(&full);
        } else {
            self.store.delete(full);
        }
        Ok(())
    }

    fn scan(&mut self, prefix: &[u8], reverse: bool) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let full_prefix = full_key(self.name, prefix);
        let entries = if self.transient {
            self.store.transient_iter(&full_prefix, reverse)
        } else {
            self.store.iter(&full_prefix, reverse)
        };
        self.gas.consume(
            gas::ITER_COST_PER_ITEM.saturating_mul(entries.len() as u64),
            "iterate",
        )?;
        let strip = self.name.len() + 1;
        Ok(entries
            .into_iter()
            .map(|(k, v)| (k[strip..].to_vec(), v))
            .collect())
    }

    /// Raw entries under `prefix` in ascending key order
    pub fn iter_raw(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scan(prefix, false)
    }

    /// Raw entries under `prefix` in descending key order
    pub fn iter_raw_rev(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scan(prefix, true)
    }

    /// Decoded entries under `prefix` in ascending key order
    pub fn iter<T: DeserializeOwned>(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        self.scan(prefix, false)?
            .into_iter()
            .map(|(k, v)| Ok((k, codec::decode(&v)?)))
            .collect()
    }

    /// Decoded values under `prefix` in ascending key order
    pub fn values<T: DeserializeOwned>(&mut self, prefix: &[u8]) -> Result<Vec<T>> {
        Ok(self.iter(prefix)?.into_iter().map(|(_, v)| v).collect())
    }

    /// Decoded entries under `prefix` in descending key order
    pub fn iter_rev<T: DeserializeOwned>(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        self.scan(prefix, true)?
            .into_iter()
            .map(|(k, v)| Ok((k, codec::decode(&v)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NmxError;

    #[test]
    fn test_typed_roundtrip_and_gas() {
        let mut store = VersionedStore::new(&["bank"], 0);
        let mut meter = GasMeter::infinite();
        let mut kv = KvStore::new(&mut store, &mut meter, "bank");
        kv.set(b"k", &42u64).unwrap();
        assert_eq!(kv.get::<u64>(b"k").unwrap(), Some(42));
        assert!(!kv.has(b"other").unwrap());
        // write: 2000 + 30*(1+8); reads: 1000 + 3*(1+8), 1000 + 3*5
        assert_eq!(meter.consumed(), 2_270 + 1_027 + 1_015);
    }

    #[test]
    fn test_keys_are_module_relative() {
        let mut store = VersionedStore::new(&["bank", "staking"], 0);
        let mut meter = GasMeter::infinite();
        KvStore::new(&mut store, &mut meter, "bank").set(&[1, 2], &1u8).unwrap();
        KvStore::new(&mut store, &mut meter, "staking").set(&[1, 3], &2u8).unwrap();

        let entries = KvStore::new(&mut store, &mut meter, "bank").iter::<u8>(&[1]).unwrap();
        assert_eq!(entries, vec![(vec![1, 2], 1u8)]);
    }

    #[test]
    fn test_out_of_gas() {
        let mut store = VersionedStore::new(&["bank"], 0);
        let mut meter = GasMeter::new(1_500);
        let mut kv = KvStore::new(&mut store, &mut meter, "bank");
        let err = kv.set(b"k", &1u64).unwrap_err();
        assert!(matches!(err, NmxError::OutOfGas { .. }));
    }

    #[test]
    fn test_transient_scope_isolated() {
        let mut store = VersionedStore::new(&["bank"], 0);
        let mut meter = GasMeter::infinite();
        KvStore::transient(&mut store, &mut meter, "bank").set(b"t", &5u32).unwrap();
        assert!(KvStore::new(&mut store, &mut meter, "bank").get::<u32>(b"t").unwrap().is_none());
        assert_eq!(
            KvStore::transient(&mut store, &mut meter, "bank").get::<u32>(b"t").unwrap(),
            Some(5)
        );
    }
}
