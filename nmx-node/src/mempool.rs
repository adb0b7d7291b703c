// src/mempool.rs

//! Transaction mempool for pending transactions.
//!
//! Transactions are held as their encoded bytes, keyed by tx hash and
//! handed out in arrival order.

use nmx_core::nmx_crypto::hash::Hash;
use nmx_core::Tx;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Pool {
    order: VecDeque<Hash>,
    txs: HashMap<Hash, Vec<u8>>,
}

/// Transaction mempool
#[derive(Clone, Debug)]
pub struct Mempool {
    /// Pending transactions
    pool: Arc<RwLock<Pool>>,

    /// Maximum mempool size
    max_size: usize,
}

/// Hash clients poll a transaction by
pub fn tx_hash(bytes: &[u8]) -> crate::Result<Hash> {
    let tx = Tx::decode(bytes).map_err(|e| crate::NodeError::MempoolError(format!("undecodable tx: {}", e)))?;
    Ok(tx.hash()?)
}

impl Mempool {
    /// Creates a new mempool
    pub fn new(max_size: usize) -> Self {
        Self {
            pool: Arc::new(RwLock::new(Pool::default())),
            max_size,
        }
    }

    /// Adds an encoded transaction; a known transaction is not queued twice
    pub async fn add_transaction(&self, bytes: Vec<u8>) -> crate::Result<Hash> {
        let hash = tx_hash(&bytes)?;
        let mut pool = self.pool.write().await;

        if pool.txs.contains_key(&hash) {
            return Ok(hash);
        }
        if pool.txs.len() >= self.max_size {
            return Err(crate::NodeError::MempoolError("Mempool is full".to_string()));
        }

        pool.order.push_back(hash);
        pool.txs.insert(hash, bytes);
        Ok(hash)
    }

    /// Gets a transaction from the mempool
    pub async fn get_transaction(&self, hash: &Hash) -> Option<Vec<u8>> {
        let pool = self.pool.read().await;
        pool.txs.get(hash).cloned()
    }

    /// Whether the transaction is pending
    pub async fn contains(&self, hash: &Hash) -> bool {
        self.pool.read().await.txs.contains_key(hash)
    }

    /// Removes a transaction from the mempool
    pub async fn remove_transaction(&self, hash: &Hash) -> Option<Vec<u8>> {
        let mut pool = self.pool.write().await;
        let removed = pool.txs.remove(hash)?;
        pool.order.retain(|h| h != hash);
        Some(removed)
    }

    /// Takes up to `max` transactions, oldest first
    pub async fn reap(&self, max: usize) -> Vec<(Hash, Vec<u8>)> {
        let mut pool = self.pool.write().await;
        let mut reaped = Vec::with_capacity(max.min(pool.order.len()));
        while reaped.len() < max {
            let Some(hash) = pool.order.pop_front() else {
                break;
            };
            if let Some(bytes) = pool.txs.remove(&hash) {
                reaped.push((hash, bytes));
            }
        }
        reaped
    }

    /// Pending transactions in arrival order, left in place
    pub async fn snapshot(&self) -> Vec<(Hash, Vec<u8>)> {
        let pool = self.pool.read().await;
        pool.order
            .iter()
            .filter_map(|hash| pool.txs.get(hash).map(|bytes| (*hash, bytes.clone())))
            .collect()
    }

    /// Gets mempool size
    pub async fn size(&self) -> usize {
        self.pool.read().await.txs.len()
    }

    /// Clears the mempool
    pub async fn clear(&self) {
        let mut pool = self.pool.write().await;
        pool.order.clear();
        pool.txs.clear();
    }
}
