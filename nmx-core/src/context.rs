// src/context.rs

//! Execution context handed to every keeper call.
//!
//! A context bundles the working store, the current block header, a gas
//! meter and the event sink. Block time from the header is the only clock
//! the state machine ever reads.

use crate::events::Event;
use crate::store::{GasMeter, KvStore, VersionedStore};
use crate::time::Timestamp;
use nmx_crypto::hash::{hash_chunks, Hash};
use nmx_crypto::ConsAddress;
use serde::{Deserialize, Serialize};

/// Store name of the per-block transient scope written by the driver
pub const BLOCK_SCOPE: &str = "abci";

/// Header fields the state machine depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain identifier
    pub chain_id: String,
    /// Block height
    pub height: u64,
    /// Block time from consensus
    pub time: Timestamp,
    /// Consensus address of the proposer
    pub proposer: ConsAddress,
}

/// What the context is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// InitChain
    Genesis,
    /// BeginBlock hooks
    BeginBlock,
    /// Mempool admission
    Check,
    /// Transaction execution
    Deliver,
    /// EndBlock hooks
    EndBlock,
    /// Read-only query
    Query,
}

/// Per-call execution context
pub struct Context<'a> {
    store: &'a mut VersionedStore,
    header: BlockHeader,
    mode: ExecMode,
    gas: GasMeter,
    events: Vec<Event>,
    tx_hash: Hash,
    msg_index: u32,
    id_nonce: u32,
}

impl<'a> Context<'a> {
    /// Creates a context with an infinite gas meter
    pub fn new(store: &'a mut VersionedStore, header: BlockHeader, mode: ExecMode) -> Self {
        Self {
            store,
            header,
            mode,
            gas: GasMeter::infinite(),
            events: Vec::new(),
            tx_hash: [0u8; 32],
            msg_index: 0,
            id_nonce: 0,
        }
    }

    /// Current header
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Current block height
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Current block time
    pub fn block_time(&self) -> Timestamp {
        self.header.time
    }

    /// Chain identifier
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    /// Execution mode
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Whether this is mempool admission
    pub fn is_check(&self) -> bool {
        self.mode == ExecMode::Check
    }

    /// Gas-charging view of store `name`
    pub fn kv(&mut self, name: &'static str) -> KvStore<'_> {
        KvStore::new(&mut *self.store, &mut self.gas, name)
    }

    /// Gas-charging view of the transient scope of `name`
    pub fn transient(&mut self, name: &'static str) -> KvStore<'_> {
        KvStore::transient(&mut *self.store, &mut self.gas, name)
    }

    /// Replaces the gas meter
    pub fn set_gas_meter(&mut self, meter: GasMeter) {
        self.gas = meter;
    }

    /// Gas meter
    pub fn gas_meter(&self) -> &GasMeter {
        &self.gas
    }

    /// Mutable gas meter
    pub fn gas_meter_mut(&mut self) -> &mut GasMeter {
        &mut self.gas
    }

    /// Appends an event
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Events emitted so far
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drops events past `len`
    pub fn truncate_events(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Takes all emitted events
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Binds the transaction whose messages run next
    pub fn set_tx(&mut self, tx_hash: Hash) {
        self.tx_hash = tx_hash;
        self.msg_index = 0;
        self.id_nonce = 0;
    }

    /// Binds the index of the message that runs next
    pub fn set_msg_index(&mut self, index: u32) {
        self.msg_index = index;
        self.id_nonce = 0;
    }

    /// Hash of the transaction being executed
    pub fn tx_hash(&self) -> Hash {
        self.tx_hash
    }

    /// Content-derived identifier `<kind>-<height>-<hex8>`
    ///
    /// The suffix is the first four bytes of `H(tx_hash || msg_index)`;
    /// further ids within the same message also mix in a counter.
    pub fn derive_id(&mut self, kind: &str) -> String {
        let index = self.msg_index.to_be_bytes();
        let nonce = self.id_nonce.to_be_bytes();
        let digest = if self.id_nonce == 0 {
            hash_chunks(&[&self.tx_hash, &index])
        } else {
            hash_chunks(&[&self.tx_hash, &index, &nonce])
        };
        self.id_nonce += 1;
        format!("{}-{}-{}", kind, self.header.height, hex::encode(&digest[..4]))
    }

    /// Saves the working state before a fallible step
    pub fn checkpoint(&mut self) {
        self.store.checkpoint();
    }

    /// Restores the working state saved by [`Context::checkpoint`]
    pub fn rollback(&mut self) -> crate::Result<()> {
        self.store.rollback()
    }

    /// Keeps the writes made since the last checkpoint
    pub fn release_checkpoint(&mut self) -> crate::Result<()> {
        self.store.release_checkpoint()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Header at `height` with time `height * 5s`
    pub fn create_test_header(height: u64) -> BlockHeader {
        BlockHeader {
            chain_id: "nmx-test".to_string(),
            height,
            time: Timestamp::from_unix_secs(1_700_000_000 + height as i64 * 5),
            proposer: ConsAddress::new([0u8; 20]),
        }
    }

    /// Store with every module subtree registered
    pub fn create_test_store() -> VersionedStore {
        VersionedStore::new(crate::store::names::ALL, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_derive_id_format() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(7), ExecMode::Deliver);
        ctx.set_tx([1u8; 32]);
        let first = ctx.derive_id("nn");
        assert!(first.starts_with("nn-7-"));
        assert_eq!(first.len(), "nn-7-".len() + 8);
        let second = ctx.derive_id("td");
        assert_ne!(&first[5..], &second[5..]);

        ctx.set_msg_index(1);
        let other_msg = ctx.derive_id("nn");
        assert_ne!(first, other_msg);
    }

    #[test]
    fn test_derive_id_deterministic() {
        let mut a = create_test_store();
        let mut b = create_test_store();
        let mut ctx_a = Context::new(&mut a, create_test_header(3), ExecMode::Deliver);
        let mut ctx_b = Context::new(&mut b, create_test_header(3), ExecMode::Deliver);
        ctx_a.set_tx([9u8; 32]);
        ctx_b.set_tx([9u8; 32]);
        assert_eq!(ctx_a.derive_id("query"), ctx_b.derive_id("query"));
    }

    #[test]
    fn test_events_truncate() {
        let mut store = create_test_store();
        let mut ctx = Context::new(&mut store, create_test_header(1), ExecMode::Deliver);
        ctx.emit(Event::new("a"));
        ctx.emit(Event::new("b"));
        ctx.truncate_events(1);
        assert_eq!(ctx.take_events().len(), 1);
        assert!(ctx.events().is_empty());
    }
}
