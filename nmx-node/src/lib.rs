// src/lib.rs

//! # NMX Node
//!
//! Single-validator host around the NMX application.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             NMX Node                    │
//! ├─────────────────────────────────────────┤
//! │  Block loop  │  Mempool  │  Config      │
//! ├──────────────┴───────────┴──────────────┤
//! │     Application (BeginBlock, DeliverTx, │
//! │     EndBlock, Commit, Query)            │
//! │            (nmx-core)                   │
//! ├─────────────────────────────────────────┤
//! │         Cryptography Layer              │
//! │         (nmx-crypto)                    │
//! └─────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod errors;
pub mod config;
pub mod mempool;
pub mod node;

// Re-export commonly used types
pub use crate::errors::{NodeError, Result};
pub use crate::config::NodeConfig;
pub use crate::mempool::Mempool;
pub use crate::node::{BlockSummary, CommittedBlock, NmxNode};

/// Node version
pub const NODE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_version() {
        assert!(!NODE_VERSION.is_empty());
    }
}
