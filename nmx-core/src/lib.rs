// src/lib.rs

//! # NMX Core
//!
//! Deterministic block-lifecycle state machine of the NMX chain.
//!
//! ## Architecture
//!
//! - **Store**: versioned key/value store with one Merkle subtree per module
//!   and an app hash over the subtree roots
//! - **Modules**: auth, bank, params, NeuroPoS staking, slashing, evidence,
//!   reputation and neural networks, the TruthGPT oracle, DynaContracts,
//!   HyperChains, distribution, upgrade, capability, crisis and genutil
//! - **App**: the driver behind the consensus ABI; it dispatches block hooks
//!   in configured module order and runs transactions through the ante stage
//!
//! Block time from the consensus header is the only clock; map iteration
//! is always in key order.
//!
//! ## Example Usage
//!
//! ```rust
//! use nmx_core::abci::{ConsensusParams, RequestInitChain};
//! use nmx_core::app::{App, AppOptions};
//! use nmx_core::time::Timestamp;
//!
//! let mut app = App::new(AppOptions::default()).unwrap();
//! let resp = app
//!     .init_chain(RequestInitChain {
//!         time: Timestamp::from_unix_secs(1_700_000_000),
//!         chain_id: "nmx-devnet".into(),
//!         consensus_params: ConsensusParams::default(),
//!         validators: vec![],
//!         app_state_bytes: vec![],
//!         initial_height: 1,
//!     })
//!     .unwrap();
//! assert_eq!(resp.app_hash.len(), 32);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod abci;
pub mod ante;
pub mod app;
pub mod codec;
pub mod coins;
pub mod context;
pub mod errors;
pub mod events;
pub mod genesis;
pub mod math;
pub mod modules;
pub mod store;
pub mod time;
pub mod tx;

// Re-export crypto for convenience
pub use nmx_crypto;

pub use crate::app::{App, AppOptions, ModuleOrders};
pub use crate::coins::{Coin, Coins};
pub use crate::context::{BlockHeader, Context, ExecMode};
pub use crate::errors::{ErrorKind, NmxError, Result};
pub use crate::genesis::{AppState, GenesisDoc};
pub use crate::math::{Dec, Int};
pub use crate::time::Timestamp;
pub use crate::tx::{Msg, Tx, TxBuilder};

pub use nmx_crypto::{AccAddress, ConsAddress, KeyPair, PublicKey, ValAddress};

/// Staking and fee denomination
pub const BOND_DENOM: &str = "unmx";

/// Tokens per unit of consensus power
pub const POWER_REDUCTION: i128 = 1_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(BOND_DENOM, "unmx");
        assert_eq!(1_500_000 / POWER_REDUCTION, 1_500);
    }
}

#[cfg(test)]
#[path = "tests/integration.rs"]
mod integration_tests;
