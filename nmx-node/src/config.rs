// src/config.rs

//! Node configuration.

use nmx_core::ante::AnteOptions;
use nmx_core::app::{AppOptions, ModuleOrders};
use nmx_core::Dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the committed store snapshot inside the data directory
pub const SNAPSHOT_FILE: &str = "store.snapshot";

/// File name of the node state inside the data directory
pub const STATE_FILE: &str = "node_state.json";

/// Complete node configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain and application settings
    pub chain: ChainConfig,

    /// Mempool configuration
    pub mempool: MempoolConfig,

    /// Solo block production
    pub consensus: ConsensusConfig,

    /// Logging
    pub log: LogConfig,
}

/// Chain and application settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Expected chain id; empty accepts the genesis chain id
    #[serde(default)]
    pub chain_id: String,

    /// Genesis document
    pub genesis_file: PathBuf,

    /// Directory holding the snapshot and node state
    pub data_dir: PathBuf,

    /// Committed versions kept in memory, 0 keeps all
    #[serde(default)]
    pub keep_recent: u64,

    /// Blocks between full invariant sweeps, 0 disables them
    #[serde(default)]
    pub inv_check_period: u64,

    /// Module dispatch orders
    #[serde(default)]
    pub orders: ModuleOrders,

    /// Stop cleanly after committing this height, 0 runs forever
    #[serde(default)]
    pub halt_height: u64,
}

/// Mempool configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolConfig {
    /// Maximum pending transactions
    pub max_size: usize,

    /// Minimum fee per unit of gas accepted at admission
    #[serde(default)]
    pub min_gas_price: Dec,
}

/// Solo block production
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Milliseconds between blocks
    pub block_interval_ms: u64,

    /// Transactions taken from the mempool per block
    pub max_txs_per_block: usize,
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                chain_id: String::new(),
                genesis_file: PathBuf::from("genesis.json"),
                data_dir: PathBuf::from(".nmx-data"),
                keep_recent: 100,
                inv_check_period: 0,
                orders: ModuleOrders::default(),
                halt_height: 0,
            },
            mempool: MempoolConfig {
                max_size: 5_000,
                min_gas_price: Dec::ZERO,
            },
            consensus: ConsensusConfig {
                block_interval_ms: 5_000,
                max_txs_per_block: 1_000,
            },
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl NodeConfig {
    /// Loads configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&contents)
            .map_err(|e| crate::NodeError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to file
    pub fn save_to_file(&self, path: &Path) -> crate::Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| crate::NodeError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Rejects settings the node cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |msg: &str| Err(crate::NodeError::ConfigError(msg.to_string()));
        if self.chain.data_dir.as_os_str().is_empty() {
            return invalid("data_dir must be set");
        }
        if self.mempool.max_size == 0 {
            return invalid("mempool max_size must be positive");
        }
        if self.mempool.min_gas_price.is_negative() {
            return invalid("min_gas_price must not be negative");
        }
        if self.consensus.block_interval_ms == 0 {
            return invalid("block_interval_ms must be positive");
        }
        if self.consensus.max_txs_per_block == 0 {
            return invalid("max_txs_per_block must be positive");
        }
        if self.log.level.trim().is_empty() {
            return invalid("log level must be set");
        }
        Ok(())
    }

    /// Application settings derived from this configuration
    pub fn app_options(&self, chain_id: &str) -> AppOptions {
        AppOptions {
            chain_id: chain_id.to_string(),
            keep_recent: self.chain.keep_recent,
            inv_check_period: self.chain.inv_check_period,
            orders: self.chain.orders.clone(),
            ante: AnteOptions {
                min_gas_price: self.mempool.min_gas_price,
            },
        }
    }

    /// Interval between solo blocks
    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.consensus.block_interval_ms)
    }

    /// Path of the committed store snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.chain.data_dir.join(SNAPSHOT_FILE)
    }

    /// Path of the node state file
    pub fn state_path(&self) -> PathBuf {
        self.chain.data_dir.join(STATE_FILE)
    }
}
