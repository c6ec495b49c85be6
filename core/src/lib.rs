//! # Recovery Lab Core
//!
//! Predict where a factory deploys its contracts, then drain a "lost" one.
//!
//! A `Recovery` factory deploys a `SimpleToken` through `CREATE` and forgets
//! the address. Because `CREATE` addresses depend only on the deployer and
//! its nonce, the token can be found again without logs, funded, and
//! self-destructed to pull the ether back out.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ RecoveryScenario │ ── deploy, derive, generate, fund, destroy
//! └────────┬─────────┘
//!          │  RecoveryContract / SimpleTokenContract (sol! bindings)
//!          ▼
//! ┌──────────────────┐
//! │   ChainClient    │ ── async, JSON-RPC shaped
//! └────────┬─────────┘
//!          │  Devnet: dev accounts, automine
//!          ▼
//! ┌──────────────────┐
//! │     Executor     │ ── revm, hardfork-aware SELFDESTRUCT
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    InMemoryDB    │ ── accounts, code, storage
//! └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recovery_lab_core::prelude::*;
//!
//! let devnet = Devnet::new(DevnetConfig::default())?;
//! let report = RecoveryScenario::default().run(&devnet).await?;
//! assert_eq!(report.token, first_create_address(report.recovery));
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (Address, Hash, U256)
//! - [`errors`] - Error types and Result alias
//! - [`hashing`] - Keccak256 helpers
//! - [`derivation`] - CREATE / CREATE2 address derivation
//! - [`units`] - Ether unit conversion
//! - [`state`] - In-memory state database
//! - [`input`] / [`output`] - Execution input, output and receipts
//! - [`evm`] - revm-backed executor
//! - [`asm`] - Tiny EVM assembler
//! - [`contracts`] - Recovery and SimpleToken bytecode and handles
//! - [`chain`] - Chain client trait and the in-process devnet
//! - [`config`] - Devnet configuration
//! - [`scenario`] - The end-to-end drain

pub mod asm;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod derivation;
pub mod errors;
pub mod evm;
pub mod hashing;
pub mod input;
pub mod output;
pub mod scenario;
pub mod state;
pub mod types;
pub mod units;

// Re-exports for convenience
pub use chain::{ChainClient, Devnet, TxRequest};
pub use config::DevnetConfig;
pub use contracts::{RecoveryContract, SimpleTokenContract};
pub use derivation::{create2_address, create_address, first_create_address};
pub use errors::{LabError, Result};
pub use evm::{ExecutionBuilder, Executor};
pub use hashing::{hash_struct, keccak256};
pub use input::{BlockEnv, ExecutionInput, Hardfork, TxInput};
pub use output::{ExecutionOutput, ExecutionStatus, Log, Receipt};
pub use scenario::{locate_created_contracts, RecoveryScenario, ScenarioReport};
pub use state::{AccountState, InMemoryDB};
pub use types::{Address, Bytes, Gas, Hash, Nonce, Wei, U256};
pub use units::{format_ether, parse_amount, to_wei};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        create_address, first_create_address, format_ether, parse_amount, to_wei, Address,
        ChainClient, Devnet, DevnetConfig, Hardfork, Hash, LabError, Nonce, Receipt, RecoveryContract,
        RecoveryScenario, Result, ScenarioReport, SimpleTokenContract, TxRequest, Wei, U256,
    };
}
