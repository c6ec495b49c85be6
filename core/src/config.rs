//! Devnet configuration
//!
//! Plain serde struct, loaded from JSON. Every field has a default, so a
//! partial file (or `{}`) is a valid configuration.

use crate::errors::{LabError, Result};
use crate::hashing::keccak256;
use crate::input::{BlockEnv, Hardfork};
use crate::types::{Address, Gas, Timestamp, Wei};
use crate::units::parse_amount;
use serde::{Deserialize, Serialize};

/// Truffle's default per-transaction gas limit
pub const DEFAULT_TX_GAS_LIMIT: Gas = 6_721_975;

/// Configuration of the in-process devnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    /// Chain ID reported to contracts
    pub chain_id: u64,
    /// Protocol rules
    pub hardfork: Hardfork,
    /// Number of unlocked dev accounts
    pub accounts: usize,
    /// Starting balance of each dev account, e.g. `"100 ether"`
    pub account_balance: String,
    /// Seed the dev account addresses are derived from
    pub account_seed: String,
    /// Gas limit used when a request does not set one
    pub tx_gas_limit: Gas,
    /// Block gas limit
    pub block_gas_limit: Gas,
    /// Gas price and base fee, e.g. `"1 gwei"`
    pub gas_price: String,
    /// Timestamp of block 1
    pub genesis_timestamp: Timestamp,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            chain_id: 1337,
            hardfork: Hardfork::default(),
            accounts: 10,
            account_balance: "100 ether".into(),
            account_seed: "recovery-lab".into(),
            tx_gas_limit: DEFAULT_TX_GAS_LIMIT,
            block_gas_limit: 30_000_000,
            gas_price: "1 gwei".into(),
            genesis_timestamp: 1_700_000_000,
        }
    }
}

impl DevnetConfig {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.accounts == 0 {
            return Err(LabError::Config("at least one dev account is required".into()));
        }
        if self.tx_gas_limit > self.block_gas_limit {
            return Err(LabError::Config(format!(
                "tx gas limit {} exceeds block gas limit {}",
                self.tx_gas_limit, self.block_gas_limit
            )));
        }
        self.account_balance_wei()?;
        self.gas_price_wei()?;
        Ok(())
    }

    /// Starting balance of each dev account in wei
    pub fn account_balance_wei(&self) -> Result<Wei> {
        parse_amount(&self.account_balance)
            .map_err(|e| LabError::Config(format!("account_balance: {e}")))
    }

    /// Gas price in wei
    pub fn gas_price_wei(&self) -> Result<Wei> {
        parse_amount(&self.gas_price).map_err(|e| LabError::Config(format!("gas_price: {e}")))
    }

    /// Addresses of the dev accounts, in order
    pub fn dev_accounts(&self) -> Vec<Address> {
        (0..self.accounts)
            .map(|i| {
                let hash = keccak256(format!("{}/{}", self.account_seed, i).as_bytes());
                Address::from_slice(&hash[12..])
            })
            .collect()
    }

    /// Environment of the first block
    pub fn genesis_block(&self) -> Result<BlockEnv> {
        Ok(BlockEnv {
            number: 1,
            timestamp: self.genesis_timestamp,
            gas_limit: self.block_gas_limit,
            base_fee: self.gas_price_wei()?,
            chain_id: self.chain_id,
            hardfork: self.hardfork,
            ..Default::default()
        })
    }
}
