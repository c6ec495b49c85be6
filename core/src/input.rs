//! What the executor consumes
//!
//! A transaction, the block it lands in and the state it runs against. The
//! hash of an [`ExecutionInput`] doubles as the devnet's transaction hash.

use crate::errors::{LabError, Result};
use crate::hashing::hash_struct;
use crate::state::InMemoryDB;
use crate::types::{Address, BlockNumber, Gas, Hash, Nonce, Timestamp, Wei, U256};
use core::fmt;
use core::str::FromStr;
use revm::primitives::SpecId;
use serde::{Deserialize, Serialize};

/// Protocol rules the devnet executes under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hardfork {
    /// EIP-1559 fees, SELFDESTRUCT deletes accounts
    London,
    /// Adds PUSH0 and warm coinbase
    Shanghai,
    /// EIP-6780: SELFDESTRUCT only deletes contracts created in the same transaction
    #[default]
    Cancun,
}

impl Hardfork {
    pub fn spec_id(self) -> SpecId {
        match self {
            Hardfork::London => SpecId::LONDON,
            Hardfork::Shanghai => SpecId::SHANGHAI,
            Hardfork::Cancun => SpecId::CANCUN,
        }
    }
}

impl fmt::Display for Hardfork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hardfork::London => "london",
            Hardfork::Shanghai => "shanghai",
            Hardfork::Cancun => "cancun",
        };
        f.write_str(name)
    }
}

impl FromStr for Hardfork {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "london" => Ok(Hardfork::London),
            "shanghai" => Ok(Hardfork::Shanghai),
            "cancun" | "dencun" => Ok(Hardfork::Cancun),
            other => Err(LabError::Config(format!("unknown hardfork `{other}`"))),
        }
    }
}

/// Header fields visible to the EVM while a transaction runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEnv {
    pub number: BlockNumber,
    pub timestamp: Timestamp,
    pub gas_limit: Gas,
    pub coinbase: Address,
    /// EIP-1559 base fee; the devnet charges exactly this per gas
    pub base_fee: Wei,
    pub prev_randao: Hash,
    pub chain_id: u64,
    pub hardfork: Hardfork,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self {
            number: 1,
            timestamp: 1_700_000_000,
            gas_limit: 30_000_000,
            coinbase: Address::ZERO,
            base_fee: U256::from(1_000_000_000u64),
            prev_randao: Hash::ZERO,
            chain_id: 1337,
            hardfork: Hardfork::default(),
        }
    }
}

impl BlockEnv {
    pub fn with_hardfork(self, hardfork: Hardfork) -> Self {
        Self { hardfork, ..self }
    }

    /// Successor block: number and timestamp both advance by one
    pub fn next(&self) -> Self {
        Self {
            number: self.number + 1,
            timestamp: self.timestamp + 1,
            ..self.clone()
        }
    }

    /// Same block with a zero base fee, for `eth_call`-style runs
    pub fn without_fees(&self) -> Self {
        Self {
            base_fee: U256::ZERO,
            ..self.clone()
        }
    }
}

/// A fully specified transaction: nonce and gas price already resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub caller: Address,
    /// `None` runs `data` as init code
    pub to: Option<Address>,
    pub value: Wei,
    pub data: Vec<u8>,
    pub gas_limit: Gas,
    pub gas_price: Wei,
    pub nonce: Nonce,
}

impl Default for TxInput {
    fn default() -> Self {
        Self {
            caller: Address::ZERO,
            to: None,
            value: U256::ZERO,
            data: Vec::new(),
            gas_limit: 1_000_000,
            gas_price: U256::from(1_000_000_000u64),
            nonce: 0,
        }
    }
}

impl TxInput {
    pub fn call(caller: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            caller,
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    /// Plain value transfer at the intrinsic 21k gas
    pub fn transfer(caller: Address, to: Address, value: Wei) -> Self {
        Self {
            caller,
            to: Some(to),
            value,
            gas_limit: 21_000,
            ..Default::default()
        }
    }

    pub fn create(caller: Address, init_code: Vec<u8>) -> Self {
        Self {
            caller,
            data: init_code,
            ..Default::default()
        }
    }

    pub fn with_gas_limit(self, gas_limit: Gas) -> Self {
        Self { gas_limit, ..self }
    }

    pub fn with_nonce(self, nonce: Nonce) -> Self {
        Self { nonce, ..self }
    }
}

/// One transaction plus everything it needs to replay identically
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionInput {
    pub block: BlockEnv,
    pub tx: TxInput,
    pub pre_state: InMemoryDB,
}

impl ExecutionInput {
    pub fn new(block: BlockEnv, tx: TxInput, pre_state: InMemoryDB) -> Self {
        Self {
            block,
            tx,
            pre_state,
        }
    }

    /// Deterministic id: the same block, transaction and state hash the same
    pub fn hash(&self) -> Result<Hash> {
        hash_struct(self)
    }
}
