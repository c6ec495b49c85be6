//! What the executor produces
//!
//! [`ExecutionOutput`] is the raw result of one transaction including the
//! post-state; [`Receipt`] is the mined view the chain client hands back.

use crate::errors::{LabError, Result};
use crate::state::InMemoryDB;
use crate::types::{Address, BlockNumber, Gas, Hash, U256};
use alloy_primitives::hex;
use revm::primitives::{ExecutionResult, Output};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,
}

impl From<revm::primitives::Log> for Log {
    fn from(log: revm::primitives::Log) -> Self {
        Self {
            address: log.address,
            topics: log.topics().to_vec(),
            data: log.data.data.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    /// REVERT: state rolled back, unused gas returned
    Revert,
    /// Exceptional halt: out of gas, invalid opcode, bad jump
    Halt,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// Result of executing one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub status: ExecutionStatus,
    /// Return data, or revert data on revert
    pub return_data: Vec<u8>,
    /// Net of refunds
    pub gas_used: Gas,
    pub gas_refunded: Gas,
    pub logs: Vec<Log>,
    pub post_state: InMemoryDB,
    /// Set for creation transactions that succeeded
    pub created_address: Option<Address>,
    /// Every contract created during execution, including by CREATE/CREATE2
    pub created_contracts: Vec<Address>,
    pub halt_reason: Option<String>,
}

impl ExecutionOutput {
    /// Wrap a revm result around the state it produced
    pub fn from_result(result: ExecutionResult, post_state: InMemoryDB) -> Self {
        let mut output = Self {
            status: ExecutionStatus::Success,
            return_data: Vec::new(),
            gas_used: result.gas_used(),
            gas_refunded: 0,
            logs: Vec::new(),
            post_state,
            created_address: None,
            created_contracts: Vec::new(),
            halt_reason: None,
        };

        match result {
            ExecutionResult::Success {
                output: data,
                gas_refunded,
                logs,
                ..
            } => {
                output.gas_refunded = gas_refunded;
                output.logs = logs.into_iter().map(Log::from).collect();
                output.return_data = match data {
                    Output::Call(bytes) => bytes.to_vec(),
                    Output::Create(bytes, address) => {
                        output.created_address = address;
                        bytes.to_vec()
                    }
                };
            }
            ExecutionResult::Revert { output: data, .. } => {
                output.status = ExecutionStatus::Revert;
                output.return_data = data.to_vec();
            }
            ExecutionResult::Halt { reason, .. } => {
                output.status = ExecutionStatus::Halt;
                output.halt_reason = Some(format!("{:?}", reason));
            }
        }

        output
    }

    pub fn post_state_root(&self) -> Result<Hash> {
        self.post_state.compute_state_root()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_revert(&self) -> bool {
        self.status == ExecutionStatus::Revert
    }

    /// Record created contracts in address order
    pub fn with_created_contracts(mut self, mut created: Vec<Address>) -> Self {
        created.sort();
        self.created_contracts = created;
        self
    }

    /// Return data on success, otherwise the matching error
    pub fn into_return_data(self) -> Result<Vec<u8>> {
        match self.status {
            ExecutionStatus::Success => Ok(self.return_data),
            ExecutionStatus::Revert => Err(LabError::ExecutionReverted(format!(
                "0x{}",
                hex::encode(&self.return_data)
            ))),
            ExecutionStatus::Halt => Err(LabError::ExecutionHalted(
                self.halt_reason.unwrap_or_else(|| "unknown".into()),
            )),
        }
    }
}

/// Receipt of a mined transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub block_number: BlockNumber,
    pub from: Address,
    pub to: Option<Address>,
    /// Address of the contract deployed by a creation transaction
    pub contract_address: Option<Address>,
    /// Every contract the transaction created, sorted
    pub created_contracts: Vec<Address>,
    pub status: ExecutionStatus,
    pub gas_used: Gas,
    pub effective_gas_price: U256,
    pub logs: Vec<Log>,
    pub state_root: Hash,
    pub return_data: Vec<u8>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// `gas_used * effective_gas_price`
    pub fn fee(&self) -> U256 {
        U256::from(self.gas_used) * self.effective_gas_price
    }

    /// Turn a failed receipt into an error
    pub fn ensure_success(self) -> Result<Self> {
        match self.status {
            ExecutionStatus::Success => Ok(self),
            ExecutionStatus::Revert => Err(LabError::ExecutionReverted(format!(
                "tx 0x{} reverted with 0x{}",
                hex::encode(self.tx_hash),
                hex::encode(&self.return_data)
            ))),
            ExecutionStatus::Halt => Err(LabError::ExecutionHalted(format!(
                "tx 0x{} halted after {} gas",
                hex::encode(self.tx_hash),
                self.gas_used
            ))),
        }
    }
}
