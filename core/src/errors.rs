/*
Error types for recovery-lab
Covers chain execution, encoding, configuration and scenario checks.
*/

use crate::types::Address;
use thiserror::Error;

/// Everything that can go wrong between building a transaction and checking
/// what it did
#[derive(Debug, Error)]
pub enum LabError {
    /// Sender is not one of the devnet's unlocked accounts
    #[error("account not found: {0}")]
    AccountNotFound(Address),

    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    /// Exceptional halt, or an EVM failure that is neither a rejection nor a
    /// database error
    #[error("execution halted: {0}")]
    ExecutionHalted(String),

    /// Assembler failure: unresolved label, jump target out of PUSH2 range
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),

    /// bincode or JSON
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Rejected before execution: nonce mismatch, cannot pay for gas and value
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Return data did not match the expected ABI type
    #[error("abi decode error: {0}")]
    AbiDecode(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A scenario check did not hold
    #[error("check `{check}` failed: expected {expected}, got {actual}")]
    AssertionFailed {
        check: &'static str,
        expected: String,
        actual: String,
    },
}

/// Result type for recovery-lab operations
pub type Result<T> = core::result::Result<T, LabError>;

impl From<bincode::Error> for LabError {
    fn from(err: bincode::Error) -> Self {
        LabError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for LabError {
    fn from(err: serde_json::Error) -> Self {
        LabError::SerializationError(err.to_string())
    }
}

impl From<alloy_sol_types::Error> for LabError {
    fn from(err: alloy_sol_types::Error) -> Self {
        LabError::AbiDecode(err.to_string())
    }
}

impl From<alloy_primitives::utils::UnitsError> for LabError {
    fn from(err: alloy_primitives::utils::UnitsError) -> Self {
        LabError::InvalidAmount(err.to_string())
    }
}

/// Fail with [`LabError::AssertionFailed`] unless `actual == expected`
pub fn ensure_eq<T>(check: &'static str, expected: T, actual: T) -> Result<()>
where
    T: PartialEq + core::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(LabError::AssertionFailed {
            check,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: LabError = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert!(matches!(err, LabError::SerializationError(_)));

        let err: LabError = alloy_primitives::utils::parse_units("lots", "ether")
            .unwrap_err()
            .into();
        assert!(matches!(err, LabError::InvalidAmount(_)));

        let err = LabError::AccountNotFound(Address::repeat_byte(0xaa));
        assert!(err.to_string().to_lowercase().starts_with("account not found: 0xaa"));
    }

    #[test]
    fn test_ensure_eq() {
        assert!(ensure_eq("same", 1u64, 1u64).is_ok());

        let err = ensure_eq("token balance", 100_000u64, 0u64).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("token balance"));
        assert!(msg.contains("100000"));
    }
}
