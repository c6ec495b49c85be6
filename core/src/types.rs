//! Shared primitive types
//!
//! Everything on the wire is an alloy-primitives type; the aliases only say
//! which `u64` or `U256` is meant where.

pub use alloy_primitives::{Address, B256, Bytes, U256};

/// Keccak256 digest: tx hashes, code hashes, state roots
pub type Hash = B256;

pub type Nonce = u64;

pub type Gas = u64;

pub type BlockNumber = u64;

/// Seconds since the Unix epoch
pub type Timestamp = u64;

/// Native currency amount in wei
pub type Wei = U256;

pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

pub const WEI_PER_GWEI: u128 = 1_000_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_constants() {
        assert_eq!(WEI_PER_ETHER, 10u128.pow(18));
        assert_eq!(WEI_PER_ETHER / WEI_PER_GWEI, 10u128.pow(9));
        assert_eq!(Wei::from(WEI_PER_ETHER).to_string(), "1000000000000000000");
    }
}
