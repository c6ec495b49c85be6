//! Keccak256 helpers
//!
//! Used for address derivation, mapping slots, selectors and the devnet's
//! transaction hashes and state roots.

use crate::errors::Result;
use crate::types::{Hash, B256};
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> Hash {
    hash_concat(&[data])
}

/// keccak256 over the concatenation of `parts`, without allocating it
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    let digest = parts
        .iter()
        .fold(Keccak256::new(), |hasher, part| hasher.chain_update(part))
        .finalize();
    B256::from_slice(&digest)
}

/// keccak256 of the bincode encoding of `value`
///
/// Only stable for types whose serialization is order-independent, so maps
/// hashed here must be `BTreeMap`s.
pub fn hash_struct<T: serde::Serialize>(value: &T) -> Result<Hash> {
    Ok(keccak256(&bincode::serialize(value)?))
}
