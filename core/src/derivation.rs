//! Deterministic contract address derivation
//!
//! A contract created with `CREATE` lives at
//! `keccak256(rlp([deployer, nonce]))[12..]`, so its address is known before
//! the creating transaction runs. `CREATE2` replaces the nonce with a salt and
//! the init code hash.

use crate::hashing::{hash_concat, keccak256};
use crate::types::{Address, Hash, Nonce};
use alloy_rlp::{Encodable, Header};

/// Nonce of an account's first contract creation.
///
/// Contracts start with nonce 1 (EIP-161), so this is the nonce a factory
/// contract uses for the first contract it creates.
pub const FIRST_CREATE_NONCE: Nonce = 1;

/// RLP list header for `[20-byte string, single byte < 0x80]`
const FIRST_CREATE_PREFIX: [u8; 2] = [0xd6, 0x94];

/// Address of the contract `deployer` creates with nonce exactly 1.
///
/// Uses the fixed encoding `0xd6 0x94 || deployer || 0x01`. This framing only
/// holds for nonce 1; use [`create_address`] for any other nonce.
pub fn first_create_address(deployer: Address) -> Address {
    let hash = hash_concat(&[
        &FIRST_CREATE_PREFIX,
        deployer.as_slice(),
        &[FIRST_CREATE_NONCE as u8],
    ]);
    address_from_hash(&hash)
}

/// Address of the contract `deployer` creates at `nonce`
pub fn create_address(deployer: Address, nonce: Nonce) -> Address {
    let encoded = encode_create_preimage(deployer, nonce);
    address_from_hash(&keccak256(&encoded))
}

/// RLP encoding of `[deployer, nonce]`
pub fn encode_create_preimage(deployer: Address, nonce: Nonce) -> Vec<u8> {
    let deployer: &[u8] = deployer.as_slice();
    let payload_length = deployer.length() + nonce.length();

    let mut out = Vec::with_capacity(payload_length + 1);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    deployer.encode(&mut out);
    nonce.encode(&mut out);
    out
}

/// Address of a `CREATE2` deployment (EIP-1014)
pub fn create2_address(deployer: Address, salt: Hash, init_code: &[u8]) -> Address {
    let init_code_hash = keccak256(init_code);
    let hash = hash_concat(&[
        &[0xffu8],
        deployer.as_slice(),
        salt.as_slice(),
        init_code_hash.as_slice(),
    ]);
    address_from_hash(&hash)
}

/// Low-order 20 bytes of a 32-byte hash
fn address_from_hash(hash: &Hash) -> Address {
    Address::from_slice(&hash[12..])
}
