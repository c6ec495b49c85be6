//! Devnet world state
//!
//! Accounts live in a `BTreeMap` so iteration order, and therefore the state
//! root, never depends on insertion order. [`InMemoryDB`] is also the
//! `revm::Database` the executor runs against.

use crate::errors::{LabError, Result};
use crate::hashing::{hash_struct, keccak256};
use crate::types::{Address, BlockNumber, Hash, Nonce, Wei, U256};
use revm::primitives::{AccountInfo, Bytecode, KECCAK_EMPTY};
use revm::Database;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One account: EOA when `code` is empty, contract otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: Wei,
    pub nonce: Nonce,
    /// `KECCAK_EMPTY` for accounts without code
    pub code_hash: Hash,
    pub code: Vec<u8>,
    /// Non-zero slots only
    pub storage: BTreeMap<U256, U256>,
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new_with_balance(U256::ZERO)
    }
}

impl AccountState {
    pub fn new_with_balance(balance: Wei) -> Self {
        Self {
            balance,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: Vec::new(),
            storage: BTreeMap::new(),
        }
    }

    /// Contract account; nonce starts at 1 (EIP-161)
    pub fn new_contract(code: Vec<u8>, balance: Wei) -> Self {
        let mut account = Self {
            nonce: 1,
            ..Self::new_with_balance(balance)
        };
        account.set_code(code);
        account
    }

    /// No balance, no nonce, no code (EIP-161)
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code.is_empty()
    }

    pub fn set_code(&mut self, code: Vec<u8>) {
        self.code_hash = if code.is_empty() {
            KECCAK_EMPTY
        } else {
            keccak256(&code)
        };
        self.code = code;
    }

    /// Zero clears the slot
    pub fn set_storage(&mut self, slot: U256, value: U256) {
        if value.is_zero() {
            self.storage.remove(&slot);
        } else {
            self.storage.insert(slot, value);
        }
    }

    pub fn get_storage(&self, slot: &U256) -> U256 {
        self.storage.get(slot).copied().unwrap_or_default()
    }
}

/// Full devnet state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryDB {
    pub accounts: BTreeMap<Address, AccountState>,
    /// Served to BLOCKHASH
    pub block_hashes: BTreeMap<BlockNumber, Hash>,
}

impl InMemoryDB {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&mut self, address: Address, account: AccountState) {
        self.accounts.insert(address, account);
    }

    pub fn get_account(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    pub fn remove_account(&mut self, address: &Address) -> Option<AccountState> {
        self.accounts.remove(address)
    }

    pub fn account_exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    // Queries below treat a missing account as empty, like an RPC node does.

    pub fn balance_of(&self, address: &Address) -> Wei {
        self.get_account(address)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    pub fn nonce_of(&self, address: &Address) -> Nonce {
        self.get_account(address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }

    pub fn code_of(&self, address: &Address) -> &[u8] {
        self.get_account(address)
            .map(|account| account.code.as_slice())
            .unwrap_or_default()
    }

    pub fn storage_of(&self, address: &Address, slot: &U256) -> U256 {
        self.get_account(address)
            .map(|account| account.get_storage(slot))
            .unwrap_or_default()
    }

    /// Credit `amount` to `address`, creating the account if needed
    pub fn fund(&mut self, address: Address, amount: Wei) -> Result<()> {
        let account = self.accounts.entry(address).or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LabError::DatabaseError(format!("balance overflow for {address}")))?;
        Ok(())
    }

    pub fn insert_block_hash(&mut self, number: BlockNumber, hash: Hash) {
        self.block_hashes.insert(number, hash);
    }

    /// keccak256 of the bincode-encoded accounts
    ///
    /// Stable across runs but not an Ethereum trie root.
    pub fn compute_state_root(&self) -> Result<Hash> {
        hash_struct(&self.accounts)
    }
}

impl Database for InMemoryDB {
    type Error = LabError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>> {
        Ok(self.accounts.get(&address).map(|account| {
            let code = (!account.code.is_empty())
                .then(|| Bytecode::new_raw(account.code.clone().into()));
            AccountInfo {
                balance: account.balance,
                nonce: account.nonce,
                code_hash: account.code_hash,
                code,
            }
        }))
    }

    fn code_by_hash(&mut self, code_hash: Hash) -> Result<Bytecode> {
        // `basic` always ships the code, so this is only hit for shared code
        let code = self
            .accounts
            .values()
            .find(|account| account.code_hash == code_hash && !account.code.is_empty())
            .map(|account| Bytecode::new_raw(account.code.clone().into()))
            .unwrap_or_default();
        Ok(code)
    }

    fn storage(&mut self, address: Address, slot: U256) -> Result<U256> {
        Ok(self.storage_of(&address, &slot))
    }

    fn block_hash(&mut self, number: u64) -> Result<Hash> {
        Ok(self.block_hashes.get(&number).copied().unwrap_or_default())
    }
}
