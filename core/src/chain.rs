//! Chain client abstraction and the in-process devnet
//!
//! [`ChainClient`] is the narrow JSON-RPC-shaped surface the contract handles
//! and the scenario talk to. [`Devnet`] implements it on top of [`Executor`]:
//! unlocked dev accounts, automine, one transaction per block.

use crate::config::DevnetConfig;
use crate::errors::{LabError, Result};
use crate::evm::{ExecutionBuilder, Executor};
use crate::input::{BlockEnv, Hardfork, TxInput};
use crate::output::{ExecutionOutput, Receipt};
use crate::state::InMemoryDB;
use crate::types::{Address, BlockNumber, Bytes, Gas, Hash, Nonce, Wei, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Transaction or call request, before nonce and fees are filled in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: Address,
    /// `None` deploys `data` as init code
    pub to: Option<Address>,
    pub value: Wei,
    pub data: Bytes,
    /// Falls back to the client's default when unset
    pub gas_limit: Option<Gas>,
}

impl TxRequest {
    pub fn create(from: Address, init_code: Vec<u8>) -> Self {
        Self {
            from,
            data: init_code.into(),
            ..Default::default()
        }
    }

    pub fn call(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to: Some(to),
            data: data.into(),
            ..Default::default()
        }
    }

    /// Plain ether transfer (empty calldata)
    pub fn transfer(from: Address, to: Address, value: Wei) -> Self {
        Self {
            from,
            to: Some(to),
            value,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: Wei) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: Gas) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Fill in what the chain decides: nonce, price and a default gas limit
    fn resolve(self, nonce: Nonce, gas_price: Wei, default_gas: Gas) -> TxInput {
        TxInput {
            caller: self.from,
            to: self.to,
            value: self.value,
            data: self.data.to_vec(),
            gas_limit: self.gas_limit.unwrap_or(default_gas),
            gas_price,
            nonce,
        }
    }
}

/// Minimal Ethereum client
///
/// `send_transaction` returns `Err` only when the transaction is rejected
/// before execution (bad nonce, cannot pay for gas); a mined transaction
/// that reverts comes back as a receipt with a failed status.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Unlocked accounts, in a stable order
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// Sign, send and mine a transaction
    async fn send_transaction(&self, request: TxRequest) -> Result<Receipt>;

    /// Execute against the latest state without committing
    async fn call(&self, request: TxRequest) -> Result<Bytes>;

    async fn estimate_gas(&self, request: TxRequest) -> Result<Gas>;

    async fn get_balance(&self, address: Address) -> Result<Wei>;

    async fn get_code(&self, address: Address) -> Result<Bytes>;

    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<U256>;

    async fn get_transaction_count(&self, address: Address) -> Result<Nonce>;

    async fn get_receipt(&self, tx_hash: Hash) -> Result<Option<Receipt>>;

    /// Number of the latest mined block
    async fn block_number(&self) -> Result<BlockNumber>;
}

struct DevnetInner {
    state: InMemoryDB,
    /// Environment of the next block to mine
    pending: BlockEnv,
    receipts: BTreeMap<Hash, Receipt>,
}

/// In-process automining devnet
pub struct Devnet {
    config: DevnetConfig,
    accounts: Vec<Address>,
    gas_price: Wei,
    inner: Mutex<DevnetInner>,
}

impl Devnet {
    /// Start a devnet with every dev account funded
    pub fn new(config: DevnetConfig) -> Result<Self> {
        config.validate()?;

        let balance = config.account_balance_wei()?;
        let accounts = config.dev_accounts();
        let mut state = InMemoryDB::new();
        for account in &accounts {
            state.fund(*account, balance)?;
        }

        info!(
            chain_id = config.chain_id,
            hardfork = %config.hardfork,
            accounts = accounts.len(),
            "devnet started"
        );

        Ok(Self {
            gas_price: config.gas_price_wei()?,
            inner: Mutex::new(DevnetInner {
                state,
                pending: config.genesis_block()?,
                receipts: BTreeMap::new(),
            }),
            accounts,
            config,
        })
    }

    pub fn config(&self) -> &DevnetConfig {
        &self.config
    }

    pub fn hardfork(&self) -> Hardfork {
        self.config.hardfork
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> InMemoryDB {
        self.inner.lock().state.clone()
    }

    fn mine(&self, request: TxRequest) -> Result<Receipt> {
        let mut inner = self.inner.lock();

        let (from, to) = (request.from, request.to);
        let nonce = inner.state.nonce_of(&from);
        let tx = request.resolve(nonce, self.gas_price, self.config.tx_gas_limit);
        let block = inner.pending.clone();
        let input = ExecutionBuilder::new()
            .with_block(block.clone())
            .with_tx(tx)
            .with_state(inner.state.clone())
            .build();
        let tx_hash = input.hash()?;

        let output = Executor::execute(input).inspect_err(|err| {
            warn!(from = %from, error = %err, "transaction rejected");
        })?;
        let state_root = output.post_state_root()?;

        let ExecutionOutput {
            status,
            return_data,
            gas_used,
            logs,
            post_state,
            created_address,
            created_contracts,
            ..
        } = output;

        let receipt = Receipt {
            tx_hash,
            block_number: block.number,
            from,
            to,
            contract_address: created_address,
            created_contracts,
            status,
            gas_used,
            effective_gas_price: self.gas_price,
            logs,
            state_root,
            return_data,
        };

        debug!(
            block = block.number,
            tx = %tx_hash,
            status = ?receipt.status,
            gas_used,
            created = receipt.created_contracts.len(),
            "mined transaction"
        );

        inner.state = post_state;
        inner.state.insert_block_hash(block.number, tx_hash);
        inner.pending = block.next();
        inner.receipts.insert(tx_hash, receipt.clone());

        Ok(receipt)
    }

    /// Whether `request` completes without revert or halt at `gas_limit`
    fn succeeds_with(&self, request: &TxRequest, gas_limit: Gas) -> Result<bool> {
        match self.simulate(request.clone().with_gas_limit(gas_limit)) {
            Ok(output) => Ok(output.is_success()),
            // below intrinsic gas
            Err(LabError::InvalidTransaction(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Run a request against the latest state with fees zeroed
    fn simulate(&self, request: TxRequest) -> Result<ExecutionOutput> {
        let inner = self.inner.lock();
        let block = inner.pending.without_fees();

        let nonce = inner.state.nonce_of(&request.from);
        let tx = request.resolve(nonce, U256::ZERO, block.gas_limit);

        ExecutionBuilder::new()
            .with_block(block)
            .with_tx(tx)
            .with_state(inner.state.clone())
            .simulate()
    }
}

#[async_trait]
impl ChainClient for Devnet {
    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn send_transaction(&self, request: TxRequest) -> Result<Receipt> {
        if !self.accounts.contains(&request.from) {
            return Err(LabError::AccountNotFound(request.from));
        }
        self.mine(request)
    }

    async fn call(&self, request: TxRequest) -> Result<Bytes> {
        Ok(self.simulate(request)?.into_return_data()?.into())
    }

    /// Lowest gas limit the request succeeds with
    ///
    /// Gas used at a generous limit is only a lower bound: EIP-150 withholds
    /// 1/64 of the remaining gas from every nested call and CREATE, so the
    /// limit is bisected between that bound and the cap.
    async fn estimate_gas(&self, request: TxRequest) -> Result<Gas> {
        let cap = request.gas_limit.unwrap_or(self.config.block_gas_limit);
        let output = self.simulate(request.clone().with_gas_limit(cap))?;
        // revm reports gas after refunds; the sender needs the gross amount up front
        let used = output.gas_used + output.gas_refunded;
        output.into_return_data()?;

        if self.succeeds_with(&request, used)? {
            return Ok(used);
        }
        // `low` fails, `high` succeeds
        let (mut low, mut high) = (used, cap);
        while high - low > 1 {
            let mid = low + (high - low) / 2;
            if self.succeeds_with(&request, mid)? {
                high = mid;
            } else {
                low = mid;
            }
        }
        debug!(from = %request.from, used, estimate = high, "bisected gas estimate");
        Ok(high)
    }

    async fn get_balance(&self, address: Address) -> Result<Wei> {
        Ok(self.inner.lock().state.balance_of(&address))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(self.inner.lock().state.code_of(&address)))
    }

    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<U256> {
        Ok(self.inner.lock().state.storage_of(&address, &slot))
    }

    async fn get_transaction_count(&self, address: Address) -> Result<Nonce> {
        Ok(self.inner.lock().state.nonce_of(&address))
    }

    async fn get_receipt(&self, tx_hash: Hash) -> Result<Option<Receipt>> {
        Ok(self.inner.lock().receipts.get(&tx_hash).cloned())
    }

    async fn block_number(&self) -> Result<BlockNumber> {
        Ok(self.inner.lock().pending.number - 1)
    }
}
