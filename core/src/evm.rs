//! Core EVM executor
//!
//! Wraps `revm` to execute one transaction against an [`InMemoryDB`] and fold
//! the resulting account changes back into a post-state.

use crate::errors::{LabError, Result};
use crate::input::{BlockEnv, ExecutionInput, TxInput};
use crate::output::ExecutionOutput;
use crate::state::InMemoryDB;
use crate::types::{Address, U256};
use revm::primitives::{
    BlockEnv as RevmBlockEnv, EVMError, EvmState, ResultAndState, TxEnv, TxKind,
};
use revm::Evm;

/// Transaction executor
///
/// Stateless: every call takes the full pre-state and returns the post-state,
/// so the same input always produces the same output.
pub struct Executor;

impl Executor {
    /// Execute a transaction and return its output, including the post-state
    ///
    /// Returns `Err` when the EVM rejects the transaction outright (bad nonce,
    /// insufficient funds for gas, ...). Reverts and halts are not errors here:
    /// they produce an output with the matching status.
    ///
    /// # Example
    /// ```rust,ignore
    /// let input = ExecutionInput::new(block, tx, pre_state);
    /// let output = Executor::execute(input)?;
    /// ```
    pub fn execute(input: ExecutionInput) -> Result<ExecutionOutput> {
        let ResultAndState { result, state } = Self::transact(&input)?;

        let mut post_state = input.pre_state;
        let created = Self::commit(&mut post_state, state);

        Ok(ExecutionOutput::from_result(result, post_state).with_created_contracts(created))
    }

    /// Execute without committing; the output carries the unchanged pre-state
    pub fn simulate(input: ExecutionInput) -> Result<ExecutionOutput> {
        let ResultAndState { result, .. } = Self::transact(&input)?;
        Ok(ExecutionOutput::from_result(result, input.pre_state))
    }

    fn transact(input: &ExecutionInput) -> Result<ResultAndState> {
        let block = &input.block;

        let mut evm = Evm::builder()
            .with_db(input.pre_state.clone())
            .with_spec_id(block.hardfork.spec_id())
            .modify_cfg_env(|cfg| cfg.chain_id = block.chain_id)
            .modify_block_env(|env| *env = revm_block(block))
            .modify_tx_env(|env| *env = revm_tx(&input.tx))
            .build();

        evm.transact().map_err(|err| match err {
            EVMError::Transaction(invalid) => LabError::InvalidTransaction(format!("{:?}", invalid)),
            EVMError::Database(db) => db,
            other => LabError::ExecutionHalted(format!("{:?}", other)),
        })
    }

    /// Fold touched accounts into `db`
    ///
    /// Self-destructed accounts are removed and touched accounts left empty are
    /// pruned (EIP-161). Returns the addresses of contracts created during the
    /// transaction.
    fn commit(db: &mut InMemoryDB, changes: EvmState) -> Vec<Address> {
        let mut created = Vec::new();

        for (addr, account) in changes {
            if !account.is_touched() {
                continue;
            }
            if account.is_created() {
                created.push(addr);
            }
            if account.is_selfdestructed() {
                db.remove_account(&addr);
                continue;
            }

            let entry = db.accounts.entry(addr).or_default();
            if account.is_created() {
                entry.storage.clear();
            }
            entry.balance = account.info.balance;
            entry.nonce = account.info.nonce;
            if entry.code_hash != account.info.code_hash {
                let code = account
                    .info
                    .code
                    .map(|code| code.original_bytes().to_vec())
                    .unwrap_or_default();
                entry.set_code(code);
            }
            for (slot, value) in account.storage {
                entry.set_storage(slot, value.present_value);
            }

            if entry.is_empty() && entry.storage.is_empty() {
                db.remove_account(&addr);
            }
        }

        created
    }
}

fn revm_block(block: &BlockEnv) -> RevmBlockEnv {
    RevmBlockEnv {
        number: U256::from(block.number),
        timestamp: U256::from(block.timestamp),
        gas_limit: U256::from(block.gas_limit),
        coinbase: block.coinbase,
        basefee: block.base_fee,
        prevrandao: Some(block.prev_randao),
        ..Default::default()
    }
}

fn revm_tx(tx: &TxInput) -> TxEnv {
    TxEnv {
        caller: tx.caller,
        transact_to: tx.to.map_or(TxKind::Create, TxKind::Call),
        value: tx.value,
        data: tx.data.clone().into(),
        gas_limit: tx.gas_limit,
        gas_price: tx.gas_price,
        nonce: Some(tx.nonce),
        ..Default::default()
    }
}

/// Fluent construction of an [`ExecutionInput`]
#[derive(Debug, Clone, Default)]
pub struct ExecutionBuilder {
    input: ExecutionInput,
}

impl ExecutionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, block: BlockEnv) -> Self {
        self.input.block = block;
        self
    }

    pub fn with_tx(mut self, tx: TxInput) -> Self {
        self.input.tx = tx;
        self
    }

    pub fn with_state(mut self, state: InMemoryDB) -> Self {
        self.input.pre_state = state;
        self
    }

    pub fn build(self) -> ExecutionInput {
        self.input
    }

    pub fn execute(self) -> Result<ExecutionOutput> {
        Executor::execute(self.input)
    }

    pub fn simulate(self) -> Result<ExecutionOutput> {
        Executor::simulate(self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::create_address;
    use crate::input::Hardfork;
    use crate::state::AccountState;

    const ONE_ETH: u128 = 1_000_000_000_000_000_000;

    fn funded(addr: Address) -> InMemoryDB {
        let mut state = InMemoryDB::new();
        state.insert_account(addr, AccountState::new_with_balance(U256::from(ONE_ETH)));
        state
    }

    /// PUSH20 beneficiary, SELFDESTRUCT
    fn selfdestruct_code(beneficiary: Address) -> Vec<u8> {
        let mut code = vec![0x73];
        code.extend_from_slice(beneficiary.as_slice());
        code.push(0xff);
        code
    }

    #[test]
    fn test_simple_transfer() {
        let sender = Address::repeat_byte(0x01);
        let receiver = Address::repeat_byte(0x02);
        let amount = U256::from(ONE_ETH / 10);

        let output = ExecutionBuilder::new()
            .with_tx(TxInput::transfer(sender, receiver, amount))
            .with_state(funded(sender))
            .execute()
            .unwrap();

        assert!(output.is_success());
        assert_eq!(output.gas_used, 21_000);
        assert_eq!(output.post_state.balance_of(&receiver), amount);
        assert_eq!(output.post_state.nonce_of(&sender), 1);
        assert!(output.created_contracts.is_empty());
    }

    #[test]
    fn test_contract_creation_address_is_predictable() {
        let deployer = Address::repeat_byte(0x01);

        // PUSH1 0x42, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN
        let init_code = vec![0x60, 0x42, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];

        let output = ExecutionBuilder::new()
            .with_tx(TxInput::create(deployer, init_code).with_gas_limit(100_000))
            .with_state(funded(deployer))
            .execute()
            .unwrap();
        assert!(output.is_success());

        let created = output.created_address.expect("should create a contract");
        assert_eq!(created, create_address(deployer, 0));
        assert_eq!(output.created_contracts, vec![created]);

        let contract = output.post_state.get_account(&created).unwrap();
        assert_eq!(contract.code, vec![0x42]);
        assert_eq!(contract.nonce, 1);
    }

    #[test]
    fn test_rejected_transaction_is_error() {
        let sender = Address::repeat_byte(0x01);
        let tx = TxInput::transfer(sender, Address::repeat_byte(0x02), U256::from(1u64)).with_nonce(5);

        let result = ExecutionBuilder::new()
            .with_tx(tx)
            .with_state(funded(sender))
            .execute();

        assert!(matches!(result, Err(LabError::InvalidTransaction(_))));
    }

    #[test]
    fn test_revert_keeps_nonce_bump() {
        let sender = Address::repeat_byte(0x01);
        let target = Address::repeat_byte(0x0c);

        // PUSH1 0, PUSH1 0, REVERT
        let mut state = funded(sender);
        state.insert_account(
            target,
            AccountState::new_contract(vec![0x60, 0x00, 0x60, 0x00, 0xfd], U256::ZERO),
        );

        let output = ExecutionBuilder::new()
            .with_tx(TxInput::call(sender, target, vec![]).with_gas_limit(100_000))
            .with_state(state)
            .execute()
            .unwrap();

        assert!(output.is_revert());
        assert_eq!(output.post_state.nonce_of(&sender), 1);
    }

    fn run_selfdestruct(hardfork: Hardfork) -> ExecutionOutput {
        let sender = Address::repeat_byte(0x01);
        let contract = Address::repeat_byte(0x0d);
        let beneficiary = Address::repeat_byte(0x0e);

        let mut state = funded(sender);
        state.insert_account(
            contract,
            AccountState::new_contract(selfdestruct_code(beneficiary), U256::from(1_000u64)),
        );

        let output = ExecutionBuilder::new()
            .with_block(BlockEnv::default().with_hardfork(hardfork))
            .with_tx(TxInput::call(sender, contract, vec![]).with_gas_limit(100_000))
            .with_state(state)
            .execute()
            .unwrap();

        assert!(output.is_success());
        assert_eq!(output.post_state.balance_of(&beneficiary), U256::from(1_000u64));
        assert_eq!(output.post_state.balance_of(&contract), U256::ZERO);
        output
    }

    #[test]
    fn test_selfdestruct_removes_account_before_cancun() {
        for fork in [Hardfork::London, Hardfork::Shanghai] {
            let output = run_selfdestruct(fork);
            assert!(!output.post_state.account_exists(&Address::repeat_byte(0x0d)));
        }
    }

    #[test]
    fn test_selfdestruct_keeps_code_from_cancun() {
        let output = run_selfdestruct(Hardfork::Cancun);
        let contract = Address::repeat_byte(0x0d);
        assert_eq!(
            output.post_state.code_of(&contract),
            selfdestruct_code(Address::repeat_byte(0x0e)).as_slice()
        );
    }

    #[test]
    fn test_builder_defaults() {
        let input = ExecutionBuilder::new().build();
        assert_eq!(input.block, BlockEnv::default());
        assert_eq!(input.tx, TxInput::default());
        assert!(input.pre_state.accounts.is_empty());
    }

    #[test]
    fn test_simulate_does_not_commit() {
        let sender = Address::repeat_byte(0x01);
        let receiver = Address::repeat_byte(0x02);

        let output = ExecutionBuilder::new()
            .with_tx(TxInput::transfer(sender, receiver, U256::from(1000u64)))
            .with_state(funded(sender))
            .simulate()
            .unwrap();

        assert!(output.is_success());
        assert_eq!(output.post_state.balance_of(&receiver), U256::ZERO);
        assert_eq!(output.post_state.nonce_of(&sender), 0);
    }

    #[test]
    fn test_same_input_same_post_state() {
        let sender = Address::repeat_byte(0x01);
        let input = ExecutionBuilder::new()
            .with_tx(TxInput::transfer(sender, Address::repeat_byte(0x02), U256::from(1000u64)))
            .with_state(funded(sender))
            .build();

        let first = Executor::execute(input.clone()).unwrap();
        let second = Executor::execute(input).unwrap();

        assert_eq!(first.gas_used, second.gas_used);
        assert_eq!(
            first.post_state_root().unwrap(),
            second.post_state_root().unwrap()
        );
    }
}
