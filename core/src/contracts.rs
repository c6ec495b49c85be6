//! Recovery and SimpleToken
//!
//! Both contracts are assembled from hand-written EVM code, so the lab needs
//! no Solidity toolchain. Storage layout matches what solc would produce for:
//!
//! ```solidity
//! contract SimpleToken {
//!     bytes32 nameHash;                          // slot 0
//!     mapping(address => uint256) public balances; // slot 1
//! }
//! ```
//!
//! The token keeps only the hash of its name; nothing ever reads the string
//! back, and a fixed-width slot keeps the constructor small.

use crate::asm::{Assembler, Label, Op};
use crate::chain::{ChainClient, TxRequest};
use crate::errors::{LabError, Result};
use crate::hashing::hash_concat;
use crate::output::Receipt;
use crate::types::{Address, Hash, Wei, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
    /// Factory that deploys a token and keeps no record of where
    interface IRecovery {
        function generateToken(string name, uint256 initialSupply) external;
    }

    /// Token deployed by `IRecovery.generateToken`
    interface ISimpleToken {
        function balances(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external;
        function destroy(address to) external;
    }
}

/// Storage slot of `keccak256(name)`
pub const NAME_HASH_SLOT: u64 = 0;

/// Storage slot of the `balances` mapping
pub const BALANCES_SLOT: u64 = 1;

const ADDRESS_MASK: [u8; 20] = [0xff; 20];

/// Storage slot holding `balances[account]`
pub fn balance_slot(account: Address) -> U256 {
    let mut key = [0u8; 32];
    key[12..].copy_from_slice(account.as_slice());
    let slot = U256::from(BALANCES_SLOT).to_be_bytes::<32>();
    U256::from_be_bytes(hash_concat(&[&key, &slot]).0)
}

/// `[key] -> [balance slot of key]`
fn emit_balance_slot(asm: &mut Assembler) {
    asm.push_u64(0)
        .op(Op::MStore)
        .push_u64(BALANCES_SLOT)
        .push_u64(0x20)
        .op(Op::MStore)
        .push_u64(0x40)
        .push_u64(0)
        .op(Op::Keccak256);
}

/// `[] -> [address argument at calldata offset]`
fn emit_address_arg(asm: &mut Assembler, offset: u64) {
    asm.push_u64(offset)
        .op(Op::CallDataLoad)
        .push_bytes(&ADDRESS_MASK)
        .op(Op::And);
}

fn emit_nonpayable(asm: &mut Assembler, revert: Label) {
    asm.op(Op::CallValue).jump_if(revert);
}

fn emit_min_calldata(asm: &mut Assembler, min: u64, revert: Label) {
    asm.push_u64(min).op(Op::CallDataSize).op(Op::Lt).jump_if(revert);
}

/// `[selector] -> [selector]`, jumping to `target` on a match
fn emit_dispatch(asm: &mut Assembler, selector: [u8; 4], target: Label) {
    asm.op(Op::Dup1)
        .push_bytes(&selector)
        .op(Op::Eq)
        .jump_if(target);
}

/// `[] -> [selector]`
fn emit_selector(asm: &mut Assembler) {
    asm.push_u64(0)
        .op(Op::CallDataLoad)
        .push_u64(0xe0)
        .op(Op::Shr);
}

/// Init code that returns `runtime` as the deployed code
pub fn deployment_code(runtime: &[u8]) -> Result<Vec<u8>> {
    let mut asm = Assembler::new();
    let body = asm.new_label();
    let len = runtime.len() as u64;

    asm.push_u64(len)
        .push_label(body)
        .push_u64(0)
        .op(Op::CodeCopy)
        .push_u64(len)
        .push_u64(0)
        .op(Op::Return)
        .bind(body)
        .append(runtime);
    asm.finish()
}

/// Deployed code of SimpleToken
///
/// - empty calldata: `balances[msg.sender] = msg.value * 10`
/// - `balances(address)`
/// - `transfer(address,uint256)`: requires enough balance; the recipient's
///   balance is *set* to `amount`, not increased
/// - `destroy(address)`: `selfdestruct(to)`, callable by anyone
///
/// Anything else reverts, as does sending value to the non-payable functions.
pub fn simple_token_runtime() -> Result<Vec<u8>> {
    let mut asm = Assembler::new();
    let revert = asm.new_label();
    let receive = asm.new_label();
    let balances = asm.new_label();
    let transfer = asm.new_label();
    let destroy = asm.new_label();

    asm.op(Op::CallDataSize).op(Op::IsZero).jump_if(receive);
    emit_selector(&mut asm);
    emit_dispatch(&mut asm, ISimpleToken::balancesCall::SELECTOR, balances);
    emit_dispatch(&mut asm, ISimpleToken::transferCall::SELECTOR, transfer);
    emit_dispatch(&mut asm, ISimpleToken::destroyCall::SELECTOR, destroy);
    asm.jumpdest(revert).push_u64(0).op(Op::Dup1).op(Op::Revert);

    asm.jumpdest(receive)
        .push_u64(10)
        .op(Op::CallValue)
        .op(Op::Mul)
        .op(Op::Caller);
    emit_balance_slot(&mut asm);
    asm.op(Op::SStore).op(Op::Stop);

    asm.jumpdest(balances);
    emit_nonpayable(&mut asm, revert);
    emit_min_calldata(&mut asm, 0x24, revert);
    emit_address_arg(&mut asm, 4);
    emit_balance_slot(&mut asm);
    asm.op(Op::SLoad)
        .push_u64(0)
        .op(Op::MStore)
        .push_u64(0x20)
        .push_u64(0)
        .op(Op::Return);

    asm.jumpdest(transfer);
    emit_nonpayable(&mut asm, revert);
    emit_min_calldata(&mut asm, 0x44, revert);
    asm.op(Op::Caller);
    emit_balance_slot(&mut asm);
    // [from_slot] -> [from_slot, balance, amount]
    asm.op(Op::Dup1)
        .op(Op::SLoad)
        .push_u64(0x24)
        .op(Op::CallDataLoad)
        .op(Op::Dup1)
        .op(Op::Dup3)
        .op(Op::Lt)
        .jump_if(revert)
        // [from_slot, amount, balance - amount]
        .op(Op::Dup1)
        .op(Op::Swap2)
        .op(Op::Sub)
        .op(Op::Dup3)
        .op(Op::SStore);
    emit_address_arg(&mut asm, 4);
    emit_balance_slot(&mut asm);
    asm.op(Op::SStore).op(Op::Stop);

    asm.jumpdest(destroy);
    emit_nonpayable(&mut asm, revert);
    emit_min_calldata(&mut asm, 0x24, revert);
    emit_address_arg(&mut asm, 4);
    asm.op(Op::SelfDestruct);

    asm.finish()
}

/// Init code of SimpleToken
///
/// Expects to be followed by the ABI-encoded `(string name, uint256 supply)`
/// and then one more word holding the creator, which receives the supply:
///
/// ```text
/// | init code | name offset | supply | name len | name bytes... | creator |
/// ```
pub fn simple_token_init_code() -> Result<Vec<u8>> {
    let runtime = simple_token_runtime()?;
    let mut asm = Assembler::new();
    let runtime_label = asm.new_label();
    let args = asm.new_label();

    // slot 0 = keccak256(name)
    asm.push_u64(0x20)
        .push_label(args)
        .push_u64(0)
        .op(Op::CodeCopy)
        .push_u64(0)
        .op(Op::MLoad)
        .push_label(args)
        .op(Op::Add)
        // [name_pos]
        .push_u64(0x20)
        .op(Op::Dup2)
        .push_u64(0)
        .op(Op::CodeCopy)
        .push_u64(0)
        .op(Op::MLoad)
        // [name_pos, len] -> [len, len, name_pos + 32]
        .op(Op::Dup1)
        .op(Op::Swap2)
        .push_u64(0x20)
        .op(Op::Add)
        .push_u64(0x40)
        .op(Op::CodeCopy)
        .push_u64(0x40)
        .op(Op::Keccak256)
        .push_u64(NAME_HASH_SLOT)
        .op(Op::SStore);

    // balances[creator] = supply
    asm.push_u64(0x20)
        .push_label(args)
        .push_u64(0x20)
        .op(Op::Add)
        .push_u64(0)
        .op(Op::CodeCopy)
        .push_u64(0)
        .op(Op::MLoad)
        .push_u64(0x20)
        .push_u64(0x20)
        .op(Op::CodeSize)
        .op(Op::Sub)
        .push_u64(0)
        .op(Op::CodeCopy)
        .push_u64(0)
        .op(Op::MLoad);
    emit_balance_slot(&mut asm);
    asm.op(Op::SStore);

    let len = runtime.len() as u64;
    asm.push_u64(len)
        .push_label(runtime_label)
        .push_u64(0)
        .op(Op::CodeCopy)
        .push_u64(len)
        .push_u64(0)
        .op(Op::Return)
        .bind(runtime_label)
        .append(&runtime)
        .bind(args);

    asm.finish()
}

/// Constructor payload appended to [`simple_token_init_code`]
pub fn simple_token_args(name: &str, initial_supply: U256, creator: Address) -> Vec<u8> {
    let call = IRecovery::generateTokenCall {
        name: name.to_string(),
        initialSupply: initial_supply,
    };
    // generateToken's arguments have the constructor's layout
    let mut args = call.abi_encode()[4..].to_vec();
    args.extend_from_slice(&[0u8; 12]);
    args.extend_from_slice(creator.as_slice());
    args
}

/// Deployed code of Recovery
///
/// `generateToken(name, supply)` CREATEs a SimpleToken with the caller as
/// creator and discards the new address. The factory's own nonce therefore
/// decides where each token lands.
pub fn recovery_runtime() -> Result<Vec<u8>> {
    let token_init = simple_token_init_code()?;
    let init_len = token_init.len() as u64;

    let mut asm = Assembler::new();
    let fail = asm.new_label();
    let generate = asm.new_label();
    let init = asm.new_label();

    emit_selector(&mut asm);
    emit_dispatch(&mut asm, IRecovery::generateTokenCall::SELECTOR, generate);
    asm.jumpdest(fail).push_u64(0).op(Op::Dup1).op(Op::Revert);

    asm.jumpdest(generate);
    emit_nonpayable(&mut asm, fail);
    // offset, supply, string length
    emit_min_calldata(&mut asm, 0x64, fail);
    asm.push_u64(init_len)
        .push_label(init)
        .push_u64(0)
        .op(Op::CodeCopy)
        // memory = init code | calldata args | creator
        .push_u64(4)
        .op(Op::CallDataSize)
        .op(Op::Sub)
        .op(Op::Dup1)
        .push_u64(4)
        .push_u64(init_len)
        .op(Op::CallDataCopy)
        .push_u64(init_len)
        .op(Op::Add)
        .op(Op::Caller)
        .op(Op::Dup2)
        .op(Op::MStore)
        .push_u64(0x20)
        .op(Op::Add)
        .push_u64(0)
        .push_u64(0)
        .op(Op::Create)
        .op(Op::IsZero)
        .jump_if(fail)
        .op(Op::Stop)
        .bind(init)
        .append(&token_init);

    asm.finish()
}

pub fn recovery_init_code() -> Result<Vec<u8>> {
    deployment_code(&recovery_runtime()?)
}

fn created_address(receipt: &Receipt) -> Result<Address> {
    receipt.contract_address.ok_or_else(|| {
        LabError::InvalidTransaction("creation receipt carries no contract address".into())
    })
}

/// Handle to a deployed Recovery
pub struct RecoveryContract<'a, C: ?Sized> {
    client: &'a C,
    address: Address,
}

impl<'a, C: ChainClient + ?Sized> RecoveryContract<'a, C> {
    pub async fn deploy(client: &'a C, from: Address) -> Result<(Self, Receipt)> {
        let receipt = client
            .send_transaction(TxRequest::create(from, recovery_init_code()?))
            .await?
            .ensure_success()?;
        let address = created_address(&receipt)?;
        Ok((Self::at(client, address), receipt))
    }

    pub fn at(client: &'a C, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `generateToken(name, initialSupply)` from `from`
    pub async fn generate_token(
        &self,
        name: &str,
        initial_supply: U256,
        from: Address,
    ) -> Result<Receipt> {
        let data = IRecovery::generateTokenCall {
            name: name.to_string(),
            initialSupply: initial_supply,
        }
        .abi_encode();
        self.client
            .send_transaction(TxRequest::call(from, self.address, data))
            .await?
            .ensure_success()
    }
}

/// Handle to a SimpleToken
pub struct SimpleTokenContract<'a, C: ?Sized> {
    client: &'a C,
    address: Address,
}

impl<'a, C: ChainClient + ?Sized> SimpleTokenContract<'a, C> {
    /// Deploy a token directly, with `from` as creator
    pub async fn deploy(
        client: &'a C,
        from: Address,
        name: &str,
        initial_supply: U256,
    ) -> Result<(Self, Receipt)> {
        let mut code = simple_token_init_code()?;
        code.extend(simple_token_args(name, initial_supply, from));
        let receipt = client
            .send_transaction(TxRequest::create(from, code))
            .await?
            .ensure_success()?;
        let address = created_address(&receipt)?;
        Ok((Self::at(client, address), receipt))
    }

    pub fn at(client: &'a C, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balances(&self, account: Address) -> Result<U256> {
        let data = ISimpleToken::balancesCall { account }.abi_encode();
        let ret = self
            .client
            .call(TxRequest::call(Address::ZERO, self.address, data))
            .await?;
        Ok(ISimpleToken::balancesCall::abi_decode_returns(&ret, true)?._0)
    }

    /// Plain ether transfer into the token (its receive path)
    pub async fn send(&self, value: Wei, from: Address) -> Result<Receipt> {
        self.client
            .send_transaction(TxRequest::transfer(from, self.address, value))
            .await?
            .ensure_success()
    }

    pub async fn transfer(&self, to: Address, amount: U256, from: Address) -> Result<Receipt> {
        let data = ISimpleToken::transferCall { to, amount }.abi_encode();
        self.client
            .send_transaction(TxRequest::call(from, self.address, data))
            .await?
            .ensure_success()
    }

    /// `destroy(to)`: self-destruct, sending the token's ether to `to`
    pub async fn destroy(&self, to: Address, from: Address) -> Result<Receipt> {
        let data = ISimpleToken::destroyCall { to }.abi_encode();
        self.client
            .send_transaction(TxRequest::call(from, self.address, data))
            .await?
            .ensure_success()
    }

    pub async fn name_hash(&self) -> Result<Hash> {
        let word = self
            .client
            .get_storage_at(self.address, U256::from(NAME_HASH_SLOT))
            .await?;
        Ok(Hash::from(word.to_be_bytes::<32>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Devnet;
    use crate::config::DevnetConfig;
    use crate::derivation::{create_address, first_create_address};
    use crate::hashing::keccak256;
    use crate::output::ExecutionStatus;
    use crate::types::WEI_PER_ETHER;

    async fn setup() -> (Devnet, Address, Address) {
        let net = Devnet::new(DevnetConfig::default()).unwrap();
        let accounts = net.accounts().await.unwrap();
        (net, accounts[0], accounts[1])
    }

    #[test]
    fn test_selectors() {
        assert_eq!(
            IRecovery::generateTokenCall::SELECTOR,
            keccak256(b"generateToken(string,uint256)")[..4]
        );
        assert_eq!(
            ISimpleToken::balancesCall::SELECTOR,
            keccak256(b"balances(address)")[..4]
        );
        assert_eq!(
            ISimpleToken::destroyCall::SELECTOR,
            keccak256(b"destroy(address)")[..4]
        );
    }

    #[test]
    fn test_balance_slot_matches_solidity_layout() {
        let account = Address::repeat_byte(0xab);
        let mut preimage = vec![0u8; 12];
        preimage.extend_from_slice(account.as_slice());
        preimage.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>());
        assert_eq!(
            balance_slot(account),
            U256::from_be_bytes(keccak256(&preimage).0)
        );
    }

    #[test]
    fn test_bytecode_builds() {
        let runtime = simple_token_runtime().unwrap();
        let init = simple_token_init_code().unwrap();
        assert!(init.ends_with(&runtime));
        let recovery = recovery_runtime().unwrap();
        assert!(recovery.ends_with(&init));
        assert!(recovery_init_code().unwrap().ends_with(&recovery));
    }

    #[test]
    fn test_token_args_layout() {
        let creator = Address::repeat_byte(0x11);
        let args = simple_token_args("NewToken", U256::from(100_000u64), creator);
        // offset, supply, length, one word of name, creator
        assert_eq!(args.len(), 5 * 32);
        assert_eq!(args[31], 0x40);
        assert_eq!(U256::from_be_slice(&args[32..64]), U256::from(100_000u64));
        assert_eq!(args[95], 8);
        assert_eq!(&args[96..104], b"NewToken");
        assert_eq!(&args[140..160], creator.as_slice());
    }

    #[tokio::test]
    async fn test_token_deploys_directly() {
        let (net, alice, bob) = setup().await;
        let (token, _) = SimpleTokenContract::deploy(&net, alice, "Direct", U256::from(77u64))
            .await
            .unwrap();

        assert_eq!(token.address(), create_address(alice, 0));
        assert_eq!(token.balances(alice).await.unwrap(), U256::from(77u64));
        assert_eq!(token.balances(bob).await.unwrap(), U256::ZERO);
        assert_eq!(token.name_hash().await.unwrap(), keccak256(b"Direct"));
        assert_eq!(
            net.get_code(token.address()).await.unwrap().to_vec(),
            simple_token_runtime().unwrap()
        );
    }

    #[tokio::test]
    async fn test_generate_token_lands_on_first_create_address() {
        let (net, owner, hacker) = setup().await;
        let (recovery, _) = RecoveryContract::deploy(&net, owner).await.unwrap();
        assert_eq!(net.get_transaction_count(recovery.address()).await.unwrap(), 1);

        let receipt = recovery
            .generate_token("NewToken", U256::from(100_000u64), hacker)
            .await
            .unwrap();

        let expected = first_create_address(recovery.address());
        assert_eq!(receipt.created_contracts, vec![expected]);
        assert_eq!(receipt.contract_address, None);

        let token = SimpleTokenContract::at(&net, expected);
        assert_eq!(token.balances(hacker).await.unwrap(), U256::from(100_000u64));
        assert_eq!(token.balances(owner).await.unwrap(), U256::ZERO);
        assert_eq!(token.name_hash().await.unwrap(), keccak256(b"NewToken"));

        // the second token takes the next nonce
        let receipt = recovery
            .generate_token("Other", U256::from(1u64), owner)
            .await
            .unwrap();
        assert_eq!(
            receipt.created_contracts,
            vec![create_address(recovery.address(), 2)]
        );
    }

    #[tokio::test]
    async fn test_long_token_name() {
        let (net, owner, hacker) = setup().await;
        let (recovery, _) = RecoveryContract::deploy(&net, owner).await.unwrap();
        let name = "A token name comfortably longer than one thirty-two byte word";

        recovery
            .generate_token(name, U256::from(5u64), hacker)
            .await
            .unwrap();
        let token = SimpleTokenContract::at(&net, first_create_address(recovery.address()));
        assert_eq!(token.name_hash().await.unwrap(), keccak256(name.as_bytes()));
        assert_eq!(token.balances(hacker).await.unwrap(), U256::from(5u64));
    }

    #[tokio::test]
    async fn test_generate_token_rejects_value_and_bad_calldata() {
        let (net, owner, _) = setup().await;
        let (recovery, _) = RecoveryContract::deploy(&net, owner).await.unwrap();

        let receipt = net
            .send_transaction(TxRequest::call(owner, recovery.address(), vec![0xde, 0xad]))
            .await
            .unwrap();
        assert_eq!(receipt.status, ExecutionStatus::Revert);

        let data = IRecovery::generateTokenCall {
            name: "X".into(),
            initialSupply: U256::from(1u64),
        }
        .abi_encode();
        let receipt = net
            .send_transaction(
                TxRequest::call(owner, recovery.address(), data).with_value(U256::from(1u64)),
            )
            .await
            .unwrap();
        assert_eq!(receipt.status, ExecutionStatus::Revert);
        assert!(receipt.created_contracts.is_empty());
    }

    #[tokio::test]
    async fn test_receive_credits_ten_tokens_per_wei() {
        let (net, alice, bob) = setup().await;
        let (token, _) = SimpleTokenContract::deploy(&net, alice, "T", U256::from(1u64))
            .await
            .unwrap();

        let value = U256::from(WEI_PER_ETHER / 2);
        token.send(value, bob).await.unwrap();

        assert_eq!(net.get_balance(token.address()).await.unwrap(), value);
        assert_eq!(token.balances(bob).await.unwrap(), value * U256::from(10u64));
    }

    #[tokio::test]
    async fn test_transfer_overwrites_recipient_balance() {
        let (net, alice, bob) = setup().await;
        let (token, _) = SimpleTokenContract::deploy(&net, alice, "T", U256::from(100u64))
            .await
            .unwrap();
        token.send(U256::from(5u64), bob).await.unwrap();
        assert_eq!(token.balances(bob).await.unwrap(), U256::from(50u64));

        token.transfer(bob, U256::from(30u64), alice).await.unwrap();
        assert_eq!(token.balances(alice).await.unwrap(), U256::from(70u64));
        assert_eq!(token.balances(bob).await.unwrap(), U256::from(30u64));

        let err = token.transfer(alice, U256::from(31u64), bob).await.unwrap_err();
        assert!(matches!(err, LabError::ExecutionReverted(_)));
        assert_eq!(token.balances(bob).await.unwrap(), U256::from(30u64));
    }

    #[tokio::test]
    async fn test_unknown_selector_reverts() {
        let (net, alice, _) = setup().await;
        let (token, _) = SimpleTokenContract::deploy(&net, alice, "T", U256::from(1u64))
            .await
            .unwrap();
        let call = net
            .call(TxRequest::call(alice, token.address(), vec![0x12, 0x34, 0x56, 0x78]))
            .await;
        assert!(matches!(call, Err(LabError::ExecutionReverted(_))));
    }

    #[tokio::test]
    async fn test_destroy_pays_out_balance() {
        let (net, alice, bob) = setup().await;
        let (token, _) = SimpleTokenContract::deploy(&net, alice, "T", U256::from(1u64))
            .await
            .unwrap();
        let value = U256::from(WEI_PER_ETHER);
        token.send(value, alice).await.unwrap();

        let bob_before = net.get_balance(bob).await.unwrap();
        let receipt = token.destroy(bob, alice).await.unwrap();

        assert!(receipt.is_success());
        assert_eq!(net.get_balance(token.address()).await.unwrap(), U256::ZERO);
        assert_eq!(net.get_balance(bob).await.unwrap(), bob_before + value);
    }
}
