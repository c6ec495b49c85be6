//! The Recovery drain, end to end
//!
//! An owner deploys Recovery; a second account calls `generateToken`, funds
//! the token and loses track of it. The address is rebuilt from Recovery's
//! address and nonce alone, and `destroy` pulls the ether back out.

use crate::chain::ChainClient;
use crate::contracts::{RecoveryContract, SimpleTokenContract};
use crate::derivation::{create_address, first_create_address, FIRST_CREATE_NONCE};
use crate::errors::{ensure_eq, LabError, Result};
use crate::hashing::keccak256;
use crate::output::Receipt;
use crate::types::{Address, Nonce, Wei, U256, WEI_PER_ETHER};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters of the drain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryScenario {
    pub token_name: String,
    pub initial_supply: U256,
    /// Ether sent to the token before it is destroyed
    pub deposit: Wei,
}

impl Default for RecoveryScenario {
    fn default() -> Self {
        Self {
            token_name: "NewToken".into(),
            initial_supply: U256::from(100_000u64),
            deposit: U256::from(WEI_PER_ETHER / 2),
        }
    }
}

/// What happened, with the receipts of every transaction sent
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub owner: Address,
    pub hacker: Address,
    pub recovery: Address,
    /// Recovery's nonce right before `generateToken`
    pub recovery_nonce: Nonce,
    /// Token address rebuilt from Recovery's address
    pub token: Address,
    pub hacker_token_balance: U256,
    pub token_balance_after_deposit: Wei,
    pub token_balance_after_destroy: Wei,
    /// Ether the hacker got back from `destroy`, fee added back
    pub recovered: Wei,
    /// Whether the token's code is gone after `destroy`
    pub code_removed: bool,
    pub deploy_receipt: Receipt,
    pub generate_receipt: Receipt,
    pub deposit_receipt: Receipt,
    pub destroy_receipt: Receipt,
}

impl RecoveryScenario {
    pub fn new(token_name: impl Into<String>, initial_supply: U256, deposit: Wei) -> Self {
        Self {
            token_name: token_name.into(),
            initial_supply,
            deposit,
        }
    }

    /// Run the drain with the client's first two accounts as owner and hacker
    ///
    /// Every step is checked; the first failed check aborts the run with
    /// [`LabError::AssertionFailed`].
    ///
    /// `destroy` has no access control, so any account can send it. The
    /// hacker sends it here and pays its fee, which `recovered` adds back.
    pub async fn run<C: ChainClient + ?Sized>(&self, client: &C) -> Result<ScenarioReport> {
        let accounts = client.accounts().await?;
        let (owner, hacker) = match accounts.as_slice() {
            [owner, hacker, ..] => (*owner, *hacker),
            _ => {
                return Err(LabError::Config(
                    "the scenario needs at least two accounts".into(),
                ))
            }
        };

        let owner_nonce = client.get_transaction_count(owner).await?;
        let (recovery, deploy_receipt) = RecoveryContract::deploy(client, owner).await?;
        ensure_eq(
            "Recovery address",
            create_address(owner, owner_nonce),
            recovery.address(),
        )?;
        info!(recovery = %recovery.address(), %owner, "deployed Recovery");

        let recovery_nonce = client.get_transaction_count(recovery.address()).await?;
        ensure_eq("Recovery nonce", FIRST_CREATE_NONCE, recovery_nonce)?;
        let token_address = first_create_address(recovery.address());
        ensure_eq(
            "first CREATE shortcut",
            create_address(recovery.address(), recovery_nonce),
            token_address,
        )?;

        let generate_receipt = recovery
            .generate_token(&self.token_name, self.initial_supply, hacker)
            .await?;
        ensure_eq(
            "contracts created by generateToken",
            vec![token_address],
            generate_receipt.created_contracts.clone(),
        )?;
        info!(token = %token_address, name = %self.token_name, "generated token");

        let token = SimpleTokenContract::at(client, token_address);
        ensure_eq(
            "token name hash",
            keccak256(self.token_name.as_bytes()),
            token.name_hash().await?,
        )?;
        let hacker_token_balance = token.balances(hacker).await?;
        ensure_eq("balances(hacker)", self.initial_supply, hacker_token_balance)?;

        let deposit_receipt = token.send(self.deposit, hacker).await?;
        let token_balance_after_deposit = client.get_balance(token_address).await?;
        ensure_eq(
            "token balance after deposit",
            self.deposit,
            token_balance_after_deposit,
        )?;
        info!(deposit = %self.deposit, "funded token");

        let hacker_before = client.get_balance(hacker).await?;
        let destroy_receipt = token.destroy(hacker, hacker).await?;
        ensure_eq("destroy succeeded", true, destroy_receipt.is_success())?;

        let token_balance_after_destroy = client.get_balance(token_address).await?;
        ensure_eq(
            "token balance after destroy",
            U256::ZERO,
            token_balance_after_destroy,
        )?;

        let hacker_after = client.get_balance(hacker).await?;
        let recovered = hacker_after
            .checked_add(destroy_receipt.fee())
            .and_then(|total| total.checked_sub(hacker_before))
            .ok_or_else(|| LabError::AssertionFailed {
                check: "hacker balance after destroy",
                expected: format!("at least {hacker_before}"),
                actual: format!("{hacker_after} plus fee {}", destroy_receipt.fee()),
            })?;
        ensure_eq("ether recovered", self.deposit, recovered)?;

        let code_removed = client.get_code(token_address).await?.is_empty();
        info!(%recovered, code_removed, "destroyed token");

        Ok(ScenarioReport {
            owner,
            hacker,
            recovery: recovery.address(),
            recovery_nonce,
            token: token_address,
            hacker_token_balance,
            token_balance_after_deposit,
            token_balance_after_destroy,
            recovered,
            code_removed,
            deploy_receipt,
            generate_receipt,
            deposit_receipt,
            destroy_receipt,
        })
    }
}

/// Live contracts a contract deployer created at nonces `1..=max_nonce`
///
/// Contracts start at nonce 1, so this covers everything a factory has
/// created without needing its logs or receipts.
pub async fn locate_created_contracts<C: ChainClient + ?Sized>(
    client: &C,
    deployer: Address,
    max_nonce: Nonce,
) -> Result<Vec<(Nonce, Address)>> {
    let mut found = Vec::new();
    for nonce in FIRST_CREATE_NONCE..=max_nonce {
        let address = create_address(deployer, nonce);
        if !client.get_code(address).await?.is_empty() {
            found.push((nonce, address));
        }
    }
    Ok(found)
}
