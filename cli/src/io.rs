//! I/O utilities for the CLI
//!
//! Loads and saves the lab configuration and renders scenario reports.

use anyhow::{Context, Result};
use recovery_lab_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything `run` can be configured with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub devnet: DevnetConfig,
    pub scenario: RecoveryScenario,
}

/// Load a lab configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LabConfig> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let config: LabConfig =
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {:?}", path))?;
    config.devnet.validate()?;
    Ok(config)
}

/// Save a lab configuration as pretty JSON
pub fn save_config<P: AsRef<Path>>(config: &LabConfig, path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path.as_ref(), json)
        .with_context(|| format!("Failed to write {:?}", path.as_ref()))?;
    Ok(())
}

/// Format a hash as a hex string
pub fn format_hash(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}

/// Human-readable summary of a scenario run
pub fn format_report(report: &ScenarioReport) -> String {
    format!(
        "ScenarioReport {{\n  \
         owner: {},\n  \
         hacker: {},\n  \
         recovery: {} (nonce {}),\n  \
         token: {},\n  \
         balances(hacker): {},\n  \
         deposit: {},\n  \
         after destroy: {},\n  \
         recovered: {},\n  \
         code removed: {},\n  \
         destroy tx: {}\n\
         }}",
        report.owner,
        report.hacker,
        report.recovery,
        report.recovery_nonce,
        report.token,
        report.hacker_token_balance,
        format_ether(report.token_balance_after_deposit),
        format_ether(report.token_balance_after_destroy),
        format_ether(report.recovered),
        report.code_removed,
        format_hash(&report.destroy_receipt.tx_hash),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.json");

        let mut config = LabConfig::default();
        config.devnet.hardfork = Hardfork::Shanghai;
        config.scenario.token_name = "Lost".into();

        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.json");
        fs::write(&path, r#"{ "devnet": { "accounts": 2 } }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.devnet.accounts, 2);
        assert_eq!(config.scenario, RecoveryScenario::default());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.json");
        fs::write(&path, r#"{ "devnet": { "accounts": 0 } }"#).unwrap();
        assert!(load_config(&path).is_err());

        assert!(load_config(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_format_hash() {
        assert_eq!(
            format_hash(&Hash::repeat_byte(0xab)),
            format!("0x{}", "ab".repeat(32))
        );
    }

    #[tokio::test]
    async fn test_format_report() {
        let net = Devnet::new(DevnetConfig::default()).unwrap();
        let report = RecoveryScenario::default().run(&net).await.unwrap();
        let text = format_report(&report);

        assert!(text.contains(&report.token.to_string()));
        assert!(text.contains("balances(hacker): 100000"));
        assert!(text.contains("recovered: 0.5 ETH"));
    }
}
