//! Recovery Lab CLI
//!
//! Runs the Recovery drain on an in-process devnet and exposes the address
//! derivation and unit helpers it is built on.

mod io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recovery_lab_core::derivation::encode_create_preimage;
use recovery_lab_core::prelude::*;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "recovery-lab")]
#[command(about = "Find a lost CREATE-deployed contract by its address and drain it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full scenario on a fresh devnet
    Run {
        /// Lab configuration JSON (see `sample-config`)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured hardfork (london, shanghai, cancun)
        #[arg(long)]
        hardfork: Option<Hardfork>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Derive the address of a contract created with CREATE
    Derive {
        /// Creating account or contract
        #[arg(short, long)]
        deployer: Address,

        /// Nonce of the creation; defaults to 1, a factory's first CREATE
        #[arg(short, long)]
        nonce: Option<Nonce>,
    },

    /// Convert an amount to wei
    ToWei {
        /// Decimal amount, or "<amount> <unit>" when --unit is not given
        amount: String,

        /// Unit of the amount (wei, gwei, ether, ...)
        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Write a sample lab configuration
    SampleConfig {
        /// Path to save the configuration
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            hardfork,
            json,
        } => {
            cmd_run(config, hardfork, json).await?;
        }
        Commands::Derive { deployer, nonce } => {
            cmd_derive(deployer, nonce);
        }
        Commands::ToWei { amount, unit } => {
            cmd_to_wei(&amount, unit.as_deref())?;
        }
        Commands::SampleConfig { output } => {
            cmd_sample_config(output)?;
        }
    }

    Ok(())
}

async fn cmd_run(config_path: Option<PathBuf>, hardfork: Option<Hardfork>, json: bool) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => io::load_config(path)
            .context(format!("Failed to load config from {:?}", path))?,
        None => io::LabConfig::default(),
    };
    if let Some(hardfork) = hardfork {
        config.devnet.hardfork = hardfork;
    }

    let devnet = Devnet::new(config.devnet).context("Failed to start devnet")?;
    info!(hardfork = %devnet.hardfork(), "running recovery scenario");

    let report = config
        .scenario
        .run(&devnet)
        .await
        .context("Scenario failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Recovery Lab");
        println!("============");
        println!("{}", io::format_report(&report));
    }

    Ok(())
}

fn cmd_derive(deployer: Address, nonce: Option<Nonce>) {
    let nonce = nonce.unwrap_or(1);
    let preimage = encode_create_preimage(deployer, nonce);

    println!("Deployer: {}", deployer);
    println!("Nonce:    {}", nonce);
    println!("RLP:      0x{}", hex::encode(&preimage));
    println!("Address:  {}", create_address(deployer, nonce));
}

fn cmd_to_wei(amount: &str, unit: Option<&str>) -> Result<()> {
    let wei = match unit {
        Some(unit) => to_wei(amount, unit),
        None => parse_amount(amount),
    }
    .context(format!("Cannot convert {:?}", amount))?;

    println!("{}", wei);
    Ok(())
}

fn cmd_sample_config(output_path: PathBuf) -> Result<()> {
    let config = io::LabConfig::default();
    io::save_config(&config, &output_path)?;

    println!("Sample config saved to {:?}", output_path);
    println!("  Hardfork: {}", config.devnet.hardfork);
    println!("  Token: {}", config.scenario.token_name);
    println!("  Deposit: {}", format_ether(config.scenario.deposit));

    Ok(())
}
