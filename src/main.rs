//! Multisig mint CLI
//!
//! Creates a 2-of-3 token multisig, a mint controlled by it, and mints into the
//! first signer's associated token account with two of the three signatures.
//!
//! Secret keys are read from `SECRET_KEY1` (payer) through `SECRET_KEY4`, either
//! from the environment or a `.env` file.

use clap::Parser;
use env_logger::Env;
use solana_multisig_mint::{
    config::{AirdropPolicy, Cluster, Config, DEFAULT_AMOUNT, DEFAULT_DECIMALS, DEFAULT_THRESHOLD},
    error::MintError,
    processor::Processor,
    utils::load_keypairs,
};
use solana_sdk::{commitment_config::CommitmentConfig, signer::Signer};
use std::{process, str::FromStr};

/// payer plus three multisig signers
const KEYPAIR_COUNT: usize = 4;

#[derive(Parser)]
#[command(name = "multisig-mint")]
#[command(version)]
#[command(about = "Mint SPL tokens under a multisig authority", long_about = None)]
struct Cli {
    /// Cluster moniker (devnet, testnet, mainnet-beta, localnet) or RPC URL
    #[arg(short = 'u', long, env = "SOLANA_CLUSTER", default_value = "devnet", value_parser = parse_cluster)]
    cluster: Cluster,

    /// Commitment level for reads and confirmations
    #[arg(long, env = "SOLANA_COMMITMENT", default_value = "confirmed", value_parser = parse_commitment)]
    commitment: CommitmentConfig,

    /// Environment variable prefix of the secret keys
    #[arg(long, env = "SECRET_KEY_PREFIX", default_value = "SECRET_KEY")]
    key_prefix: String,

    /// Signatures required by the multisig
    #[arg(short, long, env = "MULTISIG_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Decimal places of the mint
    #[arg(short, long, env = "MINT_DECIMALS", default_value_t = DEFAULT_DECIMALS)]
    decimals: u8,

    /// Amount to mint, in base units
    #[arg(short, long, env = "MINT_AMOUNT", default_value_t = DEFAULT_AMOUNT)]
    amount: u64,

    /// Airdrop to the payer when its balance is below this many SOL
    #[arg(long)]
    airdrop_min_sol: Option<f64>,

    /// Balance in SOL an airdrop tops the payer up to
    #[arg(long, default_value_t = 10.0)]
    airdrop_target_sol: f64,

    /// After minting, send a mint signed by one signer and report the rejection
    #[arg(long)]
    under_signed_attempt: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_cluster(s: &str) -> Result<Cluster, String> {
    Cluster::from_str(s).map_err(|e| e.to_string())
}

fn parse_commitment(s: &str) -> Result<CommitmentConfig, String> {
    CommitmentConfig::from_str(s).map_err(|_| format!("invalid commitment: {}", s))
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            cluster: self.cluster.clone(),
            commitment: self.commitment,
            threshold: self.threshold,
            decimals: self.decimals,
            amount: self.amount,
            airdrop: self
                .airdrop_min_sol
                .map(|min| AirdropPolicy::from_sol(min, self.airdrop_target_sol)),
            under_signed_attempt: self.under_signed_attempt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut keypairs = match load_keypairs(&cli.key_prefix, KEYPAIR_COUNT) {
        Ok(keypairs) => keypairs,
        Err(e @ MintError::MissingSecretKey { .. }) => {
            eprintln!("{}", e);
            process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    for (n, keypair) in keypairs.iter().enumerate() {
        println!("Public key{}: {}", n + 1, keypair.pubkey());
    }

    let payer = keypairs.remove(0);
    let signers = keypairs;

    let config = cli.config();
    println!("Connecting to {} ({})", config.cluster, config.cluster.url());
    let processor = Processor::connect(payer, config);

    let report = processor.run(&signers).await?;

    println!(
        "Created {}/{} multisig {}",
        report.multisig.m, report.multisig.n, report.multisig.address
    );
    println!("Mint public key is: {}", report.mint.address);
    println!(
        "Associated token account public key is: {}",
        report.associated_account.address
    );
    if let Some(rejected) = &report.rejected_with {
        println!("Under-signed mint rejected with {}", rejected);
    }
    println!("Minted {} token", report.mint.supply);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
