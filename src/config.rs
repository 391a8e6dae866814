//! Cluster and run configuration

use crate::error::MintError;
use solana_sdk::{commitment_config::CommitmentConfig, native_token::sol_to_lamports};
use std::{fmt, str::FromStr};

/// Default multisig threshold
pub const DEFAULT_THRESHOLD: u8 = 2;
/// Default mint decimals
pub const DEFAULT_DECIMALS: u8 = 9;
/// Default amount to mint, in base units
pub const DEFAULT_AMOUNT: u64 = 1;

/// A Solana cluster to connect to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cluster {
    /// public devnet
    Devnet,
    /// public testnet
    Testnet,
    /// mainnet beta
    MainnetBeta,
    /// a local test validator
    Localnet,
    /// any other RPC endpoint
    Custom(String),
}

impl Cluster {
    /// RPC endpoint of the cluster
    pub fn url(&self) -> &str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Localnet => "http://127.0.0.1:8899",
            Cluster::Custom(url) => url,
        }
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Cluster::Devnet
    }
}

impl FromStr for Cluster {
    type Err = MintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "devnet" | "d" => Cluster::Devnet,
            "testnet" | "t" => Cluster::Testnet,
            "mainnet-beta" | "mainnet" | "m" => Cluster::MainnetBeta,
            "localnet" | "localhost" | "l" => Cluster::Localnet,
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Cluster::Custom(url.to_string())
            }
            other => return Err(MintError::UnknownCluster(other.to_string())),
        })
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Devnet => write!(f, "devnet"),
            Cluster::Testnet => write!(f, "testnet"),
            Cluster::MainnetBeta => write!(f, "mainnet-beta"),
            Cluster::Localnet => write!(f, "localnet"),
            Cluster::Custom(url) => write!(f, "{}", url),
        }
    }
}

/// Top up an account when its balance falls below `min_lamports`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AirdropPolicy {
    /// balance under which an airdrop is requested
    pub min_lamports: u64,
    /// balance the airdrop brings the account up to
    pub target_lamports: u64,
}

impl AirdropPolicy {
    /// Build a policy from SOL amounts
    pub fn from_sol(min_sol: f64, target_sol: f64) -> Self {
        AirdropPolicy {
            min_lamports: sol_to_lamports(min_sol),
            target_lamports: sol_to_lamports(target_sol),
        }
    }

    /// Lamports to request for the given balance, if any
    pub fn shortfall(&self, balance: u64) -> Option<u64> {
        if balance >= self.min_lamports {
            return None;
        }
        match self.target_lamports.saturating_sub(balance) {
            0 => None,
            lamports => Some(lamports),
        }
    }
}

/// Settings for one run of the multisig mint flow.
#[derive(Clone, Debug)]
pub struct Config {
    /// cluster to connect to
    pub cluster: Cluster,
    /// commitment used for reads and confirmations
    pub commitment: CommitmentConfig,
    /// multisig threshold
    pub threshold: u8,
    /// mint decimals
    pub decimals: u8,
    /// amount to mint, in base units
    pub amount: u64,
    /// optional payer top up before the flow
    pub airdrop: Option<AirdropPolicy>,
    /// try an under-signed mint after the authorized one
    pub under_signed_attempt: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster: Cluster::default(),
            commitment: CommitmentConfig::confirmed(),
            threshold: DEFAULT_THRESHOLD,
            decimals: DEFAULT_DECIMALS,
            amount: DEFAULT_AMOUNT,
            airdrop: None,
            under_signed_attempt: false,
        }
    }
}
