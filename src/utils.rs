//! utils
use crate::error::MintError;
use solana_sdk::signature::Keypair;
use std::env;

/// Length of an ed25519 keypair secret (secret + public half)
pub const KEYPAIR_LEN: usize = 64;

/// parse a JSON byte array as written by solana-keygen
pub fn keypair_from_json(text: &str) -> Result<Keypair, String> {
    let bytes: Vec<u8> = serde_json::from_str(text).map_err(|e| e.to_string())?;
    keypair_from_bytes(&bytes)
}

/// parse a base58 encoded secret key as exported by wallets
pub fn keypair_from_base58(text: &str) -> Result<Keypair, String> {
    let bytes = bs58::decode(text).into_vec().map_err(|e| e.to_string())?;
    keypair_from_bytes(&bytes)
}

/// parse either form of secret key
pub fn parse_keypair(text: &str) -> Result<Keypair, String> {
    let text = text.trim();
    if text.starts_with('[') {
        keypair_from_json(text)
    } else {
        keypair_from_base58(text)
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, String> {
    if bytes.len() != KEYPAIR_LEN {
        return Err(format!(
            "expected {} bytes, got {}",
            KEYPAIR_LEN,
            bytes.len()
        ));
    }
    Keypair::from_bytes(bytes).map_err(|e| e.to_string())
}

/// read a keypair from an environment variable
pub fn keypair_from_env(var: &str) -> Result<Keypair, MintError> {
    let text = env::var(var).map_err(|_| MintError::MissingSecretKey {
        var: var.to_string(),
    })?;
    parse_keypair(&text).map_err(|reason| MintError::InvalidSecretKey {
        var: var.to_string(),
        reason,
    })
}

/// read `{prefix}1` ..= `{prefix}{count}` in order
pub fn load_keypairs(prefix: &str, count: usize) -> Result<Vec<Keypair>, MintError> {
    (1..=count)
        .map(|n| keypair_from_env(&format!("{}{}", prefix, n)))
        .collect()
}
