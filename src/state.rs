//! Local views of token program state
use crate::error::MintError;
use serde::Serializer;
use solana_program::{program_pack::Pack, pubkey::Pubkey};
use spl_token::{
    amount_to_ui_amount,
    instruction::{MAX_SIGNERS, MIN_SIGNERS},
    state::{Account, Mint, Multisig},
};
use std::collections::BTreeSet;

/// Signer set and threshold of a token multisig
#[derive(Clone, Debug, PartialEq)]
pub struct MultisigConfig {
    /// multisig members, in the order they are registered
    pub signers: Vec<Pubkey>,
    /// number of member signatures required
    pub threshold: u8,
}

impl MultisigConfig {
    /// Build a config without checking it
    pub fn new(signers: Vec<Pubkey>, threshold: u8) -> Self {
        MultisigConfig { signers, threshold }
    }

    /// distinct members
    pub fn members(&self) -> BTreeSet<Pubkey> {
        self.signers.iter().cloned().collect()
    }

    /// Reject configs the token program would refuse to initialize
    pub fn validate(&self) -> Result<(), MintError> {
        let n = self.signers.len();
        if n < MIN_SIGNERS || n > MAX_SIGNERS {
            return Err(MintError::InvalidMultisig(format!(
                "signer count {} outside {}..={}",
                n, MIN_SIGNERS, MAX_SIGNERS
            )));
        }
        if self.members().len() != n {
            return Err(MintError::InvalidMultisig("duplicate signer".to_string()));
        }
        if self.threshold == 0 || usize::from(self.threshold) > n {
            return Err(MintError::InvalidMultisig(format!(
                "threshold {} outside 1..={}",
                self.threshold, n
            )));
        }
        Ok(())
    }

    /// Check supplied signers reach the threshold
    pub fn check_quorum(&self, supplied: &[Pubkey]) -> Result<(), MintError> {
        let members = self.members();
        let mut counted = BTreeSet::new();

        for pubkey in supplied {
            if !members.contains(pubkey) {
                return Err(MintError::UnknownSigner(*pubkey));
            }
            counted.insert(*pubkey);
        }

        let need = usize::from(self.threshold);
        if counted.len() < need {
            return Err(MintError::InsufficientSigners {
                have: counted.len(),
                need,
            });
        }
        Ok(())
    }
}

pub(crate) fn serialize_pubkey<S: Serializer>(pubkey: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(pubkey)
}

fn serialize_pubkeys<S: Serializer>(pubkeys: &[Pubkey], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(pubkeys.iter().map(|p| p.to_string()))
}

fn serialize_opt_pubkey<S: Serializer>(pubkey: &Option<Pubkey>, s: S) -> Result<S::Ok, S::Error> {
    match pubkey {
        Some(pubkey) => s.collect_str(pubkey),
        None => s.serialize_none(),
    }
}

/// Decoded multisig account
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MultisigSummary {
    /// account address
    #[serde(serialize_with = "serialize_pubkey")]
    pub address: Pubkey,
    /// required signatures
    pub m: u8,
    /// registered signers
    pub n: u8,
    /// the first `n` signer slots
    #[serde(serialize_with = "serialize_pubkeys")]
    pub signers: Vec<Pubkey>,
}

impl MultisigSummary {
    /// give data and parse it as a multisig
    pub fn unpack(address: Pubkey, data: &[u8]) -> Result<Self, MintError> {
        let multisig = Multisig::unpack(data).map_err(|_| MintError::InvalidAccountData(address))?;
        Ok(MultisigSummary {
            address,
            m: multisig.m,
            n: multisig.n,
            signers: multisig
                .signers
                .iter()
                .take(usize::from(multisig.n))
                .cloned()
                .collect(),
        })
    }
}

/// Decoded mint account
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MintSummary {
    /// account address
    #[serde(serialize_with = "serialize_pubkey")]
    pub address: Pubkey,
    /// total supply in base units
    pub supply: u64,
    /// decimal places
    pub decimals: u8,
    /// who may mint
    #[serde(serialize_with = "serialize_opt_pubkey")]
    pub mint_authority: Option<Pubkey>,
    /// who may freeze token accounts
    #[serde(serialize_with = "serialize_opt_pubkey")]
    pub freeze_authority: Option<Pubkey>,
}

impl MintSummary {
    /// give data and parse it as a mint
    pub fn unpack(address: Pubkey, data: &[u8]) -> Result<Self, MintError> {
        let mint = Mint::unpack(data).map_err(|_| MintError::InvalidAccountData(address))?;
        Ok(MintSummary {
            address,
            supply: mint.supply,
            decimals: mint.decimals,
            mint_authority: mint.mint_authority.into(),
            freeze_authority: mint.freeze_authority.into(),
        })
    }

    /// supply scaled by decimals
    pub fn ui_supply(&self) -> f64 {
        amount_to_ui_amount(self.supply, self.decimals)
    }
}

/// Decoded token account
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TokenAccountSummary {
    /// account address
    #[serde(serialize_with = "serialize_pubkey")]
    pub address: Pubkey,
    /// mint of the held token
    #[serde(serialize_with = "serialize_pubkey")]
    pub mint: Pubkey,
    /// wallet owning the balance
    #[serde(serialize_with = "serialize_pubkey")]
    pub owner: Pubkey,
    /// balance in base units
    pub amount: u64,
}

impl TokenAccountSummary {
    /// give data and parse it as a token account
    pub fn unpack(address: Pubkey, data: &[u8]) -> Result<Self, MintError> {
        let account = Account::unpack(data).map_err(|_| MintError::InvalidAccountData(address))?;
        Ok(TokenAccountSummary {
            address,
            mint: account.mint,
            owner: account.owner,
            amount: account.amount,
        })
    }
}
