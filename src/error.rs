//! Error types

use num_traits::FromPrimitive;
use solana_client::client_error::ClientError;
use solana_program::{instruction::InstructionError, program_error::ProgramError, pubkey::Pubkey};
use solana_sdk::{signer::SignerError, transaction::TransactionError};
use spl_token::error::TokenError;
use thiserror::Error;

/// Errors that may be returned while driving the token program.
#[derive(Debug, Error)]
pub enum MintError {
    /// A secret key environment variable is not set.
    #[error("Add {var} to .env!")]
    MissingSecretKey {
        /// name of the missing variable
        var: String,
    },
    /// A secret key could not be parsed into a keypair.
    #[error("Invalid secret key in {var}: {reason}")]
    InvalidSecretKey {
        /// name of the offending variable
        var: String,
        /// parser message
        reason: String,
    },
    /// Multisig signer set or threshold is unusable.
    #[error("Invalid multisig: {0}")]
    InvalidMultisig(String),
    /// Not enough distinct multisig members signed.
    #[error("Insufficient signers: have {have}, need {need}")]
    InsufficientSigners {
        /// distinct members supplied
        have: usize,
        /// multisig threshold
        need: usize,
    },
    /// A supplied signer is not a member of the multisig.
    #[error("{0} is not a signer of the multisig")]
    UnknownSigner(Pubkey),
    /// An account expected on the ledger does not exist.
    #[error("Account {0} not found")]
    AccountNotFound(Pubkey),
    /// Account data does not decode as the expected token program state.
    #[error("Account {0} holds invalid data")]
    InvalidAccountData(Pubkey),
    /// An airdrop was requested but never confirmed.
    #[error("Airdrop to {0} was not confirmed")]
    AirdropNotConfirmed(Pubkey),
    /// A transaction expected to be rejected was accepted.
    #[error("Transaction {0} was expected to fail")]
    UnexpectedSuccess(String),
    /// Unknown cluster moniker.
    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),
    /// RPC or transaction failure reported by the client.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Failure building an instruction.
    #[error(transparent)]
    Program(#[from] ProgramError),
    /// Failure signing a transaction.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl MintError {
    /// The transaction error the ledger answered with, if the failure carries one
    pub fn transaction_error(&self) -> Option<TransactionError> {
        match self {
            MintError::Client(e) => e.get_transaction_error(),
            _ => None,
        }
    }

    /// The token program error carried by a failed transaction, if any
    pub fn token_error(&self) -> Option<TokenError> {
        self.transaction_error()
            .as_ref()
            .and_then(token_error_from_transaction)
    }
}

/// Decode the custom program error code of a failed instruction
pub fn token_error_from_transaction(err: &TransactionError) -> Option<TokenError> {
    match err {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
            TokenError::from_u32(*code)
        }
        _ => None,
    }
}

/// Human readable form of a ledger rejection, naming the token error when one decodes
pub fn describe_rejection(err: &TransactionError) -> String {
    match token_error_from_transaction(err) {
        Some(token_error) => format!("{:?} ({:?})", err, token_error),
        None => format!("{:?}", err),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_owner_mismatch() {
        let err = TransactionError::InstructionError(
            0,
            InstructionError::Custom(TokenError::OwnerMismatch as u32),
        );
        assert_eq!(
            token_error_from_transaction(&err),
            Some(TokenError::OwnerMismatch)
        );
        assert_eq!(
            describe_rejection(&err),
            "InstructionError(0, Custom(4)) (OwnerMismatch)"
        );
    }

    #[test]
    fn describe_missing_signature_rejection() {
        let err = TransactionError::InstructionError(0, InstructionError::MissingRequiredSignature);
        assert_eq!(token_error_from_transaction(&err), None);
        assert_eq!(
            describe_rejection(&err),
            "InstructionError(0, MissingRequiredSignature)"
        );
    }

    #[test]
    fn client_error_carries_transaction_error() {
        let tx_err = TransactionError::InstructionError(0, InstructionError::MissingRequiredSignature);
        let err = MintError::Client(ClientError::from(tx_err.clone()));
        assert_eq!(err.transaction_error(), Some(tx_err));
        assert_eq!(err.token_error(), None);
    }

    #[test]
    fn ignore_non_custom_errors() {
        let err = TransactionError::InstructionError(0, InstructionError::MissingRequiredSignature);
        assert_eq!(token_error_from_transaction(&err), None);
        assert_eq!(
            token_error_from_transaction(&TransactionError::AccountNotFound),
            None
        );
    }

    #[test]
    fn ignore_unknown_custom_code() {
        let err = TransactionError::InstructionError(1, InstructionError::Custom(9999));
        assert_eq!(token_error_from_transaction(&err), None);
    }

    #[test]
    fn missing_key_message() {
        let err = MintError::MissingSecretKey {
            var: "SECRET_KEY3".to_string(),
        };
        assert_eq!(err.to_string(), "Add SECRET_KEY3 to .env!");
        assert_eq!(err.transaction_error(), None);
    }
}
