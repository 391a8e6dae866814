#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! Create an SPL token multisig, a mint controlled by it, and mint tokens once
//! a quorum of the multisig signers has signed.

#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod utils;

// Export current sdk types for downstream users building with a different sdk version
pub use solana_program;
pub use spl_token;
