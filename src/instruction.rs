//! Instruction builders

use crate::state::MultisigConfig;
use solana_program::{
    instruction::Instruction, program_error::ProgramError, program_pack::Pack, pubkey::Pubkey,
    system_instruction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use spl_token::state::{Mint, Multisig};

/// Allocate a multisig account and register its signers
pub fn create_multisig(
    payer: &Pubkey,
    multisig: &Pubkey,
    config: &MultisigConfig,
    lamports: u64,
) -> Result<Vec<Instruction>, ProgramError> {
    let signers: Vec<&Pubkey> = config.signers.iter().collect();
    Ok(vec![
        system_instruction::create_account(
            payer,
            multisig,
            lamports,
            Multisig::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_multisig2(
            &spl_token::id(),
            multisig,
            &signers,
            config.threshold,
        )?,
    ])
}

/// Allocate a mint account and set its authorities
pub fn create_mint(
    payer: &Pubkey,
    mint: &Pubkey,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
    decimals: u8,
    lamports: u64,
) -> Result<Vec<Instruction>, ProgramError> {
    Ok(vec![
        system_instruction::create_account(
            payer,
            mint,
            lamports,
            Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint2(
            &spl_token::id(),
            mint,
            mint_authority,
            freeze_authority,
            decimals,
        )?,
    ])
}

/// Derived token account address of `owner` for `mint`, with the instruction creating it
pub fn create_associated_account(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> (Pubkey, Instruction) {
    (
        get_associated_token_address(owner, mint),
        create_associated_token_account_idempotent(payer, owner, mint, &spl_token::id()),
    )
}

/// Mint `amount` with a multisig as mint authority
pub fn mint_to_multisig(
    mint: &Pubkey,
    destination: &Pubkey,
    multisig: &Pubkey,
    signers: &[Pubkey],
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let signers: Vec<&Pubkey> = signers.iter().collect();
    spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        destination,
        multisig,
        &signers,
        amount,
    )
}
