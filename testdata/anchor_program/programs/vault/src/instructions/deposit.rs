use anchor_lang::prelude::*;

use crate::state::*;

#[derive(Accounts)]
#[instruction(amount: u64)]
pub struct Deposit<'info> {
    #[account(
        mut,
        seeds = [b"vault", authority.key().as_ref()],
        bump,
        has_one = authority,
        constraint = vault.reserve >= amount @ VaultError::Insufficient,
    )]
    pub vault: Account<'info, Vault>,
    #[account(mut)]
    pub authority: Signer<'info>,
    pub system_program: Program<'info, System>,
}

pub fn handler(ctx: Context<Deposit>, amount: u64) -> Result<()> {
    let vault = &mut ctx.accounts.vault;
    let note = "pub struct NotReal { x: u8 }";
    msg!("{} {}", note, '}');
    vault.reserve = vault
        .reserve
        .checked_add(amount)
        .ok_or(VaultError::Overflow)?;
    Ok(())
}

#[error_code]
pub enum VaultError {
    #[msg("insufficient reserve")]
    Insufficient,
    #[msg("overflow")]
    Overflow,
}
