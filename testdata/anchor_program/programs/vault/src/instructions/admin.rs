use anchor_lang::prelude::*;

use crate::state::*;

#[derive(Accounts)]
pub struct UpdateAdmin<'info> {
    #[account(mut, has_one = admin)]
    pub global: Account<'info, Global>,
    pub admin: Signer<'info>,
    /// CHECK: only stored
    pub new_admin: UncheckedAccount<'info>,
}

pub fn handler(ctx: Context<UpdateAdmin>) -> Result<()> {
    require_keys_eq!(ctx.accounts.global.authority, ctx.accounts.admin.key());
    Ok(())
}
