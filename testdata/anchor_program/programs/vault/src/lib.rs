use anchor_lang::prelude::*;

pub mod instructions;
pub mod state;

use instructions::*;

declare_id!("Vau1t11111111111111111111111111111111111111");

pub const FEE_BPS: u16 = 30;
const MAX_DEPOSIT: u64 = 1_000_000; // pub struct Fake { a: u8 }

#[program]
pub mod vault {
    use super::*;

    pub fn deposit(ctx: Context<Deposit>, amount: u64) -> Result<()> {
        instructions::deposit::handler(ctx, amount)
    }

    pub fn update_admin(ctx: Context<UpdateAdmin>) -> Result<()> {
        instructions::admin::handler(ctx)
    }
}
