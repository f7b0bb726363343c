use anchor_lang::prelude::*;

#[account]
pub struct Global {
    pub initialized: bool,
    pub authority: Pubkey,
}

#[account]
#[derive(Default)]
pub struct Vault {
    pub authority: Pubkey,
    pub reserve: u64,
    pub positions: Vec<Vec<u64>>,
    pub label: [u8; 32],
}

/* struct Commented { hidden: u8 } */
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Pyth,
    Switchboard { feed: Pubkey },
}

pub struct Ratio(pub u64, pub u64);
