#[account]
pub struct Before {
    pub amount: u64,
}

pub const BANNER: &str = r#"never closed;

#[account]
pub struct After {
    pub amount: u64,
}
