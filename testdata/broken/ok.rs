#[account]
pub struct Healthy {
    pub amount: u64,
}
