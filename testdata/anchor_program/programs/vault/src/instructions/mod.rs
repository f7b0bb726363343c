pub mod admin;
pub mod deposit;

pub use admin::*;
pub use deposit::*;
