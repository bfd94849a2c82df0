pub mod borrow;
pub mod claim_rewards;
pub mod create_vault;
pub mod deposit;
pub mod pending_rewards;
pub mod repay;
pub mod withdraw;

pub use borrow::*;
pub use claim_rewards::*;
pub use create_vault::*;
pub use deposit::*;
pub use pending_rewards::*;
pub use repay::*;
pub use withdraw::*;
