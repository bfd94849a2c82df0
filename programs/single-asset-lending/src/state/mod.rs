pub mod user_state;
pub mod vault_state;

pub use user_state::*;
pub use vault_state::*;
