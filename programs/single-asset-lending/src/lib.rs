pub mod constants;
pub mod error;
pub mod events;
pub mod instructions;
pub mod macros;
pub mod pda;
pub mod state;
pub mod utils;

use anchor_lang::prelude::*;

pub use constants::*;
pub use instructions::*;
pub use state::*;

declare_id!("F5dLpWLFYuEGEZZNf2RQt8sJnr5mzgpDhY3npuz8JggS");

#[program]
pub mod single_asset_lending {
    use super::*;

    /// Returns the address of the new `VaultState`
    pub fn create_vault(
        ctx: Context<CreateVault>,
        interest_rate_bps: u16,
        collateral_factor_bps: u16,
    ) -> Result<Pubkey> {
        create_vault::handler(ctx, interest_rate_bps, collateral_factor_bps)
    }

    pub fn deposit(ctx: Context<Deposit>, amount: u64) -> Result<()> {
        deposit::handler(ctx, amount)
    }

    pub fn borrow(ctx: Context<Borrow>, vault_bump: u8, amount: u64) -> Result<()> {
        borrow::handler(ctx, vault_bump, amount)
    }

    pub fn repay(ctx: Context<Repay>, amount: u64) -> Result<()> {
        repay::handler(ctx, amount)
    }

    pub fn withdraw(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
        withdraw::handler(ctx, amount)
    }

    pub fn claim_rewards(ctx: Context<ClaimRewards>) -> Result<()> {
        claim_rewards::handler(ctx)
    }

    /// Read-only projection of a user's claimable rewards
    pub fn pending_rewards(ctx: Context<PendingRewards>) -> Result<u64> {
        pending_rewards::handler(ctx)
    }
}
