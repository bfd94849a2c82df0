use anchor_lang::prelude::*;
use anchor_spl::token_interface::Mint;

use crate::constants::*;
use crate::state::{UserSlot, VaultState};

/// Read-only: nothing in here is writable
#[derive(Accounts)]
pub struct PendingRewards<'info> {
    /// CHECK: Any wallet; only used to derive its user state address
    pub owner: UncheckedAccount<'info>,

    pub vault_mint: InterfaceAccount<'info, Mint>,

    /// CHECK: Only its address is used, as a seed
    #[account(
        seeds = [VAULT_SEED, vault_mint.key().as_ref()],
        bump = vault_state_account.vault_bump,
    )]
    pub vault_account: UncheckedAccount<'info>,

    #[account(
        seeds = [VAULT_STATE_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.state_bump,
        has_one = vault_account,
    )]
    pub vault_state_account: Box<Account<'info, VaultState>>,

    /// CHECK: The owner's record, loaded by the handler
    #[account(
        seeds = [USER_STATE_SEED, vault_account.key().as_ref(), owner.key().as_ref()],
        bump
    )]
    pub user_state_account: UncheckedAccount<'info>,
}

pub fn handler(ctx: Context<PendingRewards>) -> Result<u64> {
    let user_info = ctx.accounts.user_state_account.to_account_info();
    let user_state = UserSlot::load(&user_info)?.present()?;

    let pending = ctx.accounts.vault_state_account.pending_rewards(&user_state)?;

    msg!("Pending rewards for {}: {}", user_state.owner, pending);

    Ok(pending)
}
