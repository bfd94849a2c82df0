use anchor_lang::prelude::*;
use anchor_spl::token_interface::{
    transfer_checked, Mint, TokenAccount, TokenInterface, TransferChecked,
};

use crate::constants::*;
use crate::error::LendingError;
use crate::events::RewardsClaimed;
use crate::state::{UserSlot, VaultState};
use crate::utils::write_account;
use crate::vault_authority_signer_seeds;

#[derive(Accounts)]
pub struct ClaimRewards<'info> {
    pub owner: Signer<'info>,

    pub vault_mint: InterfaceAccount<'info, Mint>,

    /// Read for reconciliation only
    #[account(
        token::mint = vault_mint,
        seeds = [VAULT_SEED, vault_mint.key().as_ref()],
        bump = vault_state_account.vault_bump,
    )]
    pub vault_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [VAULT_STATE_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.state_bump,
        has_one = vault_account,
    )]
    pub vault_state_account: Box<Account<'info, VaultState>>,

    #[account(
        mut,
        token::mint = vault_mint,
        seeds = [VAULT_REWARDS_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.rewards_bump,
    )]
    pub vault_rewards_account: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: Signer PDA for transfers out of the rewards account
    #[account(
        seeds = [VAULT_AUTHORITY_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.authority_bump,
    )]
    pub vault_authority: UncheckedAccount<'info>,

    /// CHECK: The owner's record, loaded by the handler
    #[account(
        mut,
        seeds = [USER_STATE_SEED, vault_account.key().as_ref(), owner.key().as_ref()],
        bump
    )]
    pub user_state_account: UncheckedAccount<'info>,

    #[account(
        mut,
        token::mint = vault_mint,
    )]
    pub user_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> ClaimRewards<'info> {
    fn transfer_from_rewards(&self, amount: u64) -> Result<()> {
        let vault_key = self.vault_account.key();
        let signer_seeds: &[&[&[u8]]] = &[vault_authority_signer_seeds!(
            vault_key,
            self.vault_state_account.authority_bump
        )];

        let cpi_accounts = TransferChecked {
            from: self.vault_rewards_account.to_account_info(),
            mint: self.vault_mint.to_account_info(),
            to: self.user_token_account.to_account_info(),
            authority: self.vault_authority.to_account_info(),
        };
        let cpi_ctx = CpiContext::new_with_signer(
            self.token_program.to_account_info(),
            cpi_accounts,
            signer_seeds,
        );
        transfer_checked(cpi_ctx, amount, self.vault_mint.decimals)
    }

    fn ensure_reconciled(&self) -> Result<()> {
        self.vault_state_account
            .ensure_reconciled(self.vault_account.amount, self.vault_rewards_account.amount)?;
        Ok(())
    }
}

pub fn handler(ctx: Context<ClaimRewards>) -> Result<()> {
    let user_info = ctx.accounts.user_state_account.to_account_info();
    let mut user_state = UserSlot::load(&user_info)?.present()?;
    require_keys_eq!(
        user_state.owner,
        ctx.accounts.owner.key(),
        LendingError::Unauthorized
    );
    ctx.accounts.ensure_reconciled()?;

    let amount = ctx
        .accounts
        .vault_state_account
        .claim_rewards(&mut user_state)?;

    ctx.accounts.transfer_from_rewards(amount)?;
    write_account(&user_info, &user_state)?;

    ctx.accounts.vault_rewards_account.reload()?;
    ctx.accounts.ensure_reconciled()?;

    emit!(RewardsClaimed {
        owner: user_state.owner,
        vault: ctx.accounts.vault_account.key(),
        amount,
    });

    msg!("Rewards claimed!");
    msg!("Claimed: {} tokens", amount);
    msg!(
        "Rewards left in vault: {}",
        ctx.accounts.vault_rewards_account.amount
    );

    Ok(())
}
