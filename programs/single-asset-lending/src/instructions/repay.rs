use anchor_lang::prelude::*;
use anchor_spl::token_interface::{
    transfer_checked, Mint, TokenAccount, TokenInterface, TransferChecked,
};

use crate::constants::*;
use crate::error::LendingError;
use crate::events::Repaid;
use crate::state::{UserSlot, VaultState};
use crate::utils::write_account;

#[derive(Accounts)]
pub struct Repay<'info> {
    pub payer: Signer<'info>,

    pub vault_mint: InterfaceAccount<'info, Mint>,

    #[account(
        mut,
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

    /// Receives the fee part of each repayment
    #[account(
        mut,
        token::mint = vault_mint,
        seeds = [VAULT_REWARDS_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.rewards_bump,
    )]
    pub vault_rewards_account: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: The payer's record, loaded by the handler
    #[account(
        mut,
        seeds = [USER_STATE_SEED, vault_account.key().as_ref(), payer.key().as_ref()],
        bump
    )]
    pub user_state_account: UncheckedAccount<'info>,

    #[account(
        mut,
        token::mint = vault_mint,
        token::authority = payer,
    )]
    pub user_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> Repay<'info> {
    fn transfer_from_payer(&self, to: AccountInfo<'info>, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let cpi_accounts = TransferChecked {
            from: self.user_token_account.to_account_info(),
            mint: self.vault_mint.to_account_info(),
            to,
            authority: self.payer.to_account_info(),
        };
        let cpi_ctx = CpiContext::new(self.token_program.to_account_info(), cpi_accounts);
        transfer_checked(cpi_ctx, amount, self.vault_mint.decimals)
    }

    fn ensure_reconciled(&self) -> Result<()> {
        self.vault_state_account
            .ensure_reconciled(self.vault_account.amount, self.vault_rewards_account.amount)?;
        Ok(())
    }
}

pub fn handler(ctx: Context<Repay>, amount: u64) -> Result<()> {
    require!(amount > 0, LendingError::InvalidParameter);
    require!(
        ctx.accounts.user_token_account.amount >= amount,
        LendingError::InsufficientBalance
    );

    let user_info = ctx.accounts.user_state_account.to_account_info();
    let mut user_state = UserSlot::load(&user_info)?.present()?;
    require_keys_eq!(
        user_state.owner,
        ctx.accounts.payer.key(),
        LendingError::Unauthorized
    );
    ctx.accounts.ensure_reconciled()?;

    let split = ctx
        .accounts
        .vault_state_account
        .repay(&mut user_state, amount)?;

    let vault_account = ctx.accounts.vault_account.to_account_info();
    let rewards_account = ctx.accounts.vault_rewards_account.to_account_info();
    ctx.accounts.transfer_from_payer(vault_account, split.principal)?;
    ctx.accounts.transfer_from_payer(rewards_account, split.interest)?;
    write_account(&user_info, &user_state)?;

    ctx.accounts.vault_account.reload()?;
    ctx.accounts.vault_rewards_account.reload()?;
    ctx.accounts.ensure_reconciled()?;

    emit!(Repaid {
        owner: user_state.owner,
        vault: ctx.accounts.vault_account.key(),
        principal: split.principal,
        interest: split.interest,
    });

    msg!("Repay successful!");
    msg!("Principal: {} tokens to vault", split.principal);
    msg!("Interest: {} tokens to rewards", split.interest);
    msg!("User still owes: {}", user_state.amount_owed);
    msg!(
        "Total vault borrowed: {}",
        ctx.accounts.vault_state_account.total_borrowed
    );

    Ok(())
}
