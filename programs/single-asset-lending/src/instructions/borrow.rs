use anchor_lang::prelude::*;
use anchor_spl::token_interface::{
    transfer_checked, Mint, TokenAccount, TokenInterface, TransferChecked,
};

use crate::constants::*;
use crate::error::LendingError;
use crate::events::Borrowed;
use crate::state::{UserSlot, VaultState};
use crate::utils::write_account;
use crate::vault_authority_signer_seeds;

#[derive(Accounts)]
#[instruction(vault_bump: u8)]
pub struct Borrow<'info> {
    pub borrower: Signer<'info>,

    /// The asset held by the vault
    #[account(
        constraint = vault_state_account.vault_bump == vault_bump @ LendingError::InvalidParameter,
    )]
    pub vault_mint: InterfaceAccount<'info, Mint>,

    /// The vault's token account, re-derived with the caller's bump
    #[account(
        mut,
        token::mint = vault_mint,
        seeds = [VAULT_SEED, vault_mint.key().as_ref()],
        bump = vault_bump,
    )]
    pub vault_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [VAULT_STATE_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.state_bump,
        has_one = vault_account,
    )]
    pub vault_state_account: Box<Account<'info, VaultState>>,

    /// Read for reconciliation only
    #[account(
        seeds = [VAULT_REWARDS_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.rewards_bump,
    )]
    pub vault_rewards_account: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: Signer PDA for transfers out of the vault account
    #[account(
        seeds = [VAULT_AUTHORITY_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.authority_bump,
    )]
    pub vault_authority: UncheckedAccount<'info>,

    /// CHECK: The borrower's record; loaded by the handler so a missing one reports `NotFound`
    #[account(
        mut,
        seeds = [USER_STATE_SEED, vault_account.key().as_ref(), borrower.key().as_ref()],
        bump
    )]
    pub user_state_account: UncheckedAccount<'info>,

    /// The token account receiving the borrowed tokens
    #[account(
        mut,
        token::mint = vault_mint,
    )]
    pub user_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> Borrow<'info> {
    fn transfer_from_vault(&self, amount: u64) -> Result<()> {
        let vault_key = self.vault_account.key();
        let signer_seeds: &[&[&[u8]]] = &[vault_authority_signer_seeds!(
            vault_key,
            self.vault_state_account.authority_bump
        )];

        let cpi_accounts = TransferChecked {
            from: self.vault_account.to_account_info(),
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

pub fn handler(ctx: Context<Borrow>, _vault_bump: u8, amount: u64) -> Result<()> {
    require!(amount > 0, LendingError::InvalidParameter);

    let user_info = ctx.accounts.user_state_account.to_account_info();
    let mut user_state = UserSlot::load(&user_info)?.present()?;
    require_keys_eq!(
        user_state.owner,
        ctx.accounts.borrower.key(),
        LendingError::Unauthorized
    );
    ctx.accounts.ensure_reconciled()?;

    let fee = ctx
        .accounts
        .vault_state_account
        .borrow(&mut user_state, amount)?;

    ctx.accounts.transfer_from_vault(amount)?;
    write_account(&user_info, &user_state)?;

    ctx.accounts.vault_account.reload()?;
    ctx.accounts.ensure_reconciled()?;

    let vault_state = &ctx.accounts.vault_state_account;
    emit!(Borrowed {
        owner: user_state.owner,
        vault: vault_state.vault_account,
        amount,
        fee,
        total_borrowed: vault_state.total_borrowed,
    });

    msg!("Borrow successful!");
    msg!("Borrowed: {} tokens (fee {})", amount, fee);
    msg!(
        "User borrows: {} of {} allowed",
        user_state.borrowed_amount,
        vault_state.max_borrow(user_state.deposited_amount)
    );
    msg!("User owes: {}", user_state.amount_owed);
    msg!("Total vault borrowed: {}", vault_state.total_borrowed);

    Ok(())
}
