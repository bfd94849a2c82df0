use anchor_lang::prelude::*;
use anchor_spl::token_interface::{
    transfer_checked, Mint, TokenAccount, TokenInterface, TransferChecked,
};

use crate::constants::*;
use crate::error::LendingError;
use crate::events::Deposited;
use crate::state::{UserSlot, UserState, VaultState};
use crate::utils::{create_pda_account, write_account};

#[derive(Accounts)]
pub struct Deposit<'info> {
    #[account(mut)]
    pub depositor: Signer<'info>,

    /// The asset held by the vault
    pub vault_mint: InterfaceAccount<'info, Mint>,

    /// The vault's token account that holds idle liquidity
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

    /// Read for reconciliation only
    #[account(
        seeds = [VAULT_REWARDS_SEED, vault_account.key().as_ref()],
        bump = vault_state_account.rewards_bump,
    )]
    pub vault_rewards_account: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: The depositor's record, allocated here on first deposit
    #[account(
        mut,
        seeds = [USER_STATE_SEED, vault_account.key().as_ref(), depositor.key().as_ref()],
        bump
    )]
    pub user_state_account: UncheckedAccount<'info>,

    /// The depositor's token account for the asset
    #[account(
        mut,
        token::mint = vault_mint,
        token::authority = depositor,
    )]
    pub user_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    pub system_program: Program<'info, System>,
    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> Deposit<'info> {
    fn transfer_to_vault(&self, amount: u64) -> Result<()> {
        let cpi_accounts = TransferChecked {
            from: self.user_token_account.to_account_info(),
            mint: self.vault_mint.to_account_info(),
            to: self.vault_account.to_account_info(),
            authority: self.depositor.to_account_info(),
        };
        let cpi_ctx = CpiContext::new(self.token_program.to_account_info(), cpi_accounts);
        transfer_checked(cpi_ctx, amount, self.vault_mint.decimals)
    }

    fn allocate_user_state(&self, bump: u8) -> Result<()> {
        let vault_key = self.vault_account.key();
        let depositor_key = self.depositor.key();
        let seeds: &[&[u8]] = &[
            USER_STATE_SEED,
            vault_key.as_ref(),
            depositor_key.as_ref(),
            &[bump],
        ];

        create_pda_account(
            &self.depositor.to_account_info(),
            &self.user_state_account.to_account_info(),
            &self.system_program.to_account_info(),
            UserState::LEN,
            &crate::ID,
            &[seeds],
        )
    }

    fn ensure_reconciled(&self) -> Result<()> {
        self.vault_state_account
            .ensure_reconciled(self.vault_account.amount, self.vault_rewards_account.amount)?;
        Ok(())
    }
}

pub fn handler(ctx: Context<Deposit>, amount: u64) -> Result<()> {
    require!(amount > 0, LendingError::InvalidParameter);
    require!(
        ctx.accounts.user_token_account.amount >= amount,
        LendingError::InsufficientBalance
    );
    ctx.accounts.ensure_reconciled()?;

    let depositor = ctx.accounts.depositor.key();
    let vault_key = ctx.accounts.vault_account.key();
    let user_info = ctx.accounts.user_state_account.to_account_info();

    let (mut user_state, first_deposit) = match UserSlot::load(&user_info)? {
        UserSlot::Present(user_state) => {
            require_keys_eq!(user_state.owner, depositor, LendingError::Unauthorized);
            (user_state, false)
        }
        UserSlot::Absent => {
            let user_state = UserState::new(
                depositor,
                vault_key,
                ctx.bumps.user_state_account,
                ctx.accounts.vault_state_account.reward_factor,
            );
            (user_state, true)
        }
    };

    ctx.accounts
        .vault_state_account
        .deposit(&mut user_state, amount)?;

    if first_deposit {
        ctx.accounts.allocate_user_state(ctx.bumps.user_state_account)?;
    }
    ctx.accounts.transfer_to_vault(amount)?;
    write_account(&user_info, &user_state)?;

    ctx.accounts.vault_account.reload()?;
    ctx.accounts.ensure_reconciled()?;

    let total_deposits = ctx.accounts.vault_state_account.total_deposits;
    emit!(Deposited {
        owner: depositor,
        vault: vault_key,
        amount,
        total_deposits,
    });

    msg!("Deposit successful!");
    msg!("Deposited: {} tokens", amount);
    if first_deposit {
        msg!("Opened user state: {}", user_info.key());
    }
    msg!("User deposits: {}", user_state.deposited_amount);
    msg!("Total vault deposits: {}", total_deposits);

    Ok(())
}
