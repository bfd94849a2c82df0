use anchor_lang::prelude::*;
use anchor_spl::token_interface::{initialize_account3, InitializeAccount3, Mint, TokenInterface};

use crate::constants::*;
use crate::error::LendingError;
use crate::events::VaultCreated;
use crate::state::VaultState;
use crate::utils::{create_pda_account, is_allocated, rent_shortfall, write_account};

#[derive(Accounts)]
pub struct CreateVault<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,

    /// The asset the vault will custody
    pub vault_mint: InterfaceAccount<'info, Mint>,

    /// CHECK: Allocated by the handler as the vault's token account
    #[account(
        mut,
        seeds = [VAULT_SEED, vault_mint.key().as_ref()],
        bump
    )]
    pub vault_account: UncheckedAccount<'info>,

    /// CHECK: Allocated by the handler as the rewards token account
    #[account(
        mut,
        seeds = [VAULT_REWARDS_SEED, vault_account.key().as_ref()],
        bump
    )]
    pub vault_rewards_account: UncheckedAccount<'info>,

    /// CHECK: Allocated by the handler as the `VaultState` record
    #[account(
        mut,
        seeds = [VAULT_STATE_SEED, vault_account.key().as_ref()],
        bump
    )]
    pub vault_state_account: UncheckedAccount<'info>,

    /// CHECK: Data-less PDA that owns both custody accounts and signs transfers out of them
    #[account(
        seeds = [VAULT_AUTHORITY_SEED, vault_account.key().as_ref()],
        bump
    )]
    pub vault_authority: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> CreateVault<'info> {
    /// Creates a token account at a PDA, owned by the vault authority
    fn create_custody_account(
        &self,
        account: &AccountInfo<'info>,
        signer_seeds: &[&[&[u8]]],
    ) -> Result<()> {
        create_pda_account(
            &self.payer.to_account_info(),
            account,
            &self.system_program.to_account_info(),
            TOKEN_ACCOUNT_LEN,
            &self.token_program.key(),
            signer_seeds,
        )?;

        let cpi_ctx = CpiContext::new(
            self.token_program.to_account_info(),
            InitializeAccount3 {
                account: account.clone(),
                mint: self.vault_mint.to_account_info(),
                authority: self.vault_authority.to_account_info(),
            },
        );
        initialize_account3(cpi_ctx)
    }
}

pub fn handler(
    ctx: Context<CreateVault>,
    interest_rate_bps: u16,
    collateral_factor_bps: u16,
) -> Result<Pubkey> {
    VaultState::validate_params(interest_rate_bps, collateral_factor_bps)?;

    let accounts = &ctx.accounts;
    require!(
        !is_allocated(&accounts.vault_account)
            && !is_allocated(&accounts.vault_rewards_account)
            && !is_allocated(&accounts.vault_state_account),
        LendingError::AlreadyInitialized
    );

    let required = [
        rent_shortfall(&accounts.vault_account, TOKEN_ACCOUNT_LEN)?,
        rent_shortfall(&accounts.vault_rewards_account, TOKEN_ACCOUNT_LEN)?,
        rent_shortfall(&accounts.vault_state_account, VaultState::LEN)?,
    ]
    .into_iter()
    .try_fold(0u64, u64::checked_add)
    .ok_or(LendingError::MathOverflow)?;
    require!(
        accounts.payer.lamports() >= required,
        LendingError::InsufficientFunding
    );

    let mint_key = accounts.vault_mint.key();
    let vault_key = accounts.vault_account.key();
    let state_key = accounts.vault_state_account.key();
    let bumps = &ctx.bumps;

    let vault_seeds: &[&[u8]] = &[VAULT_SEED, mint_key.as_ref(), &[bumps.vault_account]];
    accounts.create_custody_account(&accounts.vault_account.to_account_info(), &[vault_seeds])?;

    let rewards_seeds: &[&[u8]] = &[
        VAULT_REWARDS_SEED,
        vault_key.as_ref(),
        &[bumps.vault_rewards_account],
    ];
    accounts.create_custody_account(
        &accounts.vault_rewards_account.to_account_info(),
        &[rewards_seeds],
    )?;

    let state_seeds: &[&[u8]] = &[
        VAULT_STATE_SEED,
        vault_key.as_ref(),
        &[bumps.vault_state_account],
    ];
    let state_info = accounts.vault_state_account.to_account_info();
    create_pda_account(
        &accounts.payer.to_account_info(),
        &state_info,
        &accounts.system_program.to_account_info(),
        VaultState::LEN,
        ctx.program_id,
        &[state_seeds],
    )?;

    let vault_state = VaultState {
        asset_mint: mint_key,
        vault_account: vault_key,
        rewards_account: accounts.vault_rewards_account.key(),
        total_deposits: 0,
        total_borrowed: 0,
        interest_rate_bps,
        collateral_factor_bps,
        reward_factor: 0,
        total_rewards_accrued: 0,
        total_rewards_claimed: 0,
        vault_bump: bumps.vault_account,
        state_bump: bumps.vault_state_account,
        rewards_bump: bumps.vault_rewards_account,
        authority_bump: bumps.vault_authority,
    };
    write_account(&state_info, &vault_state)?;

    emit!(VaultCreated {
        asset_mint: mint_key,
        vault_state: state_key,
        interest_rate_bps,
        collateral_factor_bps,
    });

    msg!("Vault created!");
    msg!("Asset Mint: {}", mint_key);
    msg!("Vault Account: {}", vault_key);
    msg!("Vault State: {}", state_key);
    msg!("Vault Rewards: {}", vault_state.rewards_account);
    msg!("Vault Authority: {}", accounts.vault_authority.key());
    msg!("Interest rate: {} bps", interest_rate_bps);
    msg!("Collateral factor: {} bps", collateral_factor_bps);

    Ok(state_key)
}
