//! Derivation of every program address from explicit seed constants.
//!
//! Nothing here reads global state: callers pass the program id and a
//! [`SeedConfig`], so the same functions serve the program, clients and tests.

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::{LendingError, LendingResult};

/// Seed prefixes, one per derived account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedConfig {
    pub vault: &'static [u8],
    pub state: &'static [u8],
    pub rewards: &'static [u8],
    pub authority: &'static [u8],
    pub user_state: &'static [u8],
}

impl SeedConfig {
    pub const DEFAULT: SeedConfig = SeedConfig {
        vault: VAULT_SEED,
        state: VAULT_STATE_SEED,
        rewards: VAULT_REWARDS_SEED,
        authority: VAULT_AUTHORITY_SEED,
        user_state: USER_STATE_SEED,
    };
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An address together with its canonical bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub address: Pubkey,
    pub bump: u8,
}

/// All per-vault addresses for one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultAddresses {
    pub vault: Derived,
    pub state: Derived,
    pub rewards: Derived,
    pub authority: Derived,
}

fn derive(program_id: &Pubkey, seeds: &[&[u8]]) -> LendingResult<Derived> {
    Pubkey::try_find_program_address(seeds, program_id)
        .map(|(address, bump)| Derived { address, bump })
        .ok_or(LendingError::AddressDerivationFailed)
}

pub fn derive_vault_account(
    program_id: &Pubkey,
    seeds: &SeedConfig,
    asset_mint: &Pubkey,
) -> LendingResult<Derived> {
    derive(program_id, &[seeds.vault, asset_mint.as_ref()])
}

pub fn derive_vault_state(
    program_id: &Pubkey,
    seeds: &SeedConfig,
    vault: &Pubkey,
) -> LendingResult<Derived> {
    derive(program_id, &[seeds.state, vault.as_ref()])
}

pub fn derive_vault_rewards(
    program_id: &Pubkey,
    seeds: &SeedConfig,
    vault: &Pubkey,
) -> LendingResult<Derived> {
    derive(program_id, &[seeds.rewards, vault.as_ref()])
}

pub fn derive_vault_authority(
    program_id: &Pubkey,
    seeds: &SeedConfig,
    vault: &Pubkey,
) -> LendingResult<Derived> {
    derive(program_id, &[seeds.authority, vault.as_ref()])
}

pub fn derive_user_state(
    program_id: &Pubkey,
    seeds: &SeedConfig,
    vault: &Pubkey,
    user: &Pubkey,
) -> LendingResult<Derived> {
    derive(program_id, &[seeds.user_state, vault.as_ref(), user.as_ref()])
}

/// Derives the vault account from the asset, then everything keyed by the vault
pub fn derive_vault_addresses(
    program_id: &Pubkey,
    seeds: &SeedConfig,
    asset_mint: &Pubkey,
) -> LendingResult<VaultAddresses> {
    let vault = derive_vault_account(program_id, seeds, asset_mint)?;

    Ok(VaultAddresses {
        vault,
        state: derive_vault_state(program_id, seeds, &vault.address)?,
        rewards: derive_vault_rewards(program_id, seeds, &vault.address)?,
        authority: derive_vault_authority(program_id, seeds, &vault.address)?,
    })
}
