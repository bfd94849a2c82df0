use anchor_lang::solana_program::program_pack::Pack;

pub const VAULT_SEED: &[u8] = b"vault";
pub const VAULT_STATE_SEED: &[u8] = b"state";
pub const VAULT_REWARDS_SEED: &[u8] = b"rewards";
pub const VAULT_AUTHORITY_SEED: &[u8] = b"authority";
pub const USER_STATE_SEED: &[u8] = b"userVault";

/// Denominator for every rate stored in basis points (10_000 = 1.0)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Collateral factor may be at most 100%
pub const MAX_COLLATERAL_FACTOR_BPS: u16 = 10_000;

/// Interest rate must stay strictly below 100%
pub const MAX_INTEREST_RATE_BPS: u16 = 9_999;

/// Fixed-point scale of `VaultState::reward_factor`
pub const REWARD_FACTOR_SCALE: u128 = 1_000_000_000_000;

/// Size of an SPL token account without extensions
pub const TOKEN_ACCOUNT_LEN: usize = anchor_spl::token::spl_token::state::Account::LEN;
