use anchor_lang::prelude::*;

use crate::error::LendingError;

#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct UserState {
    /// The depositor this record belongs to
    pub owner: Pubkey,
    /// The vault custody account this record is keyed by
    pub vault: Pubkey,
    /// This user's share of `VaultState::total_deposits`
    pub deposited_amount: u64,
    /// Outstanding principal, this user's share of `VaultState::total_borrowed`
    pub borrowed_amount: u64,
    /// Principal plus borrow fee still to be repaid
    pub amount_owed: u64,
    /// `VaultState::reward_factor` at the last settlement
    pub reward_factor_snapshot: u128,
    /// Rewards settled but not yet claimed
    pub pending_rewards: u64,
    /// Bump seed for PDA derivation
    pub bump: u8,
}

impl UserState {
    pub const LEN: usize = 8 + // discriminator
        32 + // owner
        32 + // vault
        8 + // deposited_amount
        8 + // borrowed_amount
        8 + // amount_owed
        16 + // reward_factor_snapshot
        8 + // pending_rewards
        1; // bump

    /// Fresh record for a first deposit. The snapshot starts at the current
    /// factor so rewards accrued before the user joined are not credited.
    pub fn new(owner: Pubkey, vault: Pubkey, bump: u8, reward_factor: u128) -> Self {
        Self {
            owner,
            vault,
            deposited_amount: 0,
            borrowed_amount: 0,
            amount_owed: 0,
            reward_factor_snapshot: reward_factor,
            pending_rewards: 0,
            bump,
        }
    }
}

/// Whether a user record has been allocated at its derived address
#[derive(Debug)]
pub enum UserSlot {
    Absent,
    Present(UserState),
}

impl UserSlot {
    pub fn load(info: &AccountInfo) -> Result<Self> {
        if info.owner == &crate::ID {
            let data = info.try_borrow_data()?;
            return Ok(UserSlot::Present(UserState::try_deserialize(&mut &data[..])?));
        }

        if info.data_is_empty() {
            return Ok(UserSlot::Absent);
        }

        Err(anchor_lang::error::ErrorCode::AccountOwnedByWrongProgram.into())
    }

    /// The record, or `NotFound` if it was never created
    pub fn present(self) -> Result<UserState> {
        match self {
            UserSlot::Present(state) => Ok(state),
            UserSlot::Absent => err!(LendingError::NotFound),
        }
    }
}
