use anchor_lang::prelude::*;

#[event]
pub struct VaultCreated {
    pub asset_mint: Pubkey,
    pub vault_state: Pubkey,
    pub interest_rate_bps: u16,
    pub collateral_factor_bps: u16,
}

#[event]
pub struct Deposited {
    pub owner: Pubkey,
    pub vault: Pubkey,
    pub amount: u64,
    pub total_deposits: u64,
}

#[event]
pub struct Borrowed {
    pub owner: Pubkey,
    pub vault: Pubkey,
    pub amount: u64,
    pub fee: u64,
    pub total_borrowed: u64,
}

#[event]
pub struct Repaid {
    pub owner: Pubkey,
    pub vault: Pubkey,
    pub principal: u64,
    pub interest: u64,
}

#[event]
pub struct Withdrawn {
    pub owner: Pubkey,
    pub vault: Pubkey,
    pub amount: u64,
    pub total_deposits: u64,
}

#[event]
pub struct RewardsClaimed {
    pub owner: Pubkey,
    pub vault: Pubkey,
    pub amount: u64,
}
