use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::{LendingError, LendingResult};
use crate::state::UserState;

#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct VaultState {
    /// The mint of the asset custodied by this vault
    pub asset_mint: Pubkey,
    /// The token account that holds idle liquidity
    pub vault_account: Pubkey,
    /// The token account that holds interest owed to depositors
    pub rewards_account: Pubkey,
    /// Sum of every user's deposit
    pub total_deposits: u64,
    /// Sum of every user's outstanding principal
    pub total_borrowed: u64,
    /// Fee charged on each borrow, in basis points
    pub interest_rate_bps: u16,
    /// Maximum borrow-to-deposit ratio per user, in basis points
    pub collateral_factor_bps: u16,
    /// Cumulative rewards per deposited unit, scaled by `REWARD_FACTOR_SCALE`
    pub reward_factor: u128,
    /// Interest ever paid into the rewards account
    pub total_rewards_accrued: u64,
    /// Rewards ever paid out of the rewards account
    pub total_rewards_claimed: u64,
    pub vault_bump: u8,
    pub state_bump: u8,
    pub rewards_bump: u8,
    pub authority_bump: u8,
}

/// How a repayment was split between the pool and the rewards account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaySplit {
    pub principal: u64,
    pub interest: u64,
}

impl VaultState {
    pub const LEN: usize = 8 + // discriminator
        32 + // asset_mint
        32 + // vault_account
        32 + // rewards_account
        8 + // total_deposits
        8 + // total_borrowed
        2 + // interest_rate_bps
        2 + // collateral_factor_bps
        16 + // reward_factor
        8 + // total_rewards_accrued
        8 + // total_rewards_claimed
        4; // bumps

    pub fn validate_params(interest_rate_bps: u16, collateral_factor_bps: u16) -> LendingResult {
        if collateral_factor_bps == 0 || collateral_factor_bps > MAX_COLLATERAL_FACTOR_BPS {
            return Err(LendingError::InvalidParameter);
        }
        if interest_rate_bps > MAX_INTEREST_RATE_BPS {
            return Err(LendingError::InvalidParameter);
        }
        Ok(())
    }

    /// Tokens that should currently sit in the vault account
    pub fn idle_liquidity(&self) -> LendingResult<u64> {
        self.total_deposits
            .checked_sub(self.total_borrowed)
            .ok_or(LendingError::ReconciliationFailure)
    }

    /// Tokens that should currently sit in the rewards account
    pub fn undistributed_rewards(&self) -> LendingResult<u64> {
        self.total_rewards_accrued
            .checked_sub(self.total_rewards_claimed)
            .ok_or(LendingError::ReconciliationFailure)
    }

    /// Custody balances must match the ledger exactly. A mismatch means an
    /// earlier transition was wrong and is never patched over.
    pub fn ensure_reconciled(&self, vault_balance: u64, rewards_balance: u64) -> LendingResult {
        if vault_balance != self.idle_liquidity()? {
            return Err(LendingError::ReconciliationFailure);
        }
        if rewards_balance != self.undistributed_rewards()? {
            return Err(LendingError::ReconciliationFailure);
        }
        Ok(())
    }

    /// `borrowed <= deposited * collateral_factor`, evaluated exactly
    pub fn is_collateralized(&self, deposited: u64, borrowed: u64) -> bool {
        (borrowed as u128) * (BPS_DENOMINATOR as u128)
            <= (deposited as u128) * (self.collateral_factor_bps as u128)
    }

    /// Largest principal `deposited` can back
    pub fn max_borrow(&self, deposited: u64) -> u64 {
        // factor <= 1, so the quotient never exceeds `deposited`
        ((deposited as u128) * (self.collateral_factor_bps as u128) / (BPS_DENOMINATOR as u128))
            as u64
    }

    /// Fee added to the amount owed for a borrow, rounded up
    pub fn borrow_fee(&self, amount: u64) -> LendingResult<u64> {
        let numerator = (amount as u128) * (self.interest_rate_bps as u128);
        let fee = numerator.div_ceil(BPS_DENOMINATOR as u128);
        u64::try_from(fee).map_err(|_| LendingError::MathOverflow)
    }

    /// Read-only projection of what `user` could claim right now
    pub fn pending_rewards(&self, user: &UserState) -> LendingResult<u64> {
        let delta = self
            .reward_factor
            .checked_sub(user.reward_factor_snapshot)
            .ok_or(LendingError::MathOverflow)?;
        let accrued = (user.deposited_amount as u128)
            .checked_mul(delta)
            .ok_or(LendingError::MathOverflow)?
            / REWARD_FACTOR_SCALE;
        let accrued = u64::try_from(accrued).map_err(|_| LendingError::MathOverflow)?;

        user.pending_rewards
            .checked_add(accrued)
            .ok_or(LendingError::MathOverflow)
    }

    pub fn deposit(&mut self, user: &mut UserState, amount: u64) -> LendingResult {
        if amount == 0 {
            return Err(LendingError::InvalidParameter);
        }

        let pending = self.pending_rewards(user)?;
        let deposited = user
            .deposited_amount
            .checked_add(amount)
            .ok_or(LendingError::MathOverflow)?;
        let total_deposits = self
            .total_deposits
            .checked_add(amount)
            .ok_or(LendingError::MathOverflow)?;

        user.pending_rewards = pending;
        user.reward_factor_snapshot = self.reward_factor;
        user.deposited_amount = deposited;
        self.total_deposits = total_deposits;

        Ok(())
    }

    /// Returns the fee added to the user's debt
    pub fn borrow(&mut self, user: &mut UserState, amount: u64) -> LendingResult<u64> {
        if amount == 0 {
            return Err(LendingError::InvalidParameter);
        }

        let borrowed = user
            .borrowed_amount
            .checked_add(amount)
            .ok_or(LendingError::MathOverflow)?;
        if !self.is_collateralized(user.deposited_amount, borrowed) {
            return Err(LendingError::InsufficientCollateral);
        }

        let total_borrowed = self
            .total_borrowed
            .checked_add(amount)
            .ok_or(LendingError::MathOverflow)?;
        if total_borrowed > self.total_deposits {
            return Err(LendingError::InsufficientLiquidity);
        }

        let fee = self.borrow_fee(amount)?;
        let owed = user
            .amount_owed
            .checked_add(amount)
            .and_then(|owed| owed.checked_add(fee))
            .ok_or(LendingError::MathOverflow)?;

        user.borrowed_amount = borrowed;
        user.amount_owed = owed;
        self.total_borrowed = total_borrowed;

        Ok(fee)
    }

    /// Splits `amount` pro rata between principal and fee. The fee part is
    /// distributed to depositors through `reward_factor`.
    pub fn repay(&mut self, user: &mut UserState, amount: u64) -> LendingResult<RepaySplit> {
        if amount == 0 || amount > user.amount_owed {
            return Err(LendingError::InvalidParameter);
        }

        let owed = user.amount_owed;
        let outstanding_fee = owed
            .checked_sub(user.borrowed_amount)
            .ok_or(LendingError::MathOverflow)?;
        // Rounded up so the fee is settled no later than the principal. With
        // amount <= owed this is at most outstanding_fee.
        let interest = ((amount as u128) * (outstanding_fee as u128)).div_ceil(owed as u128) as u64;
        let principal = amount - interest;

        let borrowed = user
            .borrowed_amount
            .checked_sub(principal)
            .ok_or(LendingError::MathOverflow)?;
        let total_borrowed = self
            .total_borrowed
            .checked_sub(principal)
            .ok_or(LendingError::ReconciliationFailure)?;

        let (reward_factor, accrued) = if interest > 0 {
            if self.total_deposits == 0 {
                return Err(LendingError::ReconciliationFailure);
            }
            let increment = (interest as u128) * REWARD_FACTOR_SCALE / (self.total_deposits as u128);
            let reward_factor = self
                .reward_factor
                .checked_add(increment)
                .ok_or(LendingError::MathOverflow)?;
            let accrued = self
                .total_rewards_accrued
                .checked_add(interest)
                .ok_or(LendingError::MathOverflow)?;
            (reward_factor, accrued)
        } else {
            (self.reward_factor, self.total_rewards_accrued)
        };

        user.amount_owed = owed - amount;
        user.borrowed_amount = borrowed;
        self.total_borrowed = total_borrowed;
        self.reward_factor = reward_factor;
        self.total_rewards_accrued = accrued;

        Ok(RepaySplit { principal, interest })
    }

    pub fn withdraw(&mut self, user: &mut UserState, amount: u64) -> LendingResult {
        if amount == 0 {
            return Err(LendingError::InvalidParameter);
        }

        let deposited = user
            .deposited_amount
            .checked_sub(amount)
            .ok_or(LendingError::InsufficientBalance)?;
        if !self.is_collateralized(deposited, user.borrowed_amount) {
            return Err(LendingError::InsufficientCollateral);
        }
        if amount > self.idle_liquidity()? {
            return Err(LendingError::InsufficientLiquidity);
        }

        let pending = self.pending_rewards(user)?;
        let total_deposits = self
            .total_deposits
            .checked_sub(amount)
            .ok_or(LendingError::ReconciliationFailure)?;

        user.pending_rewards = pending;
        user.reward_factor_snapshot = self.reward_factor;
        user.deposited_amount = deposited;
        self.total_deposits = total_deposits;

        Ok(())
    }

    /// Returns the amount to pay out of the rewards account
    pub fn claim_rewards(&mut self, user: &mut UserState) -> LendingResult<u64> {
        let amount = self.pending_rewards(user)?;
        if amount == 0 {
            return Err(LendingError::NothingToClaim);
        }
        if amount > self.undistributed_rewards()? {
            return Err(LendingError::ReconciliationFailure);
        }

        let claimed = self
            .total_rewards_claimed
            .checked_add(amount)
            .ok_or(LendingError::MathOverflow)?;

        user.pending_rewards = 0;
        user.reward_factor_snapshot = self.reward_factor;
        self.total_rewards_claimed = claimed;

        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(interest_rate_bps: u16, collateral_factor_bps: u16) -> VaultState {
        VaultState {
            asset_mint: Pubkey::new_unique(),
            vault_account: Pubkey::new_unique(),
            rewards_account: Pubkey::new_unique(),
            total_deposits: 0,
            total_borrowed: 0,
            interest_rate_bps,
            collateral_factor_bps,
            reward_factor: 0,
            total_rewards_accrued: 0,
            total_rewards_claimed: 0,
            vault_bump: 255,
            state_bump: 255,
            rewards_bump: 255,
            authority_bump: 255,
        }
    }

    fn user(vault: &VaultState) -> UserState {
        UserState::new(Pubkey::new_unique(), vault.vault_account, 254, vault.reward_factor)
    }

    #[test]
    fn test_validate_params() {
        assert!(VaultState::validate_params(200, 8_000).is_ok());
        assert!(VaultState::validate_params(0, 10_000).is_ok());
        assert!(VaultState::validate_params(9_999, 1).is_ok());

        assert!(matches!(
            VaultState::validate_params(200, 0),
            Err(LendingError::InvalidParameter)
        ));
        assert!(matches!(
            VaultState::validate_params(200, 10_001),
            Err(LendingError::InvalidParameter)
        ));
        assert!(matches!(
            VaultState::validate_params(10_000, 8_000),
            Err(LendingError::InvalidParameter)
        ));
    }

    #[test]
    fn test_deposits_sum_to_total() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        let mut bob = user(&vault);

        vault.deposit(&mut alice, 100).unwrap();
        vault.deposit(&mut bob, 50).unwrap();
        vault.deposit(&mut alice, 25).unwrap();

        assert_eq!(alice.deposited_amount, 125);
        assert_eq!(bob.deposited_amount, 50);
        assert_eq!(vault.total_deposits, alice.deposited_amount + bob.deposited_amount);
        assert!(vault.ensure_reconciled(175, 0).is_ok());
    }

    #[test]
    fn test_zero_deposit_is_rejected() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        let (vault_before, alice_before) = (vault.clone(), alice.clone());

        assert!(matches!(
            vault.deposit(&mut alice, 0),
            Err(LendingError::InvalidParameter)
        ));
        assert_eq!(vault, vault_before);
        assert_eq!(alice, alice_before);
    }

    #[test]
    fn test_borrow_at_collateral_boundary() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        let mut bob = user(&vault);

        vault.deposit(&mut alice, 100).unwrap();
        vault.deposit(&mut bob, 50).unwrap();
        assert_eq!(vault.total_deposits, 150);

        let fee = vault.borrow(&mut alice, 80).unwrap();
        assert_eq!(fee, 2);
        assert_eq!(alice.borrowed_amount, 80);
        assert_eq!(alice.amount_owed, 82);
        assert_eq!(vault.total_borrowed, 80);

        let (vault_before, alice_before) = (vault.clone(), alice.clone());
        assert!(matches!(
            vault.borrow(&mut alice, 1),
            Err(LendingError::InsufficientCollateral)
        ));
        assert_eq!(vault, vault_before);
        assert_eq!(alice, alice_before);
    }

    #[test]
    fn test_borrow_without_deposit() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        let mut bob = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();

        assert!(matches!(
            vault.borrow(&mut bob, 1),
            Err(LendingError::InsufficientCollateral)
        ));
        assert!(matches!(
            vault.borrow(&mut alice, 0),
            Err(LendingError::InvalidParameter)
        ));
    }

    #[test]
    fn test_borrow_limited_by_pool_liquidity() {
        // Totals out of step with a single user record, as if other users had
        // already drained the pool.
        let mut vault = vault(0, 10_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.total_borrowed = 60;

        let (vault_before, alice_before) = (vault.clone(), alice.clone());
        assert!(matches!(
            vault.borrow(&mut alice, 41),
            Err(LendingError::InsufficientLiquidity)
        ));
        assert_eq!(vault, vault_before);
        assert_eq!(alice, alice_before);

        vault.borrow(&mut alice, 40).unwrap();
        assert_eq!(vault.total_borrowed, vault.total_deposits);
    }

    #[test]
    fn test_fee_rounds_up() {
        let vault = vault(200, 8_000);

        assert_eq!(vault.borrow_fee(0).unwrap(), 0);
        assert_eq!(vault.borrow_fee(1).unwrap(), 1);
        assert_eq!(vault.borrow_fee(50).unwrap(), 1);
        assert_eq!(vault.borrow_fee(51).unwrap(), 2);
        assert_eq!(vault.borrow_fee(1_000_000).unwrap(), 20_000);
    }

    #[test]
    fn test_full_repay_clears_debt_and_accrues_rewards() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        let mut bob = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.deposit(&mut bob, 50).unwrap();
        vault.borrow(&mut alice, 80).unwrap();

        let split = vault.repay(&mut alice, 82).unwrap();

        assert_eq!(split, RepaySplit { principal: 80, interest: 2 });
        assert_eq!(alice.amount_owed, 0);
        assert_eq!(alice.borrowed_amount, 0);
        assert_eq!(vault.total_borrowed, 0);
        assert_eq!(vault.total_rewards_accrued, 2);
        assert!(vault.ensure_reconciled(150, 2).is_ok());
    }

    #[test]
    fn test_partial_repay_is_pro_rata() {
        let mut vault = vault(1_000, 10_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 1_000).unwrap();
        vault.borrow(&mut alice, 500).unwrap();
        assert_eq!(alice.amount_owed, 550);

        let split = vault.repay(&mut alice, 110).unwrap();
        assert_eq!(split, RepaySplit { principal: 100, interest: 10 });
        assert_eq!(alice.borrowed_amount, 400);
        assert_eq!(alice.amount_owed, 440);

        assert!(matches!(
            vault.repay(&mut alice, 441),
            Err(LendingError::InvalidParameter)
        ));
    }

    #[test]
    fn test_installments_clear_fee_with_principal() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.borrow(&mut alice, 80).unwrap();
        assert_eq!(alice.amount_owed, 82);

        let first = vault.repay(&mut alice, 41).unwrap();
        assert_eq!(first, RepaySplit { principal: 40, interest: 1 });
        let second = vault.repay(&mut alice, 40).unwrap();
        assert_eq!(second, RepaySplit { principal: 39, interest: 1 });
        assert_eq!(alice.borrowed_amount, 1);
        assert_eq!(alice.amount_owed, 1);

        // Principal still outstanding, so the deposit stays locked
        assert!(matches!(
            vault.withdraw(&mut alice, 100),
            Err(LendingError::InsufficientCollateral)
        ));

        let last = vault.repay(&mut alice, 1).unwrap();
        assert_eq!(last, RepaySplit { principal: 1, interest: 0 });
        assert_eq!(alice.borrowed_amount, 0);
        assert_eq!(alice.amount_owed, 0);
        assert_eq!(vault.total_borrowed, 0);
        assert_eq!(vault.total_rewards_accrued, 2);

        vault.withdraw(&mut alice, 100).unwrap();
        assert!(vault.ensure_reconciled(0, 2).is_ok());
    }

    #[test]
    fn test_principal_never_cleared_before_fee() {
        for (rate, borrow) in [(200u16, 80u64), (9_999, 3), (1, 7_999), (5_000, 1)] {
            let mut vault = vault(rate, 10_000);
            let mut alice = user(&vault);
            vault.deposit(&mut alice, 8_000).unwrap();
            vault.borrow(&mut alice, borrow).unwrap();

            while alice.amount_owed > 0 {
                vault.repay(&mut alice, 1).unwrap();
                if alice.borrowed_amount == 0 {
                    assert_eq!(alice.amount_owed, 0, "fee stranded at rate {}", rate);
                }
            }
            assert_eq!(vault.total_borrowed, 0);
        }
    }

    #[test]
    fn test_rewards_split_by_deposit() {
        let mut vault = vault(1_000, 10_000);
        let mut alice = user(&vault);
        let mut bob = user(&vault);
        vault.deposit(&mut alice, 300).unwrap();
        vault.deposit(&mut bob, 100).unwrap();
        vault.borrow(&mut bob, 100).unwrap();
        vault.repay(&mut bob, 110).unwrap();

        assert_eq!(vault.pending_rewards(&alice).unwrap(), 7);
        assert_eq!(vault.pending_rewards(&bob).unwrap(), 2);

        // A late depositor does not share in rewards accrued before joining
        let mut carol = user(&vault);
        vault.deposit(&mut carol, 1_000).unwrap();
        assert_eq!(vault.pending_rewards(&carol).unwrap(), 0);
    }

    #[test]
    fn test_pending_rewards_is_read_only() {
        let mut vault = vault(1_000, 10_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.borrow(&mut alice, 100).unwrap();
        vault.repay(&mut alice, 110).unwrap();

        let (vault_before, alice_before) = (vault.clone(), alice.clone());
        assert_eq!(vault.pending_rewards(&alice).unwrap(), 10);
        assert_eq!(vault.pending_rewards(&alice).unwrap(), 10);
        assert_eq!(vault, vault_before);
        assert_eq!(alice, alice_before);
    }

    #[test]
    fn test_reward_share_monotonic_in_own_deposit() {
        let mut previous = 0;
        for extra in [0u64, 1, 10, 100, 1_000] {
            let mut vault = vault(1_000, 10_000);
            let mut alice = user(&vault);
            let mut bob = user(&vault);
            vault.deposit(&mut alice, 100 + extra).unwrap();
            vault.deposit(&mut bob, 200).unwrap();
            vault.borrow(&mut bob, 100).unwrap();
            vault.repay(&mut bob, 110).unwrap();

            let share = vault.pending_rewards(&alice).unwrap();
            assert!(share >= previous);
            previous = share;
        }
    }

    #[test]
    fn test_claim_pays_once() {
        let mut vault = vault(1_000, 10_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.borrow(&mut alice, 100).unwrap();
        vault.repay(&mut alice, 110).unwrap();

        assert_eq!(vault.claim_rewards(&mut alice).unwrap(), 10);
        assert_eq!(alice.pending_rewards, 0);
        assert_eq!(vault.total_rewards_claimed, 10);
        assert!(vault.ensure_reconciled(100, 0).is_ok());

        assert!(matches!(
            vault.claim_rewards(&mut alice),
            Err(LendingError::NothingToClaim)
        ));
    }

    #[test]
    fn test_rewards_survive_deposit_and_withdraw() {
        let mut vault = vault(1_000, 10_000);
        let mut alice = user(&vault);
        let mut bob = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.deposit(&mut bob, 100).unwrap();
        vault.borrow(&mut bob, 100).unwrap();
        vault.repay(&mut bob, 110).unwrap();

        vault.deposit(&mut alice, 500).unwrap();
        assert_eq!(alice.pending_rewards, 5);
        vault.withdraw(&mut alice, 600).unwrap();
        assert_eq!(alice.deposited_amount, 0);
        assert_eq!(vault.pending_rewards(&alice).unwrap(), 5);
    }

    #[test]
    fn test_withdraw_keeps_collateral_covered() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.borrow(&mut alice, 40).unwrap();

        let (vault_before, alice_before) = (vault.clone(), alice.clone());
        assert!(matches!(
            vault.withdraw(&mut alice, 51),
            Err(LendingError::InsufficientCollateral)
        ));
        assert!(matches!(
            vault.withdraw(&mut alice, 101),
            Err(LendingError::InsufficientBalance)
        ));
        assert_eq!(vault, vault_before);
        assert_eq!(alice, alice_before);

        vault.withdraw(&mut alice, 50).unwrap();
        assert_eq!(alice.deposited_amount, 50);
        assert_eq!(vault.total_deposits, 50);
        assert!(vault.ensure_reconciled(10, 0).is_ok());
    }

    #[test]
    fn test_withdraw_limited_by_idle_liquidity() {
        let mut vault = vault(0, 10_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.total_borrowed = 60;

        let (vault_before, alice_before) = (vault.clone(), alice.clone());
        assert!(matches!(
            vault.withdraw(&mut alice, 41),
            Err(LendingError::InsufficientLiquidity)
        ));
        assert_eq!(vault, vault_before);
        assert_eq!(alice, alice_before);

        vault.withdraw(&mut alice, 40).unwrap();
        assert_eq!(vault.idle_liquidity().unwrap(), 0);
    }

    #[test]
    fn test_reconciliation_detects_divergence() {
        let mut vault = vault(200, 8_000);
        let mut alice = user(&vault);
        vault.deposit(&mut alice, 100).unwrap();
        vault.borrow(&mut alice, 50).unwrap();

        assert!(vault.ensure_reconciled(50, 0).is_ok());
        assert!(matches!(
            vault.ensure_reconciled(100, 0),
            Err(LendingError::ReconciliationFailure)
        ));
        assert!(matches!(
            vault.ensure_reconciled(50, 1),
            Err(LendingError::ReconciliationFailure)
        ));
    }
}
