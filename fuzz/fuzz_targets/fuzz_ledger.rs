#![no_main]

use anchor_lang::prelude::Pubkey;
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use single_asset_lending::error::LendingError;
use single_asset_lending::state::{UserState, VaultState};

const USERS: usize = 3;

/// One ledger transition, applied without any token movement
#[derive(Debug, Clone, Arbitrary)]
enum LedgerOp {
    Deposit { user: u8, amount: u32 },
    Borrow { user: u8, amount: u32 },
    Repay { user: u8, amount: u32 },
    Withdraw { user: u8, amount: u32 },
    Claim { user: u8 },
}

#[derive(Debug, Clone, Arbitrary)]
struct LedgerFuzzInput {
    interest_rate_bps: u16,
    collateral_factor_bps: u16,
    ops: Vec<LedgerOp>,
}

/// Token balances the custody accounts would hold if every transfer succeeded
#[derive(Debug, Default)]
struct Custody {
    vault: u64,
    rewards: u64,
}

fn new_vault(interest_rate_bps: u16, collateral_factor_bps: u16) -> VaultState {
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

fn check_invariants(vault: &VaultState, users: &[UserState], custody: &Custody) {
    // PROPERTY 1: custody always reconciles with the ledger
    vault
        .ensure_reconciled(custody.vault, custody.rewards)
        .expect("CRITICAL: custody diverged from ledger");

    // PROPERTY 2: totals are the sums of the per-user records
    let deposits: u64 = users.iter().map(|u| u.deposited_amount).sum();
    let borrowed: u64 = users.iter().map(|u| u.borrowed_amount).sum();
    assert_eq!(deposits, vault.total_deposits, "total_deposits != sum of deposits");
    assert_eq!(borrowed, vault.total_borrowed, "total_borrowed != sum of borrows");
    assert!(vault.total_borrowed <= vault.total_deposits, "borrowed more than deposited");

    for user in users {
        // PROPERTY 3: every position stays collateralized
        assert!(
            vault.is_collateralized(user.deposited_amount, user.borrowed_amount),
            "undercollateralized position: {:?}",
            user
        );
        // PROPERTY 4: debt never drops below principal
        assert!(user.amount_owed >= user.borrowed_amount, "owed < principal: {:?}", user);
        // PROPERTY 5: no fee outlives its principal
        assert!(
            user.borrowed_amount > 0 || user.amount_owed == 0,
            "stranded fee: {:?}",
            user
        );
    }

    // PROPERTY 6: the rewards account can always pay every claim
    let claimable: u64 = users
        .iter()
        .map(|u| vault.pending_rewards(u).expect("pending rewards overflow"))
        .sum();
    assert!(
        claimable <= custody.rewards,
        "CRITICAL: rewards insolvent, claimable={} held={}",
        claimable,
        custody.rewards
    );
}

fn apply(
    vault: &mut VaultState,
    users: &mut [UserState],
    custody: &mut Custody,
    op: &LedgerOp,
) -> Result<(), LendingError> {
    match *op {
        LedgerOp::Deposit { user, amount } => {
            let user = &mut users[user as usize % USERS];
            vault.deposit(user, amount as u64)?;
            custody.vault += amount as u64;
        }
        LedgerOp::Borrow { user, amount } => {
            let user = &mut users[user as usize % USERS];
            let owed_before = user.amount_owed;
            let fee = vault.borrow(user, amount as u64)?;
            assert_eq!(user.amount_owed, owed_before + amount as u64 + fee);
            custody.vault -= amount as u64;
        }
        LedgerOp::Repay { user, amount } => {
            let user = &mut users[user as usize % USERS];
            let split = vault.repay(user, amount as u64)?;
            assert_eq!(split.principal + split.interest, amount as u64);
            custody.vault += split.principal;
            custody.rewards += split.interest;
        }
        LedgerOp::Withdraw { user, amount } => {
            let user = &mut users[user as usize % USERS];
            vault.withdraw(user, amount as u64)?;
            custody.vault -= amount as u64;
        }
        LedgerOp::Claim { user } => {
            let user = &mut users[user as usize % USERS];
            let claimed = vault.claim_rewards(user)?;
            custody.rewards -= claimed;
        }
    }
    Ok(())
}

fuzz_target!(|input: LedgerFuzzInput| {
    if VaultState::validate_params(input.interest_rate_bps, input.collateral_factor_bps).is_err() {
        return;
    }

    let mut vault = new_vault(input.interest_rate_bps, input.collateral_factor_bps);
    let vault_key = vault.vault_account;
    let mut users: Vec<UserState> = (0..USERS)
        .map(|_| UserState::new(Pubkey::new_unique(), vault_key, 255, 0))
        .collect();
    let mut custody = Custody::default();

    for op in input.ops.iter().take(64) {
        let vault_before = vault.clone();
        let users_before = users.clone();

        if let Err(err) = apply(&mut vault, &mut users, &mut custody, op) {
            // Custody is tracked exactly, so the ledger never sees a mismatch
            assert!(
                !matches!(err, LendingError::ReconciliationFailure),
                "reconciliation failure on consistent ledger: {:?}",
                op
            );
            // Rejected transitions leave no trace
            assert_eq!(vault, vault_before, "vault mutated by failed {:?}", op);
            assert_eq!(users, users_before, "user mutated by failed {:?}", op);
        }

        check_invariants(&vault, &users, &custody);
    }
});
