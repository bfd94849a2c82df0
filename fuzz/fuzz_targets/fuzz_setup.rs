use anchor_lang::AccountDeserialize;
use anchor_lang::InstructionData;
use anchor_lang::ToAccountMetas;
use single_asset_lending::error::LendingError;
use single_asset_lending::pda::{derive_user_state, derive_vault_addresses, SeedConfig};
use single_asset_lending::state::{UserState, VaultState};
use solana_program_test::*;
use solana_sdk::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};
use spl_token::instruction as token_instruction;

// Re-export for convenience
pub use solana_program_test::ProgramTestContext;

// Custom error type for fuzzing
pub type FuzzResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Test environment with program loaded
pub struct FuzzTestEnv {
    pub program_id: Pubkey,
    pub context: ProgramTestContext,
}

/// Asset mint accounts
#[derive(Debug)]
pub struct AssetMintAccounts {
    pub mint: Pubkey,
    pub mint_authority: Keypair,
    pub decimals: u8,
}

/// Every derived address of one vault
#[derive(Debug, Clone)]
pub struct VaultAccounts {
    pub asset_mint: Pubkey,
    pub vault_account: Pubkey,
    pub vault_bump: u8,
    pub vault_state: Pubkey,
    pub vault_rewards: Pubkey,
    pub vault_authority: Pubkey,
}

/// A wallet with a token account for the asset
#[derive(Debug)]
pub struct UserAccounts {
    pub owner: Keypair,
    pub token_account: Pubkey,
    pub user_state: Pubkey,
}

/// Complete setup with a vault and two funded users
pub struct CompleteSetup {
    pub asset: AssetMintAccounts,
    pub vault: VaultAccounts,
    pub alice: UserAccounts,
    pub bob: UserAccounts,
}

// ============================================================================
// Core Setup Functions
// ============================================================================

// Anchor's entrypoint ties the account slice and the infos to one lifetime.
// The copied slice is leaked on purpose: a few hundred bytes per processed
// instruction, freed when the test or fuzz process exits.
fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    data: &[u8],
) -> ProgramResult {
    let accounts = Box::leak(Box::new(accounts.to_vec()));
    single_asset_lending::entry(program_id, accounts, data)
}

/// Creates the program test environment with the lending program loaded
pub async fn setup_program_test() -> FuzzTestEnv {
    let program_id = single_asset_lending::id();
    let program_test = ProgramTest::new(
        "single_asset_lending",
        program_id,
        processor!(process_instruction),
    );

    let context = program_test.start_with_context().await;

    FuzzTestEnv {
        program_id,
        context,
    }
}

/// Signs and submits `instructions` with a fresh blockhash so repeated
/// identical instructions are not deduplicated
pub async fn send(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> std::result::Result<(), BanksClientError> {
    context.last_blockhash = context.get_new_latest_blockhash().await?;

    let mut all_signers: Vec<&Keypair> = vec![&context.payer];
    all_signers.extend_from_slice(signers);

    let tx = Transaction::new_signed_with_payer(
        instructions,
        Some(&context.payer.pubkey()),
        &all_signers,
        context.last_blockhash,
    );

    context.banks_client.process_transaction(tx).await
}

/// The `LendingError` code a failed transaction carries, if any
pub fn lending_error_code(err: &BanksClientError) -> Option<u32> {
    match err.unwrap() {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(code),
        _ => None,
    }
}

pub fn error_code(err: LendingError) -> u32 {
    err as u32 + anchor_lang::error::ERROR_CODE_OFFSET
}

/// Transfers lamports from the test payer
pub async fn fund_wallet(
    context: &mut ProgramTestContext,
    wallet: &Pubkey,
    lamports: u64,
) -> FuzzResult<()> {
    let ix = solana_sdk::system_instruction::transfer(&context.payer.pubkey(), wallet, lamports);
    send(context, &[ix], &[]).await?;
    Ok(())
}

/// Creates a new SPL token mint to serve as the vault asset
pub async fn setup_asset_mint(
    context: &mut ProgramTestContext,
    decimals: u8,
) -> FuzzResult<AssetMintAccounts> {
    let mint_authority = Keypair::new();
    let mint_keypair = Keypair::new();
    let mint = mint_keypair.pubkey();

    let rent = context.banks_client.get_rent().await?;
    let mint_len = 82; // Size of Mint account in SPL Token program

    let create_account_ix = solana_sdk::system_instruction::create_account(
        &context.payer.pubkey(),
        &mint,
        rent.minimum_balance(mint_len),
        mint_len as u64,
        &spl_token::id(),
    );

    let init_mint_ix = token_instruction::initialize_mint(
        &spl_token::id(),
        &mint,
        &mint_authority.pubkey(),
        None,
        decimals,
    )?;

    send(context, &[create_account_ix, init_mint_ix], &[&mint_keypair]).await?;

    Ok(AssetMintAccounts {
        mint,
        mint_authority,
        decimals,
    })
}

/// Derives every vault address for `asset_mint`
pub fn vault_accounts(program_id: &Pubkey, asset_mint: &Pubkey) -> FuzzResult<VaultAccounts> {
    let addrs = derive_vault_addresses(program_id, &SeedConfig::DEFAULT, asset_mint)
        .map_err(|e| format!("{:?}", e))?;

    Ok(VaultAccounts {
        asset_mint: *asset_mint,
        vault_account: addrs.vault.address,
        vault_bump: addrs.vault.bump,
        vault_state: addrs.state.address,
        vault_rewards: addrs.rewards.address,
        vault_authority: addrs.authority.address,
    })
}

pub fn create_vault_ix(
    program_id: &Pubkey,
    vault: &VaultAccounts,
    payer: &Pubkey,
    interest_rate_bps: u16,
    collateral_factor_bps: u16,
) -> Instruction {
    let accounts = single_asset_lending::accounts::CreateVault {
        payer: *payer,
        vault_mint: vault.asset_mint,
        vault_account: vault.vault_account,
        vault_rewards_account: vault.vault_rewards,
        vault_state_account: vault.vault_state,
        vault_authority: vault.vault_authority,
        system_program: solana_sdk::system_program::ID,
        token_program: spl_token::id(),
    };

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: single_asset_lending::instruction::CreateVault {
            interest_rate_bps,
            collateral_factor_bps,
        }
        .data(),
    }
}

/// Creates the vault for `asset_mint`, paid for by the test payer
pub async fn setup_vault(
    context: &mut ProgramTestContext,
    program_id: &Pubkey,
    asset_mint: &Pubkey,
    interest_rate_bps: u16,
    collateral_factor_bps: u16,
) -> FuzzResult<VaultAccounts> {
    let vault = vault_accounts(program_id, asset_mint)?;
    let ix = create_vault_ix(
        program_id,
        &vault,
        &context.payer.pubkey(),
        interest_rate_bps,
        collateral_factor_bps,
    );

    send(context, &[ix], &[]).await?;

    Ok(vault)
}

/// Creates a funded wallet with a token account holding `balance` of the asset
pub async fn setup_user(
    context: &mut ProgramTestContext,
    program_id: &Pubkey,
    asset: &AssetMintAccounts,
    vault: &VaultAccounts,
    balance: u64,
) -> FuzzResult<UserAccounts> {
    let owner = Keypair::new();
    fund_wallet(context, &owner.pubkey(), 1_000_000_000).await?; // 1 SOL

    let rent = context.banks_client.get_rent().await?;
    let account_len = 165; // Size of Token account in SPL Token program

    let token_account = Keypair::new();
    let create_ix = solana_sdk::system_instruction::create_account(
        &context.payer.pubkey(),
        &token_account.pubkey(),
        rent.minimum_balance(account_len),
        account_len as u64,
        &spl_token::id(),
    );

    let init_ix = token_instruction::initialize_account(
        &spl_token::id(),
        &token_account.pubkey(),
        &asset.mint,
        &owner.pubkey(),
    )?;

    send(context, &[create_ix, init_ix], &[&token_account]).await?;

    if balance > 0 {
        mint_tokens_to(
            context,
            &asset.mint,
            &asset.mint_authority,
            &token_account.pubkey(),
            balance,
        )
        .await?;
    }

    let user_state = derive_user_state(
        program_id,
        &SeedConfig::DEFAULT,
        &vault.vault_account,
        &owner.pubkey(),
    )
    .map_err(|e| format!("{:?}", e))?
    .address;

    Ok(UserAccounts {
        owner,
        token_account: token_account.pubkey(),
        user_state,
    })
}

/// Mints tokens to any token account
pub async fn mint_tokens_to(
    context: &mut ProgramTestContext,
    mint: &Pubkey,
    mint_authority: &Keypair,
    destination: &Pubkey,
    amount: u64,
) -> FuzzResult<()> {
    let mint_to_ix = token_instruction::mint_to(
        &spl_token::id(),
        mint,
        destination,
        &mint_authority.pubkey(),
        &[],
        amount,
    )?;

    send(context, &[mint_to_ix], &[mint_authority]).await?;

    Ok(())
}

/// Sets up everything: mint + vault + alice and bob with tokens
pub async fn setup_complete_environment(
    initial_user_balance: u64,
    decimals: u8,
    interest_rate_bps: u16,
    collateral_factor_bps: u16,
) -> FuzzResult<(FuzzTestEnv, CompleteSetup)> {
    let mut env = setup_program_test().await;

    let asset = setup_asset_mint(&mut env.context, decimals).await?;

    let vault = setup_vault(
        &mut env.context,
        &env.program_id,
        &asset.mint,
        interest_rate_bps,
        collateral_factor_bps,
    )
    .await?;

    let alice = setup_user(
        &mut env.context,
        &env.program_id,
        &asset,
        &vault,
        initial_user_balance,
    )
    .await?;

    let bob = setup_user(
        &mut env.context,
        &env.program_id,
        &asset,
        &vault,
        initial_user_balance,
    )
    .await?;

    let setup = CompleteSetup {
        asset,
        vault,
        alice,
        bob,
    };

    Ok((env, setup))
}

// ============================================================================
// Instruction Builders
// ============================================================================

pub fn deposit_ix(
    program_id: &Pubkey,
    vault: &VaultAccounts,
    user: &UserAccounts,
    amount: u64,
) -> Instruction {
    let accounts = single_asset_lending::accounts::Deposit {
        depositor: user.owner.pubkey(),
        vault_mint: vault.asset_mint,
        vault_account: vault.vault_account,
        vault_state_account: vault.vault_state,
        vault_rewards_account: vault.vault_rewards,
        user_state_account: user.user_state,
        user_token_account: user.token_account,
        system_program: solana_sdk::system_program::ID,
        token_program: spl_token::id(),
    };

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: single_asset_lending::instruction::Deposit { amount }.data(),
    }
}

pub fn borrow_ix(
    program_id: &Pubkey,
    vault: &VaultAccounts,
    user: &UserAccounts,
    amount: u64,
) -> Instruction {
    let accounts = single_asset_lending::accounts::Borrow {
        borrower: user.owner.pubkey(),
        vault_mint: vault.asset_mint,
        vault_account: vault.vault_account,
        vault_state_account: vault.vault_state,
        vault_rewards_account: vault.vault_rewards,
        vault_authority: vault.vault_authority,
        user_state_account: user.user_state,
        user_token_account: user.token_account,
        token_program: spl_token::id(),
    };

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: single_asset_lending::instruction::Borrow {
            vault_bump: vault.vault_bump,
            amount,
        }
        .data(),
    }
}

pub fn repay_ix(
    program_id: &Pubkey,
    vault: &VaultAccounts,
    user: &UserAccounts,
    amount: u64,
) -> Instruction {
    let accounts = single_asset_lending::accounts::Repay {
        payer: user.owner.pubkey(),
        vault_mint: vault.asset_mint,
        vault_account: vault.vault_account,
        vault_state_account: vault.vault_state,
        vault_rewards_account: vault.vault_rewards,
        user_state_account: user.user_state,
        user_token_account: user.token_account,
        token_program: spl_token::id(),
    };

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: single_asset_lending::instruction::Repay { amount }.data(),
    }
}

pub fn withdraw_ix(
    program_id: &Pubkey,
    vault: &VaultAccounts,
    user: &UserAccounts,
    amount: u64,
) -> Instruction {
    let accounts = single_asset_lending::accounts::Withdraw {
        owner: user.owner.pubkey(),
        vault_mint: vault.asset_mint,
        vault_account: vault.vault_account,
        vault_state_account: vault.vault_state,
        vault_rewards_account: vault.vault_rewards,
        vault_authority: vault.vault_authority,
        user_state_account: user.user_state,
        user_token_account: user.token_account,
        token_program: spl_token::id(),
    };

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: single_asset_lending::instruction::Withdraw { amount }.data(),
    }
}

pub fn claim_rewards_ix(
    program_id: &Pubkey,
    vault: &VaultAccounts,
    user: &UserAccounts,
) -> Instruction {
    let accounts = single_asset_lending::accounts::ClaimRewards {
        owner: user.owner.pubkey(),
        vault_mint: vault.asset_mint,
        vault_account: vault.vault_account,
        vault_state_account: vault.vault_state,
        vault_rewards_account: vault.vault_rewards,
        vault_authority: vault.vault_authority,
        user_state_account: user.user_state,
        user_token_account: user.token_account,
        token_program: spl_token::id(),
    };

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: single_asset_lending::instruction::ClaimRewards {}.data(),
    }
}

pub fn pending_rewards_ix(
    program_id: &Pubkey,
    vault: &VaultAccounts,
    user: &UserAccounts,
) -> Instruction {
    let accounts = single_asset_lending::accounts::PendingRewards {
        owner: user.owner.pubkey(),
        vault_mint: vault.asset_mint,
        vault_account: vault.vault_account,
        vault_state_account: vault.vault_state,
        user_state_account: user.user_state,
    };

    Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(None),
        data: single_asset_lending::instruction::PendingRewards {}.data(),
    }
}

/// Simulates `ix` without committing it and returns the program's return data
pub async fn simulate_return_data(
    context: &mut ProgramTestContext,
    ix: Instruction,
    signers: &[&Keypair],
) -> FuzzResult<Vec<u8>> {
    let mut all_signers: Vec<&Keypair> = vec![&context.payer];
    all_signers.extend_from_slice(signers);

    let tx = Transaction::new_signed_with_payer(
        &[ix],
        Some(&context.payer.pubkey()),
        &all_signers,
        context.last_blockhash,
    );

    let simulation = context.banks_client.simulate_transaction(tx).await?;
    if let Some(Err(err)) = simulation.result {
        return Err(format!("simulation failed: {:?}", err).into());
    }

    let return_data = simulation
        .simulation_details
        .and_then(|details| details.return_data)
        .ok_or("simulation returned no data")?;

    Ok(return_data.data)
}

/// Simulates the read-only pending rewards query and decodes its return data
pub async fn query_pending_rewards(
    context: &mut ProgramTestContext,
    program_id: &Pubkey,
    vault: &VaultAccounts,
    user: &UserAccounts,
) -> FuzzResult<u64> {
    let ix = pending_rewards_ix(program_id, vault, user);
    let data = simulate_return_data(context, ix, &[]).await?;
    let bytes: [u8; 8] = data
        .as_slice()
        .try_into()
        .map_err(|_| "Failed to parse pending rewards")?;

    Ok(u64::from_le_bytes(bytes))
}

/// Simulates vault creation and decodes the returned vault state address
pub async fn simulate_create_vault(
    context: &mut ProgramTestContext,
    program_id: &Pubkey,
    vault: &VaultAccounts,
    interest_rate_bps: u16,
    collateral_factor_bps: u16,
) -> FuzzResult<Pubkey> {
    let payer = context.payer.pubkey();
    let ix = create_vault_ix(
        program_id,
        vault,
        &payer,
        interest_rate_bps,
        collateral_factor_bps,
    );
    let data = simulate_return_data(context, ix, &[]).await?;
    let bytes: [u8; 32] = data
        .as_slice()
        .try_into()
        .map_err(|_| "Failed to parse vault state address")?;

    Ok(Pubkey::new_from_array(bytes))
}

// ============================================================================
// Account State Verification Helpers
// ============================================================================

/// Fetch and return vault state
pub async fn get_vault_state(
    context: &mut ProgramTestContext,
    vault_state: &Pubkey,
) -> FuzzResult<VaultState> {
    let account = context
        .banks_client
        .get_account(*vault_state)
        .await?
        .ok_or("Vault state account not found")?;

    let state = VaultState::try_deserialize(&mut account.data.as_ref())?;
    Ok(state)
}

/// Fetch a user state, `None` if it was never created
pub async fn get_user_state(
    context: &mut ProgramTestContext,
    user_state: &Pubkey,
) -> FuzzResult<Option<UserState>> {
    let Some(account) = context.banks_client.get_account(*user_state).await? else {
        return Ok(None);
    };

    let state = UserState::try_deserialize(&mut account.data.as_ref())?;
    Ok(Some(state))
}

/// Get token account balance
pub async fn get_token_balance(
    context: &mut ProgramTestContext,
    account: &Pubkey,
) -> FuzzResult<u64> {
    let account_data = context
        .banks_client
        .get_account(*account)
        .await?
        .ok_or("Token account not found")?;

    // Token account structure: amount is at offset 64 (u64)
    if account_data.data.len() < 72 {
        return Err("Invalid token account data".into());
    }

    let amount = u64::from_le_bytes(
        account_data.data[64..72]
            .try_into()
            .map_err(|_| "Failed to parse amount")?,
    );

    Ok(amount)
}

/// Checks both custody accounts against the recorded totals
pub async fn assert_reconciled(
    context: &mut ProgramTestContext,
    vault: &VaultAccounts,
) -> FuzzResult<VaultState> {
    let state = get_vault_state(context, &vault.vault_state).await?;
    let vault_balance = get_token_balance(context, &vault.vault_account).await?;
    let rewards_balance = get_token_balance(context, &vault.vault_rewards).await?;

    assert_eq!(
        vault_balance,
        state.total_deposits - state.total_borrowed,
        "CRITICAL: vault custody diverges from ledger"
    );
    assert_eq!(
        rewards_balance,
        state.total_rewards_accrued - state.total_rewards_claimed,
        "CRITICAL: rewards custody diverges from ledger"
    );

    Ok(state)
}
