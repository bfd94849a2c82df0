use anchor_lang::prelude::*;

/// Result type of the pure ledger transitions in `state`
pub type LendingResult<T = ()> = std::result::Result<T, LendingError>;

#[error_code]
pub enum LendingError {
    #[msg("Parameter out of range")]
    InvalidParameter,
    #[msg("Vault state already exists for this asset")]
    AlreadyInitialized,
    #[msg("Payer cannot fund account creation")]
    InsufficientFunding,
    #[msg("User state does not exist")]
    NotFound,
    #[msg("Borrow would exceed the collateral factor")]
    InsufficientCollateral,
    #[msg("Vault does not hold enough idle liquidity")]
    InsufficientLiquidity,
    #[msg("Source balance is too small")]
    InsufficientBalance,
    #[msg("Custody balance diverges from recorded totals")]
    ReconciliationFailure,
    #[msg("No rewards to claim")]
    NothingToClaim,
    #[msg("Signer does not own this user state")]
    Unauthorized,
    #[msg("Math operation overflow")]
    MathOverflow,
    #[msg("No valid program address for seeds")]
    AddressDerivationFailed,
}
