#[macro_export]
macro_rules! vault_authority_signer_seeds {
    ($vault_account:expr, $bump:expr) => {
        &[
            $crate::constants::VAULT_AUTHORITY_SEED,
            $vault_account.as_ref(),
            &[$bump],
        ]
    };
}
