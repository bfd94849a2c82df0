use anchor_lang::prelude::*;
use anchor_lang::system_program::{
    self, allocate, assign, create_account, transfer, Allocate, Assign, CreateAccount, Transfer,
};

/// True once anything has been allocated or assigned at `info`
pub fn is_allocated(info: &AccountInfo) -> bool {
    !info.data_is_empty() || info.owner != &system_program::ID
}

/// Lamports still needed for `info` to be rent exempt at `space` bytes
pub fn rent_shortfall(info: &AccountInfo, space: usize) -> Result<u64> {
    let required = Rent::get()?.minimum_balance(space);
    Ok(required.saturating_sub(info.lamports()))
}

/// Allocates a program-derived account. A PDA that was pre-funded by someone
/// else is topped up, allocated and assigned instead of created.
pub fn create_pda_account<'info>(
    payer: &AccountInfo<'info>,
    target: &AccountInfo<'info>,
    system_program: &AccountInfo<'info>,
    space: usize,
    owner: &Pubkey,
    signer_seeds: &[&[&[u8]]],
) -> Result<()> {
    let lamports = rent_shortfall(target, space)?;

    if target.lamports() == 0 {
        let cpi_ctx = CpiContext::new_with_signer(
            system_program.clone(),
            CreateAccount {
                from: payer.clone(),
                to: target.clone(),
            },
            signer_seeds,
        );
        return create_account(cpi_ctx, lamports, space as u64, owner);
    }

    if lamports > 0 {
        let cpi_ctx = CpiContext::new(
            system_program.clone(),
            Transfer {
                from: payer.clone(),
                to: target.clone(),
            },
        );
        transfer(cpi_ctx, lamports)?;
    }

    let cpi_ctx = CpiContext::new_with_signer(
        system_program.clone(),
        Allocate {
            account_to_allocate: target.clone(),
        },
        signer_seeds,
    );
    allocate(cpi_ctx, space as u64)?;

    let cpi_ctx = CpiContext::new_with_signer(
        system_program.clone(),
        Assign {
            account_to_assign: target.clone(),
        },
        signer_seeds,
    );
    assign(cpi_ctx, owner)
}

/// Serializes `record` (discriminator included) into an account this
/// program owns
pub fn write_account<T: AccountSerialize>(info: &AccountInfo, record: &T) -> Result<()> {
    let mut data = info.try_borrow_mut_data()?;
    let mut dst: &mut [u8] = &mut data;
    record.try_serialize(&mut dst)
}
