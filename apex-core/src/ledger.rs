//! Balance mutations with invariant enforcement
//!
//! Every function validates fully before touching the snapshot, so an `Err`
//! always leaves the snapshot exactly as it was.
//!
//! # Invariants
//!
//! - Balances are unsigned and never underflow: a debit larger than the
//!   balance fails with `InsufficientFunds`
//! - Transfers conserve the total of the moved asset
//! - The cached rank matches the coin balance after every coin mutation

use crate::types::{Account, Asset, OwnerId, Snapshot, Transfer};
use crate::{Error, Result};

/// Parse a user-entered amount; negative, zero and malformed input is rejected
pub fn parse_amount(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let value: i128 = trimmed
        .parse()
        .map_err(|_| Error::InvalidAmount(format!("{:?} is not a whole number", input)))?;
    if value <= 0 {
        return Err(Error::InvalidAmount(format!("{} must be positive", value)));
    }
    u64::try_from(value).map_err(|_| Error::InvalidAmount(format!("{} is too large", value)))
}

fn ensure_positive(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount("Amount must be positive".to_string()));
    }
    Ok(())
}

/// Create an account with the starting balance
pub fn register<'a>(
    snapshot: &'a mut Snapshot,
    owner: &OwnerId,
    starting_coins: u64,
) -> Result<&'a Account> {
    let owner = OwnerId::parse(owner.as_str())?;
    if snapshot.accounts.contains_key(&owner) {
        return Err(Error::AccountExists(owner.to_string()));
    }

    tracing::debug!(owner = %owner, starting_coins, "Account registered");
    Ok(snapshot
        .accounts
        .entry(owner)
        .or_insert_with(|| Account::new(starting_coins)))
}

/// Increase a balance
pub fn credit(snapshot: &mut Snapshot, owner: &OwnerId, kind: Asset, amount: u64) -> Result<u64> {
    ensure_positive(amount)?;
    let account = snapshot.account_mut(owner)?;

    let balance = account.balance_mut(kind);
    *balance = balance
        .checked_add(amount)
        .ok_or_else(|| Error::InvalidAmount(format!("Credit of {} overflows {}", amount, kind)))?;
    let new_balance = *balance;

    if kind == Asset::Coins {
        account.refresh_rank();
    }

    tracing::debug!(owner = %owner, kind = %kind, amount, new_balance, "Credit applied");
    Ok(new_balance)
}

/// Decrease a balance; fails without mutation if the balance is too small
pub fn debit(snapshot: &mut Snapshot, owner: &OwnerId, kind: Asset, amount: u64) -> Result<u64> {
    ensure_positive(amount)?;
    let account = snapshot.account_mut(owner)?;

    let available = account.balance(kind);
    if amount > available {
        return Err(Error::InsufficientFunds {
            needed: amount,
            available,
        });
    }

    let balance = account.balance_mut(kind);
    *balance -= amount;
    let new_balance = *balance;

    if kind == Asset::Coins {
        account.refresh_rank();
    }

    tracing::debug!(owner = %owner, kind = %kind, amount, new_balance, "Debit applied");
    Ok(new_balance)
}

/// Move an amount between two accounts
///
/// Both legs are checked before either is applied. A self-transfer runs the
/// same validation and leaves the balance unchanged.
pub fn transfer(snapshot: &mut Snapshot, transfer: &Transfer) -> Result<()> {
    let Transfer {
        from,
        to,
        kind,
        amount,
    } = transfer;
    ensure_positive(*amount)?;

    let available = snapshot.account(from)?.balance(*kind);
    let receiver_balance = snapshot.account(to)?.balance(*kind);

    if *amount > available {
        return Err(Error::InsufficientFunds {
            needed: *amount,
            available,
        });
    }

    if from == to {
        tracing::debug!(owner = %from, kind = %kind, amount, "Self-transfer validated");
        return Ok(());
    }

    if receiver_balance.checked_add(*amount).is_none() {
        return Err(Error::InvalidAmount(format!(
            "Transfer of {} overflows {} balance of {}",
            amount, kind, to
        )));
    }

    debit(snapshot, from, *kind, *amount)?;
    credit(snapshot, to, *kind, *amount)?;

    tracing::debug!(from = %from, to = %to, kind = %kind, amount, "Transfer applied");
    Ok(())
}
