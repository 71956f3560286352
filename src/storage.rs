use thiserror::Error;
use time::PrimitiveDateTime;

use crate::models::{Account, AccountSeed, CreateTransactionCommand, Transaction, DEFAULT_ACCOUNTS};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
    #[error("account not found: {0}")]
    AccountNotFound(i64),
}

pub trait StorageBackend: Send + Sync {
    /// All accounts in insertion (id) order.
    fn list_accounts(&self) -> Result<Vec<Account>, StorageError>;

    fn get_account(&self, id: i64) -> Result<Account, StorageError>;

    /// Overwrites the stored balance directly, bypassing the ledger.
    /// This path is not recorded as a transaction, so it silently
    /// diverges from the ledger-derivable total.
    fn set_balance(&self, id: i64, balance: f64) -> Result<Account, StorageError>;

    /// Inserts the account only if no account with its `name` exists.
    fn ensure_account(&self, seed: &AccountSeed) -> Result<(), StorageError>;

    /// Applies the signed balance delta and inserts the ledger row as
    /// one atomic unit; on failure neither persists.
    fn create_transaction(
        &self,
        command: &CreateTransactionCommand,
    ) -> Result<Transaction, StorageError>;

    /// One page of transactions, newest first, plus the total row count.
    /// An out-of-range page yields an empty page, not an error.
    fn list_transactions(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Transaction>, u64), StorageError>;

    /// Every transaction, newest first.
    fn list_all_transactions(&self) -> Result<Vec<Transaction>, StorageError>;

    /// Summed expenditure (`amount < 0`) over `[start, end)`, returned
    /// as an absolute value. Exactly 0 when no rows match.
    fn spend_in_range(
        &self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<f64, StorageError>;
}

/// Seeds the default accounts, skipping any whose name already exists.
pub fn seed_default_accounts(storage: &dyn StorageBackend) -> Result<(), StorageError> {
    for seed in DEFAULT_ACCOUNTS {
        storage.ensure_account(seed)?;
    }
    Ok(())
}
