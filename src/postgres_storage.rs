use std::sync::Mutex;

use postgres::{Client, NoTls, Row};
use time::PrimitiveDateTime;

use crate::{
    models::{
        format_timestamp, now_utc, parse_timestamp, Account, AccountSeed,
        CreateTransactionCommand, Transaction, TransactionType,
    },
    storage::{StorageBackend, StorageError},
};

pub struct PostgresStorage {
    client: Mutex<Client>,
}

impl PostgresStorage {
    pub fn new(connection_string: &str) -> Result<Self, StorageError> {
        let client = Client::connect(connection_string, NoTls)
            .map_err(|e| StorageError::Other(format!("PostgreSQL connection failed: {}", e)))?;

        let storage = Self {
            client: Mutex::new(client),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let mut client = self.client.lock().unwrap();
        client
            .batch_execute(
                "
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                name_cn TEXT NOT NULL,
                balance DOUBLE PRECISION NOT NULL DEFAULT 0,
                is_debt BOOLEAN NOT NULL DEFAULT FALSE,
                icon TEXT NOT NULL DEFAULT 'wallet',
                color TEXT NOT NULL DEFAULT '#3B82F6',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id BIGSERIAL PRIMARY KEY,
                account_id BIGINT NOT NULL REFERENCES accounts(id),
                amount DOUBLE PRECISION NOT NULL,
                transaction_type TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pg_txn_created
                ON transactions(created_at);

            CREATE INDEX IF NOT EXISTS idx_pg_txn_account
                ON transactions(account_id);
            ",
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }
}

fn str_to_transaction_type(s: &str) -> TransactionType {
    match s {
        "increase" => TransactionType::Increase,
        _ => TransactionType::Decrease,
    }
}

fn row_timestamp(row: &Row, idx: usize) -> Result<PrimitiveDateTime, StorageError> {
    let s: String = row.get(idx);
    parse_timestamp(&s).ok_or_else(|| StorageError::Other(format!("invalid timestamp: {}", s)))
}

fn account_from_row(row: &Row) -> Result<Account, StorageError> {
    Ok(Account {
        id: row.get(0),
        name: row.get(1),
        name_cn: row.get(2),
        balance: row.get(3),
        is_debt: row.get(4),
        icon: row.get(5),
        color: row.get(6),
        created_at: row_timestamp(row, 7)?,
        updated_at: row_timestamp(row, 8)?,
    })
}

fn transaction_from_row(row: &Row) -> Result<Transaction, StorageError> {
    let type_str: String = row.get(5);
    Ok(Transaction {
        id: row.get(0),
        account_id: row.get(1),
        account_name: row.get(2),
        account_color: row.get(3),
        amount: row.get(4),
        transaction_type: str_to_transaction_type(&type_str),
        note: row.get(6),
        created_at: row_timestamp(row, 7)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, name, name_cn, balance, is_debt, icon, color, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "t.id, t.account_id, a.name_cn, a.color, t.amount, \
     t.transaction_type, t.note, t.created_at";

impl StorageBackend for PostgresStorage {
    fn list_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                &format!("SELECT {} FROM accounts ORDER BY id", ACCOUNT_COLUMNS),
                &[],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.iter().map(account_from_row).collect()
    }

    fn get_account(&self, id: i64) -> Result<Account, StorageError> {
        let mut client = self.client.lock().unwrap();
        let row = client
            .query_opt(
                &format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS),
                &[&id],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?
            .ok_or(StorageError::AccountNotFound(id))?;
        account_from_row(&row)
    }

    fn set_balance(&self, id: i64, balance: f64) -> Result<Account, StorageError> {
        {
            let mut client = self.client.lock().unwrap();
            let now = format_timestamp(now_utc());
            let changed = client
                .execute(
                    "UPDATE accounts SET balance = $1, updated_at = $2 WHERE id = $3",
                    &[&balance, &now, &id],
                )
                .map_err(|e| StorageError::Other(e.to_string()))?;
            if changed == 0 {
                return Err(StorageError::AccountNotFound(id));
            }
            tracing::debug!(account_id = id, balance, "Balance overwritten");
        }
        self.get_account(id)
    }

    fn ensure_account(&self, seed: &AccountSeed) -> Result<(), StorageError> {
        let mut client = self.client.lock().unwrap();
        let now = format_timestamp(now_utc());
        client
            .execute(
                "INSERT INTO accounts
                     (name, name_cn, balance, is_debt, icon, color, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                 ON CONFLICT (name) DO NOTHING",
                &[
                    &seed.name,
                    &seed.name_cn,
                    &seed.balance,
                    &seed.is_debt,
                    &seed.icon,
                    &seed.color,
                    &now,
                ],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }

    fn create_transaction(
        &self,
        command: &CreateTransactionCommand,
    ) -> Result<Transaction, StorageError> {
        let mut client = self.client.lock().unwrap();
        let mut tx = client
            .transaction()
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let row = tx
            .query_opt(
                "SELECT name_cn, color FROM accounts WHERE id = $1",
                &[&command.account_id],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?
            .ok_or(StorageError::AccountNotFound(command.account_id))?;
        let account_name: String = row.get(0);
        let account_color: String = row.get(1);

        let signed = command.transaction_type.signed(command.amount);
        let created_at = now_utc();
        let now = format_timestamp(created_at);

        tx.execute(
            "UPDATE accounts SET balance = balance + $1, updated_at = $2 WHERE id = $3",
            &[&signed, &now, &command.account_id],
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;

        let inserted = tx
            .query_one(
                "INSERT INTO transactions (account_id, amount, transaction_type, note, created_at)
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &command.account_id,
                    &signed,
                    &command.transaction_type.as_str(),
                    &command.note,
                    &now,
                ],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let id: i64 = inserted.get(0);

        tx.commit().map_err(|e| StorageError::Other(e.to_string()))?;
        tracing::debug!(transaction_id = id, account_id = command.account_id, amount = signed, "Transaction recorded");

        Ok(Transaction {
            id,
            account_id: command.account_id,
            account_name,
            account_color,
            amount: signed,
            transaction_type: command.transaction_type,
            note: command.note.clone(),
            created_at,
        })
    }

    fn list_transactions(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Transaction>, u64), StorageError> {
        let mut client = self.client.lock().unwrap();
        let count_row = client
            .query_one("SELECT COUNT(*) FROM transactions", &[])
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let total: i64 = count_row.get(0);

        let offset = (page.saturating_sub(1) as i64) * per_page as i64;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM transactions t
                     JOIN accounts a ON a.id = t.account_id
                     ORDER BY t.created_at DESC, t.id DESC
                     LIMIT $1 OFFSET $2",
                    TRANSACTION_COLUMNS
                ),
                &[&(per_page as i64), &offset],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let transactions = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((transactions, total as u64))
    }

    fn list_all_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM transactions t
                     JOIN accounts a ON a.id = t.account_id
                     ORDER BY t.created_at DESC, t.id DESC",
                    TRANSACTION_COLUMNS
                ),
                &[],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.iter().map(transaction_from_row).collect()
    }

    fn spend_in_range(
        &self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<f64, StorageError> {
        let mut client = self.client.lock().unwrap();
        let row = client
            .query_one(
                "SELECT COALESCE(SUM(amount), 0)::DOUBLE PRECISION FROM transactions
                 WHERE amount < 0 AND created_at >= $1 AND created_at < $2",
                &[&format_timestamp(start), &format_timestamp(end)],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let sum: f64 = row.get(0);
        Ok(sum.abs())
    }
}
