use std::sync::Mutex;

use rusqlite::{params, Connection, Row};
use time::PrimitiveDateTime;

use crate::{
    models::{
        format_timestamp, now_utc, parse_timestamp, Account, AccountSeed,
        CreateTransactionCommand, Transaction, TransactionType,
    },
    storage::{StorageBackend, StorageError},
};

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StorageError::Other(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                name_cn TEXT NOT NULL,
                balance REAL NOT NULL DEFAULT 0,
                is_debt INTEGER NOT NULL DEFAULT 0,
                icon TEXT NOT NULL DEFAULT 'wallet',
                color TEXT NOT NULL DEFAULT '#3B82F6',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                transaction_type TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE INDEX IF NOT EXISTS idx_txn_created
                ON transactions(created_at);

            CREATE INDEX IF NOT EXISTS idx_txn_account
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

fn column_timestamp(row: &Row, idx: usize) -> rusqlite::Result<PrimitiveDateTime> {
    let s: String = row.get(idx)?;
    parse_timestamp(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid timestamp: {}", s),
            )),
        )
    })
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        name_cn: row.get(2)?,
        balance: row.get(3)?,
        is_debt: row.get(4)?,
        icon: row.get(5)?,
        color: row.get(6)?,
        created_at: column_timestamp(row, 7)?,
        updated_at: column_timestamp(row, 8)?,
    })
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let type_str: String = row.get(5)?;
    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        account_name: row.get(2)?,
        account_color: row.get(3)?,
        amount: row.get(4)?,
        transaction_type: str_to_transaction_type(&type_str),
        note: row.get(6)?,
        created_at: column_timestamp(row, 7)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, name, name_cn, balance, is_debt, icon, color, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "t.id, t.account_id, a.name_cn, a.color, t.amount, \
     t.transaction_type, t.note, t.created_at";

impl StorageBackend for SqliteStorage {
    fn list_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM accounts ORDER BY id",
                ACCOUNT_COLUMNS
            ))
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let rows = stmt
            .query_map([], account_from_row)
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row.map_err(|e| StorageError::Other(e.to_string()))?);
        }
        Ok(accounts)
    }

    fn get_account(&self, id: i64) -> Result<Account, StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS),
            params![id],
            account_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::AccountNotFound(id),
            e => StorageError::Other(e.to_string()),
        })
    }

    fn set_balance(&self, id: i64, balance: f64) -> Result<Account, StorageError> {
        {
            let conn = self.conn.lock().unwrap();
            let now = format_timestamp(now_utc());
            let changed = conn
                .execute(
                    "UPDATE accounts SET balance = ?1, updated_at = ?2 WHERE id = ?3",
                    params![balance, now, id],
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
        let conn = self.conn.lock().unwrap();
        let now = format_timestamp(now_utc());
        // Relies on the UNIQUE constraint on name.
        conn.execute(
            "INSERT OR IGNORE INTO accounts
                 (name, name_cn, balance, is_debt, icon, color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                seed.name,
                seed.name_cn,
                seed.balance,
                seed.is_debt,
                seed.icon,
                seed.color,
                now
            ],
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }

    fn create_transaction(
        &self,
        command: &CreateTransactionCommand,
    ) -> Result<Transaction, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let account: Option<(String, String)> = tx
            .query_row(
                "SELECT name_cn, color FROM accounts WHERE id = ?1",
                params![command.account_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(StorageError::Other(e.to_string())),
            })?;
        let (account_name, account_color) =
            account.ok_or(StorageError::AccountNotFound(command.account_id))?;

        let signed = command.transaction_type.signed(command.amount);
        let created_at = now_utc();
        let now = format_timestamp(created_at);

        tx.execute(
            "UPDATE accounts SET balance = balance + ?1, updated_at = ?2 WHERE id = ?3",
            params![signed, now, command.account_id],
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;

        tx.execute(
            "INSERT INTO transactions (account_id, amount, transaction_type, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                command.account_id,
                signed,
                command.transaction_type.as_str(),
                command.note,
                now
            ],
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;
        let id = tx.last_insert_rowid();

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
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let offset = (page.saturating_sub(1) as i64) * per_page as i64;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM transactions t
                 JOIN accounts a ON a.id = t.account_id
                 ORDER BY t.created_at DESC, t.id DESC
                 LIMIT ?1 OFFSET ?2",
                TRANSACTION_COLUMNS
            ))
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let rows = stmt
            .query_map(params![per_page as i64, offset], transaction_from_row)
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row.map_err(|e| StorageError::Other(e.to_string()))?);
        }
        Ok((transactions, total as u64))
    }

    fn list_all_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM transactions t
                 JOIN accounts a ON a.id = t.account_id
                 ORDER BY t.created_at DESC, t.id DESC",
                TRANSACTION_COLUMNS
            ))
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let rows = stmt
            .query_map([], transaction_from_row)
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row.map_err(|e| StorageError::Other(e.to_string()))?);
        }
        Ok(transactions)
    }

    fn spend_in_range(
        &self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<f64, StorageError> {
        let conn = self.conn.lock().unwrap();
        let sum: f64 = conn
            .query_row(
                "SELECT COALESCE(SUM(amount), 0.0) FROM transactions
                 WHERE amount < 0 AND created_at >= ?1 AND created_at < ?2",
                params![format_timestamp(start), format_timestamp(end)],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(sum.abs())
    }
}
