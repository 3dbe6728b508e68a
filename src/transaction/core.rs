//! Defines the income/expense record and the database queries that persist it.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    auth::UserID,
    database_id::TransactionId,
    error::ValidationErrors,
    transaction::{
        policy::VisibilityScope,
        tax::{TaxBreakdown, TaxKind, compute_tax},
    },
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Income.
    Credit,
    /// An expense.
    Debit,
}

impl TransactionKind {
    /// The name stored in the database and used over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction kind {0:?}")]
pub struct UnknownTransactionKind(pub String);

impl FromStr for TransactionKind {
    type Err = UnknownTransactionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionKind::Credit),
            "debit" => Ok(TransactionKind::Debit),
            other => Err(UnknownTransactionKind(other.to_owned())),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// An expense or income recorded by a user.
///
/// `calculated_tax` and `total` are derived from `amount`, `tax` and
/// `tax_kind` every time the record is written and are never set by clients.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The ID of the record.
    pub id: TransactionId,
    /// The user that owns the record.
    pub owner: UserID,
    /// A short, non-empty name for the record.
    pub title: String,
    /// Optional free text.
    pub description: Option<String>,
    /// The base amount, always positive.
    pub amount: Decimal,
    /// Whether the record is income or an expense.
    pub kind: TransactionKind,
    /// The tax input, interpreted according to `tax_kind`.
    pub tax: Decimal,
    /// How `tax` is interpreted.
    pub tax_kind: TaxKind,
    /// When the money moved.
    pub date: Date,
    /// The tax in currency units.
    pub calculated_tax: Decimal,
    /// `amount` plus `calculated_tax`.
    pub total: Decimal,
    /// When the record was created.
    pub created_at: OffsetDateTime,
    /// When the record was last written.
    pub updated_at: OffsetDateTime,
}

/// The client-settable fields of a record, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFields {
    /// A short, non-empty name for the record.
    pub title: String,
    /// Optional free text.
    pub description: Option<String>,
    /// The base amount, always positive.
    pub amount: Decimal,
    /// Whether the record is income or an expense.
    pub kind: TransactionKind,
    /// The tax input, never negative.
    pub tax: Decimal,
    /// How `tax` is interpreted.
    pub tax_kind: TaxKind,
    /// When the money moved.
    pub date: Date,
}

impl TransactionFields {
    /// Derive the calculated tax and total for these fields.
    pub fn tax_breakdown(&self) -> TaxBreakdown {
        compute_tax(self.amount, self.tax, self.tax_kind)
    }
}

impl From<&Transaction> for TransactionFields {
    fn from(transaction: &Transaction) -> Self {
        Self {
            title: transaction.title.clone(),
            description: transaction.description.clone(),
            amount: transaction.amount,
            kind: transaction.kind,
            tax: transaction.tax,
            tax_kind: transaction.tax_kind,
            date: transaction.date,
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SELECT_COLUMNS: &str = "id, user_id, title, description, amount, transaction_type, tax, \
    tax_type, date, tax_amount_calculated, total_amount, created_at, updated_at";

/// Create the record table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense_income (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                amount TEXT NOT NULL,
                transaction_type TEXT NOT NULL CHECK (transaction_type IN ('credit', 'debit')),
                tax TEXT NOT NULL DEFAULT '0.00',
                tax_type TEXT NOT NULL DEFAULT 'flat' CHECK (tax_type IN ('flat', 'percentage')),
                date TEXT NOT NULL,
                tax_amount_calculated TEXT NOT NULL,
                total_amount TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_expense_income_user_date ON expense_income(user_id, date);",
        (),
    )?;

    Ok(())
}

/// Insert a record owned by `owner`, stamping both timestamps with `now`.
///
/// The derived fields are taken from `breakdown` and should come from
/// [TransactionFields::tax_breakdown] of the same `fields`.
///
/// # Errors
/// This function will return a:
/// - [Error::Validation] on `user` if `owner` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    owner: UserID,
    fields: &TransactionFields,
    breakdown: &TaxBreakdown,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO expense_income (user_id, title, description, amount, transaction_type, \
             tax, tax_type, date, tax_amount_calculated, total_amount, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             RETURNING {SELECT_COLUMNS}"
        ))?
        .query_row(
            rusqlite::params![
                owner,
                fields.title,
                fields.description,
                fields.amount.to_string(),
                fields.kind,
                fields.tax.to_string(),
                fields.tax_kind,
                fields.date,
                breakdown.calculated_tax.to_string(),
                breakdown.total.to_string(),
                now,
            ],
            map_transaction_row,
        )
        .map_err(map_owner_constraint_error)
}

/// Retrieve the record `id` if it lies within `scope`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not exist or is outside `scope`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn select_transaction(
    id: TransactionId,
    scope: &VisibilityScope,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM expense_income
             WHERE id = :id AND (:owner IS NULL OR user_id = :owner)"
        ))?
        .query_row(
            rusqlite::named_params! {":id": id, ":owner": scope.owner_filter()},
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Retrieve every record within `scope`, most recent first.
///
/// Records are ordered by date, then creation time, then ID, all descending.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn select_transactions(
    scope: &VisibilityScope,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM expense_income
             WHERE (:owner IS NULL OR user_id = :owner)
             ORDER BY date DESC, created_at DESC, id DESC"
        ))?
        .query_map(
            rusqlite::named_params! {":owner": scope.owner_filter()},
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Overwrite every stored field of the record `id` and refresh its `updated_at`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not exist,
/// - [Error::Validation] on `user` if `owner` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    owner: UserID,
    fields: &TransactionFields,
    breakdown: &TaxBreakdown,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "UPDATE expense_income
             SET user_id = ?1, title = ?2, description = ?3, amount = ?4, transaction_type = ?5,
                 tax = ?6, tax_type = ?7, date = ?8, tax_amount_calculated = ?9,
                 total_amount = ?10, updated_at = ?11
             WHERE id = ?12
             RETURNING {SELECT_COLUMNS}"
        ))?
        .query_row(
            rusqlite::params![
                owner,
                fields.title,
                fields.description,
                fields.amount.to_string(),
                fields.kind,
                fields.tax.to_string(),
                fields.tax_kind,
                fields.date,
                breakdown.calculated_tax.to_string(),
                breakdown.total.to_string(),
                now,
                id,
            ],
            map_transaction_row,
        )
        .map_err(map_owner_constraint_error)
}

/// Delete the record `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM expense_income WHERE id = :id", &[(":id", &id)])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the total number of records in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM expense_income;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_owner_constraint_error(error: rusqlite::Error) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            _,
        ) => Error::Validation(ValidationErrors::single(
            "user",
            "Specified user does not exist.",
        )),
        error => error.into(),
    }
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        amount: get_decimal(row, 4)?,
        kind: row.get(5)?,
        tax: get_decimal(row, 6)?,
        tax_kind: row.get(7)?,
        date: row.get(8)?,
        calculated_tax: get_decimal(row, 9)?,
        total: get_decimal(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

// Decimals are stored as text so that no precision is lost.
fn get_decimal(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    Decimal::from_str(&text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

// ============================================================================
// TESTS
// ============================================================================
