//! The persistence boundary for records.
//!
//! Every operation takes the acting user explicitly. Writes run inside one
//! SQLite transaction so that validation, ownership checks, tax derivation and
//! the write itself are applied as a unit.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRef;
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{Actor, user_exists},
    database_id::TransactionId,
    transaction::{
        Transaction,
        core::{
            delete_transaction, insert_transaction, select_transaction, select_transactions,
            update_transaction,
        },
        policy::{
            VisibilityScope, authorize_delete, resolve_new_owner, resolve_updated_owner,
            visibility_scope,
        },
        validation::{
            TransactionPayload, UpdateMode, combine, requested_owner, validate_changes,
            validate_new,
        },
    },
};

/// Handles the creation, retrieval, modification and deletion of records on
/// behalf of an actor.
pub trait TransactionStore {
    /// Every record visible to `actor`, most recent first.
    fn list(&self, actor: &Actor) -> Result<Vec<Transaction>, Error>;

    /// The record `id`, or [Error::NotFound] if it does not exist or is not
    /// visible to `actor`.
    fn get(&self, actor: &Actor, id: TransactionId) -> Result<Transaction, Error>;

    /// Validate `payload`, derive the tax fields, and store a new record.
    fn create(&self, actor: &Actor, payload: &TransactionPayload) -> Result<Transaction, Error>;

    /// Validate `payload` against the record `id`, re-derive the tax fields,
    /// and store the result.
    fn update(
        &self,
        actor: &Actor,
        id: TransactionId,
        payload: &TransactionPayload,
        mode: UpdateMode,
    ) -> Result<Transaction, Error>;

    /// Delete the record `id` if `actor` owns it or is privileged.
    fn delete(&self, actor: &Actor, id: TransactionId) -> Result<(), Error>;
}

/// Stores records in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl FromRef<AppState> for SQLiteTransactionStore {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.db_connection.clone())
    }
}

impl TransactionStore for SQLiteTransactionStore {
    fn list(&self, actor: &Actor) -> Result<Vec<Transaction>, Error> {
        let connection = self.lock()?;

        select_transactions(&visibility_scope(actor), &connection)
    }

    fn get(&self, actor: &Actor, id: TransactionId) -> Result<Transaction, Error> {
        let connection = self.lock()?;

        select_transaction(id, &visibility_scope(actor), &connection)
    }

    fn create(&self, actor: &Actor, payload: &TransactionPayload) -> Result<Transaction, Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;

        let fields = validate_new(payload).map_err(Error::from);
        let owner = requested_owner(payload)
            .map_err(Error::from)
            .and_then(|requested| {
                resolve_new_owner(actor, requested, |user_id| {
                    user_exists(user_id, &transaction)
                })
            });
        let (fields, owner) = combine(fields, owner)?;

        let breakdown = fields.tax_breakdown();
        let created = insert_transaction(
            owner,
            &fields,
            &breakdown,
            OffsetDateTime::now_utc(),
            &transaction,
        )?;
        transaction.commit()?;

        tracing::info!(
            "User {} created record {} for user {}",
            actor.user_id,
            created.id,
            created.owner
        );

        Ok(created)
    }

    fn update(
        &self,
        actor: &Actor,
        id: TransactionId,
        payload: &TransactionPayload,
        mode: UpdateMode,
    ) -> Result<Transaction, Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;

        let current = select_transaction(id, &visibility_scope(actor), &transaction)?;
        let changes = validate_changes(payload, mode).map_err(Error::from);
        let owner = requested_owner(payload)
            .map_err(Error::from)
            .and_then(|requested| {
                resolve_updated_owner(actor, &current, requested, |user_id| {
                    user_exists(user_id, &transaction)
                })
            });
        let (changes, owner) = combine(changes, owner)?;

        let fields = changes.apply_to(&current);
        let breakdown = fields.tax_breakdown();
        let updated = update_transaction(
            id,
            owner,
            &fields,
            &breakdown,
            OffsetDateTime::now_utc(),
            &transaction,
        )?;
        transaction.commit()?;

        tracing::info!("User {} updated record {}", actor.user_id, updated.id);

        Ok(updated)
    }

    fn delete(&self, actor: &Actor, id: TransactionId) -> Result<(), Error> {
        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;

        let target = select_transaction(id, &VisibilityScope::All, &transaction)?;
        authorize_delete(actor, &target)?;
        delete_transaction(id, &transaction)?;
        transaction.commit()?;

        tracing::info!("User {} deleted record {}", actor.user_id, id);

        Ok(())
    }
}
