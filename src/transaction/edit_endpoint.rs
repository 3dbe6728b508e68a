//! Route handlers for full (PUT) and partial (PATCH) updates of a record.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{
    Error,
    auth::Actor,
    database_id::TransactionId,
    transaction::{
        FullRecordView, SQLiteTransactionStore, TransactionPayload, TransactionStore, UpdateMode,
        get_endpoint::record_id,
    },
};

/// A route handler for replacing a record.
///
/// Title, amount, transaction type and date must be sent. Optional fields
/// that are left out keep their stored values.
pub async fn put_transaction_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<TransactionId>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    update(&store, &actor, path, body, UpdateMode::Full)
}

/// A route handler for changing some fields of a record.
pub async fn patch_transaction_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<TransactionId>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    update(&store, &actor, path, body, UpdateMode::Partial)
}

fn update(
    store: &SQLiteTransactionStore,
    actor: &Actor,
    path: Result<Path<TransactionId>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
    mode: UpdateMode,
) -> Response {
    let result = record_id(path).and_then(|id| {
        let Json(body) = body.map_err(Error::from)?;
        let payload = TransactionPayload::from_json(body)?;
        store.update(actor, id, &payload, mode)
    });

    match result {
        Ok(transaction) => Json(FullRecordView::from(&transaction)).into_response(),
        Err(error) => error.into_response(),
    }
}
