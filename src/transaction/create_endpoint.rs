//! Route handler for creating records.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{
    Error,
    auth::Actor,
    transaction::{FullRecordView, SQLiteTransactionStore, TransactionPayload, TransactionStore},
};

/// A route handler for creating a record, responds with 201 and the stored
/// record.
pub async fn create_transaction_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let result = body
        .map_err(Error::from)
        .and_then(|Json(body)| TransactionPayload::from_json(body).map_err(Error::from))
        .and_then(|payload| store.create(&actor, &payload));

    match result {
        Ok(transaction) => (
            StatusCode::CREATED,
            Json(FullRecordView::from(&transaction)),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}
