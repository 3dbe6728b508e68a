//! Route handler for fetching a single record.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    auth::Actor,
    database_id::TransactionId,
    transaction::{FullRecordView, SQLiteTransactionStore, TransactionStore},
};

/// Extract the record ID from the path, a malformed ID cannot name a record.
pub(super) fn record_id(path: Result<Path<TransactionId>, PathRejection>) -> Result<TransactionId, Error> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!("Invalid record ID in path: {rejection}");
        Error::NotFound
    })
}

/// A route handler for fetching one record.
///
/// Responds with 404 both when the record does not exist and when it belongs
/// to another user.
pub async fn get_transaction_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Response {
    match record_id(path).and_then(|id| store.get(&actor, id)) {
        Ok(transaction) => Json(FullRecordView::from(&transaction)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{create_test_user, get_test_server, log_in, post_record},
        transaction::FullRecordView,
    };

    #[tokio::test]
    async fn owner_gets_full_record() {
        let (server, state) = get_test_server();
        let alice_user = create_test_user(&state, "alice", false);
        let alice = log_in(&server, "alice").await;
        let created = post_record(&server, &alice, "Groceries", "2024-01-01").await;

        let response = server
            .get(&format_endpoint(endpoints::EXPENSE, created.id))
            .add_cookie(alice)
            .await;

        response.assert_status_ok();
        let got = response.json::<FullRecordView>();
        assert_eq!(got, created);
        assert_eq!(got.user, alice_user.id.as_i64());
    }

    #[tokio::test]
    async fn other_users_record_is_not_found() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        create_test_user(&state, "bob", false);
        let alice = log_in(&server, "alice").await;
        let bob = log_in(&server, "bob").await;
        let created = post_record(&server, &bob, "Bob's", "2024-01-01").await;

        let response = server
            .get(&format_endpoint(endpoints::EXPENSE, created.id))
            .add_cookie(alice)
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&serde_json::json!({"detail": "Not found."}));
    }

    #[tokio::test]
    async fn admin_gets_any_record() {
        let (server, state) = get_test_server();
        create_test_user(&state, "bob", false);
        create_test_user(&state, "root", true);
        let bob = log_in(&server, "bob").await;
        let root = log_in(&server, "root").await;
        let created = post_record(&server, &bob, "Bob's", "2024-01-01").await;

        server
            .get(&format_endpoint(endpoints::EXPENSE, created.id))
            .add_cookie(root)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        let alice = log_in(&server, "alice").await;

        server
            .get("/api/expenses/abc")
            .add_cookie(alice)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
