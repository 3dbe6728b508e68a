//! Route handler for deleting records.

use axum::{
    Extension,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    auth::Actor,
    database_id::TransactionId,
    transaction::{SQLiteTransactionStore, TransactionStore, get_endpoint::record_id},
};

/// A route handler for deleting a record, responds with 204 on success.
///
/// Responds with 403 if the record exists but belongs to another user and the
/// actor is not an administrator.
pub async fn delete_transaction_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Response {
    match record_id(path).and_then(|id| store.delete(&actor, id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{create_test_user, get_test_server, log_in, post_record},
    };

    #[tokio::test]
    async fn owner_deletes_record() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        let alice = log_in(&server, "alice").await;
        let created = post_record(&server, &alice, "Groceries", "2024-01-01").await;
        let path = format_endpoint(endpoints::EXPENSE, created.id);

        server
            .delete(&path)
            .add_cookie(alice.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&path)
            .add_cookie(alice)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stranger_is_denied() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        create_test_user(&state, "bob", false);
        let alice = log_in(&server, "alice").await;
        let bob = log_in(&server, "bob").await;
        let created = post_record(&server, &alice, "Groceries", "2024-01-01").await;
        let path = format_endpoint(endpoints::EXPENSE, created.id);

        let response = server.delete(&path).add_cookie(bob).await;

        response.assert_status(StatusCode::FORBIDDEN);
        server
            .get(&path)
            .add_cookie(alice)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn admin_deletes_any_record() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        create_test_user(&state, "root", true);
        let alice = log_in(&server, "alice").await;
        let root = log_in(&server, "root").await;
        let created = post_record(&server, &alice, "Groceries", "2024-01-01").await;

        server
            .delete(&format_endpoint(endpoints::EXPENSE, created.id))
            .add_cookie(root)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        let alice = log_in(&server, "alice").await;

        server
            .delete(&format_endpoint(endpoints::EXPENSE, 42))
            .add_cookie(alice)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
