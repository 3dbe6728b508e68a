//! Route handler for listing the records visible to the acting user.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};

use crate::{
    auth::Actor,
    transaction::{SQLiteTransactionStore, SummaryRecordView, TransactionStore},
};

/// A route handler for listing records, most recent first.
///
/// Ordinary users only see their own records, administrators see everyone's.
pub async fn list_transactions_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(actor): Extension<Actor>,
) -> Response {
    match store.list(&actor) {
        Ok(transactions) => Json(
            transactions
                .iter()
                .map(SummaryRecordView::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        endpoints,
        test_utils::{create_test_user, get_test_server, log_in, post_record},
        transaction::SummaryRecordView,
    };

    #[tokio::test]
    async fn requires_authentication() {
        let (server, _) = get_test_server();

        server
            .get(endpoints::EXPENSES)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn lists_own_records_most_recent_first() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        create_test_user(&state, "bob", false);
        let alice = log_in(&server, "alice").await;
        let bob = log_in(&server, "bob").await;
        post_record(&server, &alice, "January", "2024-01-01").await;
        post_record(&server, &alice, "February", "2024-02-01").await;
        post_record(&server, &bob, "Bob's", "2024-03-01").await;

        let response = server.get(endpoints::EXPENSES).add_cookie(alice).await;

        response.assert_status_ok();
        let titles: Vec<String> = response
            .json::<Vec<SummaryRecordView>>()
            .into_iter()
            .map(|record| record.title)
            .collect();
        assert_eq!(titles, vec!["February", "January"]);
    }

    #[tokio::test]
    async fn admin_lists_every_record() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        create_test_user(&state, "root", true);
        let alice = log_in(&server, "alice").await;
        let root = log_in(&server, "root").await;
        post_record(&server, &alice, "January", "2024-01-01").await;
        post_record(&server, &root, "Admin's", "2024-01-02").await;

        let response = server.get(endpoints::EXPENSES).add_cookie(root).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Vec<SummaryRecordView>>().len(), 2);
    }

    #[tokio::test]
    async fn summary_fields_only() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);
        let alice = log_in(&server, "alice").await;
        post_record(&server, &alice, "January", "2024-01-01").await;

        let response = server.get(endpoints::EXPENSES).add_cookie(alice).await;

        let body = response.json::<serde_json::Value>();
        let record = &body[0];
        assert_eq!(record["title"], json!("January"));
        assert_eq!(record["amount"], json!("100.00"));
        assert_eq!(record["total"], json!("115.00"));
        assert!(record.get("tax").is_none());
        assert!(record.get("user").is_none());
    }
}
