#![allow(missing_docs)]

//! Helpers shared by the endpoint tests.

use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState,
    auth::{COOKIE_TOKEN, NewUser, PasswordHash, User, ValidatedPassword, create_user},
    build_router, endpoints,
    transaction::FullRecordView,
};

pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// Get a test server for the full router backed by an in-memory database.
pub(crate) fn get_test_server() -> (TestServer, AppState) {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    let state = AppState::new(connection, "foobar").expect("Could not create app state.");
    let server = TestServer::new(build_router(state.clone()));

    (server, state)
}

/// Insert a user whose password is [TEST_PASSWORD].
pub(crate) fn create_test_user(state: &AppState, username: &str, is_admin: bool) -> User {
    let password_hash = PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4)
        .expect("Could not hash password.");
    let connection = state.db_connection.lock().unwrap();

    create_user(
        NewUser {
            username: username.to_owned(),
            email: format!("{username}@example.com"),
            password_hash,
            is_admin,
        },
        &connection,
    )
    .expect("Could not create test user.")
}

/// Log in as `username` and return the auth cookie.
pub(crate) async fn log_in(server: &TestServer, username: &str) -> Cookie<'static> {
    let response = server
        .post(endpoints::LOG_IN)
        .json(&json!({"username": username, "password": TEST_PASSWORD}))
        .await;

    response.assert_status_ok();
    response.cookie(COOKIE_TOKEN)
}

/// Create a flat-taxed expense of 100.00 with 15.00 tax for the user of `cookie`.
pub(crate) async fn post_record(
    server: &TestServer,
    cookie: &Cookie<'static>,
    title: &str,
    date: &str,
) -> FullRecordView {
    let response = server
        .post(endpoints::EXPENSES)
        .add_cookie(cookie.clone())
        .json(&json!({
            "title": title,
            "amount": "100.00",
            "transaction_type": "debit",
            "tax": "15.00",
            "tax_type": "flat",
            "date": date,
        }))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}
