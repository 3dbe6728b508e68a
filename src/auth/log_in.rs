//! Route handler for log-in requests.
//! The cookie module handles the lower level token and cookie logic.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::{AuthState, User, get_user_by_username, set_auth_cookie},
};

/// The JSON body of a log-in request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogInData {
    /// The name the user registered with.
    pub username: String,
    /// Password entered during log-in.
    pub password: String,
}

/// The response body for a successful log-in.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggedInUser {
    /// The user's ID.
    pub id: i64,
    /// The user's login name.
    pub username: String,
    /// Whether the user may manage every user's records.
    pub is_admin: bool,
}

/// Handler for log-in requests via the POST method.
///
/// On success the encrypted auth cookie is set and the user's details are
/// returned.
///
/// # Errors
///
/// Responds with 401 if the username is unknown or the password is wrong, so
/// that clients cannot tell which of the two was incorrect.
pub async fn post_log_in(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    payload: Result<Json<LogInData>, JsonRejection>,
) -> Response {
    let result = payload
        .map_err(Error::from)
        .and_then(|Json(user_data)| verify_credentials(&state, &user_data))
        .and_then(|user| {
            let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;
            Ok((jar, user))
        });

    match result {
        Ok((jar, user)) => {
            tracing::info!("User {} logged in", user.id);

            (
                jar,
                Json(LoggedInUser {
                    id: user.id.as_i64(),
                    username: user.username,
                    is_admin: user.is_admin,
                }),
            )
                .into_response()
        }
        Err(error) => error.into_response(),
    }
}

fn verify_credentials(state: &AuthState, user_data: &LogInData) -> Result<User, Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_username(&user_data.username, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => {
                tracing::warn!("Log-in attempt for unknown user {}", user_data.username);
                return Err(Error::InvalidCredentials);
            }
            Err(error) => return Err(error),
        }
    };

    match user.password_hash.verify(&user_data.password) {
        Ok(true) => Ok(user),
        Ok(false) => {
            tracing::warn!("Incorrect password for user {}", user.id);
            Err(Error::InvalidCredentials)
        }
        Err(error) => {
            tracing::error!("Error verifying password: {error}");
            Err(Error::HashingError(error.to_string()))
        }
    }
}

#[cfg(test)]
mod log_in_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::{COOKIE_TOKEN, log_in::LoggedInUser},
        endpoints,
        test_utils::{TEST_PASSWORD, create_test_user, get_test_server},
    };

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let (server, state) = get_test_server();
        let user = create_test_user(&state, "alice", false);

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"username": "alice", "password": TEST_PASSWORD}))
            .await;

        response.assert_status_ok();
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
        assert_eq!(
            response.json::<LoggedInUser>(),
            LoggedInUser {
                id: user.id.as_i64(),
                username: "alice".to_owned(),
                is_admin: false,
            }
        );
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let (server, state) = get_test_server();
        create_test_user(&state, "alice", false);

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"username": "alice", "password": "wrongpassword"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_user() {
        let (server, _) = get_test_server();

        server
            .post(endpoints::LOG_IN)
            .json(&json!({"username": "nobody", "password": TEST_PASSWORD}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn log_in_fails_with_malformed_body() {
        let (server, _) = get_test_server();

        server
            .post(endpoints::LOG_IN)
            .json(&json!({"username": "alice"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
