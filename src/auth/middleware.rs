//! Authentication middleware that validates the auth cookie, resolves the acting user, and extends sessions.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        Actor,
        cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
        get_user_by_id,
    },
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection for looking up the acting user.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid auth cookie.
///
/// The [Actor] for the logged in user is placed into the request extensions
/// and the request is executed normally, otherwise a 401 response is returned.
/// The user is loaded on every request so that privilege changes and deleted
/// users take effect immediately.
///
/// **Note**: Route handlers can use the function argument `Extension(actor): Extension<Actor>` to receive the actor.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}");
            return Error::Unauthenticated.into_response();
        }
    };

    let actor = match resolve_actor(&jar, &state) {
        Ok(actor) => actor,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(actor);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(jar.clone(), state.cookie_duration) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

fn resolve_actor(jar: &PrivateCookieJar, state: &AuthState) -> Result<Actor, Error> {
    let token = get_token_from_cookies(jar)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    match get_user_by_id(token.user_id, &connection) {
        Ok(user) => Ok(Actor::from(&user)),
        Err(Error::NotFound) => {
            tracing::warn!(
                "Auth cookie refers to user {} who no longer exists",
                token.user_id
            );
            Err(Error::Unauthenticated)
        }
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod auth_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Router,
        extract::{Path, State},
        http::StatusCode,
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use sha2::Digest;
    use time::Duration;

    use crate::{
        Error,
        auth::{
            Actor, AuthState, NewUser, PasswordHash, UserID, auth_guard,
            cookie::{COOKIE_TOKEN, set_auth_cookie},
            create_user,
        },
        db::initialize,
    };

    async fn whoami(Extension(actor): Extension<Actor>) -> String {
        format!("{}:{}", actor.user_id, actor.is_privileged())
    }

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        Path(user_id): Path<i64>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(jar, UserID::new(user_id), state.cookie_duration)
    }

    const TEST_LOG_IN_ROUTE_PATH: &str = "/log_in/{user_id}";
    const TEST_PROTECTED_ROUTE: &str = "/protected";

    fn get_test_server(is_admin: bool) -> (TestServer, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user(
            NewUser {
                username: "alice".to_owned(),
                email: String::new(),
                password_hash: PasswordHash::new_unchecked("hash"),
                is_admin,
            },
            &connection,
        )
        .unwrap();

        let hash = sha2::Sha512::digest("nafstenoas");
        let state = AuthState {
            cookie_key: Key::from(&hash),
            cookie_duration: Duration::minutes(5),
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(TEST_LOG_IN_ROUTE_PATH, post(stub_log_in_route))
            .with_state(state);

        (TestServer::new(app), user.id)
    }

    #[tokio::test]
    async fn rejects_request_without_cookie() {
        let (server, _) = get_test_server(false);

        server
            .get(TEST_PROTECTED_ROUTE)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inserts_actor_for_valid_cookie() {
        let (server, user_id) = get_test_server(true);
        let auth_cookie = server
            .post(&format!("/log_in/{user_id}"))
            .await
            .cookie(COOKIE_TOKEN);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(auth_cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), format!("{user_id}:true"));
    }

    #[tokio::test]
    async fn rejects_cookie_for_unknown_user() {
        let (server, _) = get_test_server(false);
        let auth_cookie = server.post("/log_in/999").await.cookie(COOKIE_TOKEN);

        server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(auth_cookie)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn extends_cookie_on_success() {
        let (server, user_id) = get_test_server(false);
        let auth_cookie = server
            .post(&format!("/log_in/{user_id}"))
            .await
            .cookie(COOKIE_TOKEN);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(auth_cookie)
            .await;

        response.assert_status_ok();
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
    }
}
