//! Log-out route handler that invalidates the auth cookie.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::auth::invalidate_auth_cookie;

/// Invalidate the auth cookie.
///
/// Always succeeds, logging out without a session is a no-op.
pub async fn post_log_out(jar: PrivateCookieJar) -> Response {
    let jar = invalidate_auth_cookie(jar);

    (StatusCode::NO_CONTENT, jar).into_response()
}
