//! Defines functions for handling user authentication with cookies.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{UserID, token::Token},
};

/// The name of the cookie holding the encrypted [Token].
pub(crate) const COOKIE_TOKEN: &str = "auth_token";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(5);

/// Add an auth cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// Sets the initial expiry of the cookie to `duration` from the current time.
///
/// # Errors
///
/// Returns a [Error::CookieError] if the token cannot be serialized.
pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let expires_at = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or_else(|| Error::CookieError(format!("cannot extend expiry by {duration}")))?;

    set_token(
        jar,
        Token {
            user_id,
            expires_at,
        },
    )
}

fn set_token(jar: PrivateCookieJar, token: Token) -> Result<PrivateCookieJar, Error> {
    let value =
        serde_json::to_string(&token).map_err(|error| Error::CookieError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, value))
            .expires(token.expires_at)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

/// Read the token from the auth cookie.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the cookie is missing, cannot be
/// decoded, or has expired.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::Unauthenticated)?;
    let token: Token =
        serde_json::from_str(cookie.value_trimmed()).map_err(|_| Error::Unauthenticated)?;

    if token.is_expired(OffsetDateTime::now_utc()) {
        return Err(Error::Unauthenticated);
    }

    Ok(token)
}

/// Set the expiry of the auth cookie in `jar` to the latest of UTC now
/// plus `duration` and the cookie's current expiry.
///
/// # Errors
///
/// The cookie jar is not modified if an error is returned.
///
/// Returns:
/// - [Error::Unauthenticated] if the auth cookie is missing or invalid.
/// - [Error::CookieError] if extending the expiry would overflow the date time.
pub(crate) fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = get_token_from_cookies(&jar)?;
    let new_expiry = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or_else(|| Error::CookieError(format!("cannot extend expiry by {duration}")))?;

    if new_expiry <= token.expires_at {
        return Ok(jar);
    }

    set_token(
        jar,
        Token {
            expires_at: new_expiry,
            ..token
        },
    )
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}
