//! Defines the app level error type and its conversion to JSON responses.

use std::{collections::BTreeMap, fmt::Display};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// One or more fields in a request were malformed or not allowed.
    ///
    /// The client can fix these by correcting the request, they are never
    /// retried by the server.
    #[error("invalid request: {0}")]
    Validation(ValidationErrors),

    /// The user is authenticated and the target exists, but the user is not
    /// allowed to perform the operation on it.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The requested resource was not found.
    ///
    /// Records outside of a user's visibility scope also produce this error so
    /// that users cannot probe for records owned by other users.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The user provided an invalid combination of username and password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The request did not carry a valid, unexpired auth cookie.
    #[error("authentication credentials were not provided or have expired")]
    Unauthenticated,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The username used to register a user is already in use.
    #[error("the username is already taken")]
    DuplicateUsername,

    /// The request body could not be decoded as the expected JSON document.
    #[error("could not parse the request body: {0}")]
    InvalidJson(String),

    /// The auth cookie could not be created or read.
    #[error("could not process the auth cookie: {0}")]
    CookieError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidJson(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            Error::PermissionDenied(detail) => detail_response(StatusCode::FORBIDDEN, &detail),
            Error::NotFound => detail_response(StatusCode::NOT_FOUND, "Not found."),
            Error::InvalidCredentials => detail_response(
                StatusCode::UNAUTHORIZED,
                "No active account found with the given credentials.",
            ),
            Error::Unauthenticated => detail_response(
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            ),
            Error::TooWeak(feedback) => (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrors::single("password", &feedback)),
            )
                .into_response(),
            Error::DuplicateUsername => (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrors::single(
                    "username",
                    "A user with that username already exists.",
                )),
            )
                .into_response(),
            Error::InvalidJson(detail) => detail_response(StatusCode::BAD_REQUEST, &detail),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                detail_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred, check the server logs for more details.",
                )
            }
        }
    }
}

fn detail_response(status_code: StatusCode, detail: &str) -> Response {
    (status_code, Json(json!({ "detail": detail }))).into_response()
}

/// Field-scoped validation messages, keyed by the name of the offending field.
///
/// Every violation found in a request is collected so that the client can fix
/// them all at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// Create an empty set of validation errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set containing exactly one message for `field`.
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record `message` against `field`.
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.to_owned());
    }

    /// Move all messages from `other` into this set.
    pub fn extend(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Whether no violations have been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether at least one message has been recorded for `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The messages recorded for `field`, if any.
    pub fn messages(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Return `value` if no violations were recorded, otherwise the errors.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;

        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }

        Ok(())
    }
}
