//! Route handler for registering new (ordinary) users.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::{NewUser, PasswordHash, ValidatedPassword, create_user},
    error::ValidationErrors,
};

/// The longest username that may be registered.
pub const MAX_USERNAME_LENGTH: usize = 150;

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection the user is inserted into.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The JSON body of a registration request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterForm {
    /// The name the user will log in with.
    pub username: Option<String>,
    /// Optional contact address.
    pub email: Option<String>,
    /// The new password.
    pub password: Option<String>,
    /// Must equal `password`.
    #[serde(alias = "password2")]
    pub confirm_password: Option<String>,
}

/// The response body for a successful registration.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RegisteredUser {
    /// A human readable confirmation.
    pub message: String,
    /// The registered username.
    pub username: String,
    /// The registered email, empty if none was given.
    pub email: String,
}

#[derive(Debug)]
struct Registration {
    username: String,
    email: String,
    password: String,
}

fn validate_form(form: RegisterForm) -> Result<Registration, ValidationErrors> {
    const REQUIRED: &str = "This field is required.";
    let mut errors = ValidationErrors::new();

    let username = form.username.unwrap_or_default();
    let username = username.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if username.chars().count() > MAX_USERNAME_LENGTH {
        errors.add(
            "username",
            "Ensure this field has no more than 150 characters.",
        );
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    let email = form.email.unwrap_or_default().trim().to_owned();
    if !email.is_empty() && !EmailAddress::is_valid(&email) {
        errors.add("email", "Enter a valid email address.");
    }

    let password = match (form.password, form.confirm_password) {
        (None, None) => {
            errors.add("password", REQUIRED);
            errors.add("confirm_password", REQUIRED);
            String::new()
        }
        (None, Some(_)) => {
            errors.add("password", REQUIRED);
            String::new()
        }
        (Some(password), None) => {
            errors.add("confirm_password", REQUIRED);
            password
        }
        (Some(password), Some(confirm_password)) => {
            if password != confirm_password {
                errors.add("password", "Passwords do not match.");
            }
            password
        }
    };

    errors.into_result(Registration {
        username: username.to_owned(),
        email,
        password,
    })
}

/// Register a new ordinary user.
///
/// Responds with 201 and the new user's public details, or 400 with the
/// offending fields.
pub async fn register_user(
    State(state): State<RegistrationState>,
    payload: Result<Json<RegisterForm>, JsonRejection>,
) -> Response {
    match register(state, payload) {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(error) => error.into_response(),
    }
}

fn register(
    state: RegistrationState,
    payload: Result<Json<RegisterForm>, JsonRejection>,
) -> Result<RegisteredUser, Error> {
    let Json(form) = payload?;
    let registration = validate_form(form)?;

    let user_inputs: Vec<&str> = [registration.username.as_str(), registration.email.as_str()]
        .into_iter()
        .filter(|input| !input.is_empty())
        .collect();
    let validated_password = ValidatedPassword::new(&registration.password, &user_inputs)?;

    let password_hash = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)
        .inspect_err(|error| {
            tracing::error!("an error occurred while hashing a password: {error}")
        })?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = create_user(
        NewUser {
            username: registration.username,
            email: registration.email,
            password_hash,
            is_admin: false,
        },
        &connection,
    )?;

    tracing::info!("Registered user {} with ID {}", user.username, user.id);

    Ok(RegisteredUser {
        message: "User registered successfully.".to_owned(),
        username: user.username,
        email: user.email,
    })
}


#[cfg(test)]
mod register_user_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        auth::{count_users, get_user_by_username, register_user::RegisteredUser},
        endpoints,
        test_utils::get_test_server,
    };

    #[tokio::test]
    async fn register_user_succeeds() {
        let (server, state) = get_test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "turkeysgogobblegobble",
                "password2": "turkeysgogobblegobble",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(
            response.json::<RegisteredUser>(),
            RegisteredUser {
                message: "User registered successfully.".to_owned(),
                username: "alice".to_owned(),
                email: "alice@example.com".to_owned(),
            }
        );
        let connection = state.db_connection.lock().unwrap();
        let user = get_user_by_username("alice", &connection).unwrap();
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn register_user_fails_on_mismatched_passwords() {
        let (server, state) = get_test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "username": "alice",
                "password": "turkeysgogobblegobble",
                "confirm_password": "turkeysgogobble",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"password": ["Passwords do not match."]}));
        assert_eq!(count_users(&state.db_connection.lock().unwrap()), Ok(0));
    }

    #[tokio::test]
    async fn register_user_fails_on_weak_password() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({
                "username": "alice",
                "password": "password",
                "confirm_password": "password",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<serde_json::Value>();
        assert!(body["password"].is_array());
    }

    #[tokio::test]
    async fn register_user_fails_on_duplicate_username() {
        let (server, _) = get_test_server();
        let body = json!({
            "username": "alice",
            "password": "turkeysgogobblegobble",
            "confirm_password": "turkeysgogobblegobble",
        });
        server
            .post(endpoints::REGISTER)
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post(endpoints::REGISTER).json(&body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"username": ["A user with that username already exists."]}));
    }
}
