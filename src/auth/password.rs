//! Password strength validation and hashing.
//!
//! `ValidatedPassword` wraps a string that has passed the strength check, and
//! `PasswordHash` is the salted bcrypt hash stored for a user.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};
use zxcvbn::{Score, feedback::Feedback, zxcvbn};

use crate::Error;

/// A password that has been validated, but not yet hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Validate `raw_password` against a strength estimate.
    ///
    /// `user_inputs` should contain strings the password must not resemble, e.g.
    /// the username and email of the account.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] with feedback on how to choose a stronger
    /// password when the estimate is below a score of three.
    pub fn new(raw_password: &str, user_inputs: &[&str]) -> Result<Self, Error> {
        let password_analysis = zxcvbn(raw_password, user_inputs);

        match password_analysis.score() {
            Score::Three | Score::Four => Ok(Self(raw_password.to_owned())),
            _ => {
                let feedback = password_analysis
                    .feedback()
                    .map(Feedback::to_string)
                    .filter(|feedback| !feedback.is_empty())
                    .unwrap_or_else(|| "This password is too easy to guess.".to_owned());

                Err(Error::TooWeak(feedback))
            }
        }
    }

    /// Create a new `ValidatedPassword` without the strength check.
    ///
    /// The caller should ensure that `raw_password` is a secure password.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash a validated password with the specified `cost`.
    ///
    /// Pass in [PasswordHash::DEFAULT_COST] outside of tests.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap an existing hash, e.g. one loaded from the database.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
