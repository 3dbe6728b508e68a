//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{
    Connection, OptionalExtension, Row, ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash, PartialOrd, Ord)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for UserID {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for UserID {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(UserID::new)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's email address, may be empty.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// Whether the user is an administrator that may manage every user's records.
    pub is_admin: bool,
}

/// The details needed to insert a user into the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's email address, may be empty.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// Whether the user is an administrator.
    pub is_admin: bool,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT NOT NULL DEFAULT '',
                password TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateUsername] if the username is already taken,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO user (username, email, password, is_admin)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, username, email, password, is_admin",
        )?
        .query_row(
            (
                &new_user.username,
                &new_user.email,
                new_user.password_hash.to_string(),
                new_user.is_admin,
            ),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, username, email, password, is_admin FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id)], map_user_row)
        .map_err(Error::from)
}

/// Get the user from the database with the login name `username`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has that username, or [Error::SqlError]
/// for other SQL errors.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, email, password, is_admin FROM user WHERE username = :username",
        )?
        .query_row(&[(":username", &username)], map_user_row)
        .map_err(Error::from)
}

/// Check whether `user_id` refers to a registered user.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn user_exists(user_id: UserID, connection: &Connection) -> Result<bool, Error> {
    let found: Option<i64> = connection
        .query_row(
            "SELECT 1 FROM user WHERE id = :id",
            &[(":id", &user_id)],
            |row| row.get(0),
        )
        .optional()?;

    Ok(found.is_some())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
#[cfg(test)]
pub fn count_users(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(3)?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        is_admin: row.get(4)?,
    })
}
