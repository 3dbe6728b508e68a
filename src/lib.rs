//! Expense Ledger is a web service for recording income and expenses.
//!
//! This library provides a JSON REST API where each user manages their own
//! records. Administrators may see and manage the records of every user.
//! Tax and totals are derived by the server and can never be set directly.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth;
mod database_id;
mod db;
mod endpoints;
mod error;
mod logging;
mod routing;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppState, create_cookie_key};
pub use auth::{
    Actor, NewUser, PasswordHash, Privilege, User, UserID, ValidatedPassword, create_user,
    get_user_by_username,
};
pub use database_id::{DatabaseId, TransactionId};
pub use db::initialize as initialize_db;
pub use error::{Error, ValidationErrors};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use transaction::{
    FullRecordView, SQLiteTransactionStore, SummaryRecordView, TaxKind, Transaction,
    TransactionKind, TransactionPayload, TransactionStore, UpdateMode,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("Failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
