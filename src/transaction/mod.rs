//! Income and expense records.
//!
//! This module contains everything related to records:
//! - The `Transaction` model and the database functions that store it
//! - Tax derivation, access policy and payload validation
//! - The store that ties them together for an acting user
//! - Route handlers for the record API

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod get_endpoint;
mod list_endpoint;
pub mod policy;
mod store;
pub mod tax;
pub mod validation;
mod view;

pub use self::core::{Transaction, TransactionFields, TransactionKind, create_transaction_table};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use edit_endpoint::{patch_transaction_endpoint, put_transaction_endpoint};
pub use get_endpoint::get_transaction_endpoint;
pub use list_endpoint::list_transactions_endpoint;
pub use store::{SQLiteTransactionStore, TransactionStore};
pub use tax::TaxKind;
pub use validation::{TransactionPayload, UpdateMode};
pub use view::{FullRecordView, SummaryRecordView};
