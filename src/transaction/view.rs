//! The JSON shapes records are returned in.
//!
//! Single-record operations return a [FullRecordView], listings return
//! [SummaryRecordView]s. The caller picks the shape explicitly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use time::{Date, OffsetDateTime};

use crate::{
    database_id::TransactionId,
    transaction::{TaxKind, Transaction, TransactionKind},
};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Decimals are sent as strings with exactly two fractional digits.
fn currency<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:.2}"))
}

/// Every field of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullRecordView {
    /// The ID of the record.
    pub id: TransactionId,
    /// The ID of the owner.
    pub user: i64,
    /// The record title.
    pub title: String,
    /// Optional free text.
    pub description: Option<String>,
    /// The base amount.
    #[serde(serialize_with = "currency")]
    pub amount: Decimal,
    /// Income or expense.
    pub transaction_type: TransactionKind,
    /// The tax input.
    #[serde(serialize_with = "currency")]
    pub tax: Decimal,
    /// How the tax input is interpreted.
    pub tax_type: TaxKind,
    /// When the money moved.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// The derived tax.
    #[serde(serialize_with = "currency")]
    pub tax_amount_calculated: Decimal,
    /// The derived total.
    #[serde(serialize_with = "currency")]
    pub total: Decimal,
    /// When the record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the record was last written.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Transaction> for FullRecordView {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id,
            user: transaction.owner.as_i64(),
            title: transaction.title.clone(),
            description: transaction.description.clone(),
            amount: transaction.amount,
            transaction_type: transaction.kind,
            tax: transaction.tax,
            tax_type: transaction.tax_kind,
            date: transaction.date,
            tax_amount_calculated: transaction.calculated_tax,
            total: transaction.total,
            created_at: transaction.created_at,
            updated_at: transaction.updated_at,
        }
    }
}

/// The fields of a record shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecordView {
    /// The ID of the record.
    pub id: TransactionId,
    /// The record title.
    pub title: String,
    /// The base amount.
    #[serde(serialize_with = "currency")]
    pub amount: Decimal,
    /// Income or expense.
    pub transaction_type: TransactionKind,
    /// The derived total.
    #[serde(serialize_with = "currency")]
    pub total: Decimal,
    /// When the record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Transaction> for SummaryRecordView {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id,
            title: transaction.title.clone(),
            amount: transaction.amount,
            transaction_type: transaction.kind,
            total: transaction.total,
            created_at: transaction.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;
    use time::macros::{date, datetime};

    use crate::{
        auth::UserID,
        transaction::{
            TaxKind, Transaction, TransactionKind,
            view::{FullRecordView, SummaryRecordView},
        },
    };

    fn transaction() -> Transaction {
        Transaction {
            id: 4,
            owner: UserID::new(2),
            title: "Groceries".to_owned(),
            description: None,
            amount: dec!(100),
            kind: TransactionKind::Debit,
            tax: dec!(15.00),
            tax_kind: TaxKind::Flat,
            date: date!(2024 - 01 - 01),
            calculated_tax: dec!(15.00),
            total: dec!(115.00),
            created_at: datetime!(2024-01-02 03:04:05 UTC),
            updated_at: datetime!(2024-01-03 03:04:05 UTC),
        }
    }

    #[test]
    fn full_view_serializes_every_field() {
        let got = serde_json::to_value(FullRecordView::from(&transaction())).unwrap();

        assert_eq!(
            got,
            json!({
                "id": 4,
                "user": 2,
                "title": "Groceries",
                "description": null,
                "amount": "100.00",
                "transaction_type": "debit",
                "tax": "15.00",
                "tax_type": "flat",
                "date": "2024-01-01",
                "tax_amount_calculated": "15.00",
                "total": "115.00",
                "created_at": "2024-01-02T03:04:05Z",
                "updated_at": "2024-01-03T03:04:05Z",
            })
        );
    }

    #[test]
    fn summary_view_omits_detail_fields() {
        let got = serde_json::to_value(SummaryRecordView::from(&transaction())).unwrap();

        assert_eq!(
            got,
            json!({
                "id": 4,
                "title": "Groceries",
                "amount": "100.00",
                "transaction_type": "debit",
                "total": "115.00",
                "created_at": "2024-01-02T03:04:05Z",
            })
        );
    }
}
