//! Derives the calculated tax and total of a record from its amount and tax
//! specification.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How the tax input of a record is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxKind {
    /// A fixed currency amount applied regardless of the base amount.
    #[default]
    Flat,
    /// A proportion of the base amount, given in percent.
    Percentage,
}

impl TaxKind {
    /// The name stored in the database and used over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxKind::Flat => "flat",
            TaxKind::Percentage => "percentage",
        }
    }
}

impl Display for TaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown tax kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tax kind {0:?}")]
pub struct UnknownTaxKind(pub String);

impl FromStr for TaxKind {
    type Err = UnknownTaxKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(TaxKind::Flat),
            "percentage" => Ok(TaxKind::Percentage),
            other => Err(UnknownTaxKind(other.to_owned())),
        }
    }
}

impl ToSql for TaxKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaxKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// The server-derived part of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxBreakdown {
    /// The tax in currency units, rounded to cents.
    pub calculated_tax: Decimal,
    /// The amount plus the calculated tax, rounded to cents.
    pub total: Decimal,
}

/// Round `value` to two fractional digits, rounding halves away from zero.
///
/// The result always carries exactly two fractional digits so that `15` and
/// `15.00` are stored and displayed identically.
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Compute the calculated tax and total for `amount` with the tax input `tax`
/// interpreted according to `kind`.
///
/// Inputs are expected to be validated already: `amount` positive and `tax`
/// non-negative.
pub fn compute_tax(amount: Decimal, tax: Decimal, kind: TaxKind) -> TaxBreakdown {
    let calculated_tax = match kind {
        TaxKind::Flat => round_currency(tax),
        TaxKind::Percentage => round_currency(amount * tax / Decimal::ONE_HUNDRED),
    };

    TaxBreakdown {
        calculated_tax,
        total: round_currency(amount + calculated_tax),
    }
}
