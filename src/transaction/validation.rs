//! Checks an incoming record payload before it reaches the database.
//!
//! All violations in a payload are collected and reported together, keyed by
//! the offending field.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    auth::UserID,
    error::ValidationErrors,
    transaction::{TaxKind, Transaction, TransactionFields, TransactionKind},
};

/// The longest title a record may have, in characters.
pub const MAX_TITLE_LENGTH: usize = 200;
/// The most digits a stored decimal may have.
pub const MAX_DIGITS: u32 = 10;
/// The most fractional digits a stored decimal may have.
pub const MAX_DECIMAL_PLACES: u32 = 2;

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const CALCULATED: &str = "This field is calculated automatically and cannot be set directly.";

/// The raw JSON body of a create or update request.
///
/// Fields are kept as JSON values so that a wrongly typed field produces a
/// message on that field rather than rejecting the whole body. `Some(Null)`
/// means the client sent an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransactionPayload {
    /// The requested owner.
    #[serde(deserialize_with = "present")]
    pub user: Option<Value>,
    /// The record title.
    #[serde(deserialize_with = "present")]
    pub title: Option<Value>,
    /// Optional free text, `null` clears it.
    #[serde(deserialize_with = "present")]
    pub description: Option<Value>,
    /// The base amount.
    #[serde(deserialize_with = "present")]
    pub amount: Option<Value>,
    /// `credit` or `debit`.
    #[serde(deserialize_with = "present")]
    pub transaction_type: Option<Value>,
    /// The tax input.
    #[serde(deserialize_with = "present")]
    pub tax: Option<Value>,
    /// `flat` or `percentage`.
    #[serde(deserialize_with = "present")]
    pub tax_type: Option<Value>,
    /// The date as `YYYY-MM-DD`.
    #[serde(deserialize_with = "present")]
    pub date: Option<Value>,
    /// Derived field, rejected whenever present.
    #[serde(deserialize_with = "present")]
    pub total: Option<Value>,
    /// Derived field, rejected whenever present.
    #[serde(deserialize_with = "present")]
    pub total_amount: Option<Value>,
    /// Derived field, rejected whenever present.
    #[serde(deserialize_with = "present")]
    pub tax_amount_calculated: Option<Value>,
    /// Derived field, rejected whenever present.
    #[serde(deserialize_with = "present")]
    pub calculated_tax: Option<Value>,
}

impl TransactionPayload {
    /// Read a payload from a JSON request body, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns a `non_field_errors` violation for any other JSON value.
    pub fn from_json(value: Value) -> Result<Self, ValidationErrors> {
        let kind = match &value {
            Value::Object(_) => {
                return serde_json::from_value(value).map_err(|error| {
                    ValidationErrors::single("non_field_errors", &error.to_string())
                });
            }
            Value::Array(_) => "list",
            Value::String(_) => "str",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Null => "null",
        };

        Err(ValidationErrors::single(
            "non_field_errors",
            &format!("Invalid data. Expected a dictionary, but got {kind}."),
        ))
    }
}

// Keeps an explicit `null` as `Some(Value::Null)`, absent fields fall back to `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// How an update treats fields missing from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// PUT: title, amount, transaction type and date must be sent, optional
    /// fields that are left out keep their stored values.
    Full,
    /// PATCH: every field is optional.
    Partial,
}

/// The validated changes of an update, `None` meaning "keep the stored value".
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct TransactionChanges {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub amount: Option<Decimal>,
    pub kind: Option<TransactionKind>,
    pub tax: Option<Decimal>,
    pub tax_kind: Option<TaxKind>,
    pub date: Option<Date>,
}

impl TransactionChanges {
    /// The fields of `current` with these changes applied.
    pub fn apply_to(self, current: &Transaction) -> TransactionFields {
        let current = TransactionFields::from(current);

        TransactionFields {
            title: self.title.unwrap_or(current.title),
            description: self.description.unwrap_or(current.description),
            amount: self.amount.unwrap_or(current.amount),
            kind: self.kind.unwrap_or(current.kind),
            tax: self.tax.unwrap_or(current.tax),
            tax_kind: self.tax_kind.unwrap_or(current.tax_kind),
            date: self.date.unwrap_or(current.date),
        }
    }
}

/// Validate the payload of a create request.
///
/// Title, amount, transaction type and date are required. Tax defaults to
/// zero and the tax type to [TaxKind::Flat].
///
/// # Errors
///
/// Returns every violation found, keyed by field.
pub fn validate_new(payload: &TransactionPayload) -> Result<TransactionFields, ValidationErrors> {
    let changes = validate_changes(payload, UpdateMode::Full)?;

    match changes {
        TransactionChanges {
            title: Some(title),
            description,
            amount: Some(amount),
            kind: Some(kind),
            tax,
            tax_kind,
            date: Some(date),
        } => Ok(TransactionFields {
            title,
            description: description.flatten(),
            amount,
            kind,
            tax: tax.unwrap_or(Decimal::new(0, MAX_DECIMAL_PLACES)),
            tax_kind: tax_kind.unwrap_or_default(),
            date,
        }),
        // Full mode reports missing required fields as errors above.
        _ => Err(ValidationErrors::single("non_field_errors", REQUIRED)),
    }
}

/// Validate the payload of an update request.
///
/// # Errors
///
/// Returns every violation found, keyed by field.
pub fn validate_changes(
    payload: &TransactionPayload,
    mode: UpdateMode,
) -> Result<TransactionChanges, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    reject_derived_fields(payload, &mut errors);

    let required = mode == UpdateMode::Full;
    let changes = TransactionChanges {
        title: check(
            "title",
            payload.title.as_ref(),
            required,
            parse_title,
            &mut errors,
        ),
        description: payload
            .description
            .as_ref()
            .and_then(|value| record("description", parse_description(value), &mut errors)),
        amount: check(
            "amount",
            payload.amount.as_ref(),
            required,
            parse_amount,
            &mut errors,
        ),
        kind: check(
            "transaction_type",
            payload.transaction_type.as_ref(),
            required,
            parse_transaction_kind,
            &mut errors,
        ),
        tax: check("tax", payload.tax.as_ref(), false, parse_tax, &mut errors),
        tax_kind: check(
            "tax_type",
            payload.tax_type.as_ref(),
            false,
            parse_tax_kind,
            &mut errors,
        ),
        date: check(
            "date",
            payload.date.as_ref(),
            required,
            parse_date,
            &mut errors,
        ),
    };

    if !errors.is_empty() {
        tracing::info!("Rejected record payload: {errors}");
    }

    errors.into_result(changes)
}

/// Parse the owner requested by the payload, if any.
///
/// An explicit `null` is treated the same as leaving the field out.
///
/// # Errors
///
/// Returns a violation on `user` if the value is not an integer ID.
pub fn requested_owner(payload: &TransactionPayload) -> Result<Option<UserID>, ValidationErrors> {
    match &payload.user {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_i64().map(|id| Some(UserID::new(id))).ok_or_else(
            || ValidationErrors::single("user", "Incorrect type. Expected pk value."),
        ),
        Some(Value::String(text)) => text
            .trim()
            .parse()
            .map(|id| Some(UserID::new(id)))
            .map_err(|_| ValidationErrors::single("user", "Incorrect type. Expected pk value.")),
        Some(_) => Err(ValidationErrors::single(
            "user",
            "Incorrect type. Expected pk value.",
        )),
    }
}

/// Combine two fallible steps, merging their validation errors.
///
/// Non-validation errors take precedence since they are not the client's fault.
pub fn combine<A, B>(a: Result<A, Error>, b: Result<B, Error>) -> Result<(A, B), Error> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(Error::Validation(mut a)), Err(Error::Validation(b))) => {
            a.extend(b);
            Err(Error::Validation(a))
        }
        (Err(error @ Error::Validation(_)), Err(other)) => {
            tracing::debug!("Discarding {error} in favour of {other}");
            Err(other)
        }
        (Err(error), _) | (_, Err(error)) => Err(error),
    }
}

fn reject_derived_fields(payload: &TransactionPayload, errors: &mut ValidationErrors) {
    let derived = [
        ("total", &payload.total),
        ("total_amount", &payload.total_amount),
        ("tax_amount_calculated", &payload.tax_amount_calculated),
        ("calculated_tax", &payload.calculated_tax),
    ];

    for (field, value) in derived {
        if value.is_some() {
            errors.add(field, CALCULATED);
        }
    }
}

fn check<T>(
    field: &str,
    value: Option<&Value>,
    required: bool,
    parse: fn(&Value) -> Result<T, Vec<&'static str>>,
    errors: &mut ValidationErrors,
) -> Option<T> {
    match value {
        None if required => {
            errors.add(field, REQUIRED);
            None
        }
        None => None,
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            None
        }
        Some(value) => record(field, parse(value), errors),
    }
}

fn record<T>(
    field: &str,
    result: Result<T, Vec<&'static str>>,
    errors: &mut ValidationErrors,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(messages) => {
            for message in messages {
                errors.add(field, message);
            }
            None
        }
    }
}

fn parse_title(value: &Value) -> Result<String, Vec<&'static str>> {
    let Value::String(text) = value else {
        return Err(vec!["Not a valid string."]);
    };
    let title = text.trim();

    if title.is_empty() {
        Err(vec!["This field may not be blank."])
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        Err(vec!["Ensure this field has no more than 200 characters."])
    } else {
        Ok(title.to_owned())
    }
}

fn parse_description(value: &Value) -> Result<Option<String>, Vec<&'static str>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.trim().to_owned())),
        _ => Err(vec!["Not a valid string."]),
    }
}

fn parse_decimal(value: &Value) -> Result<Decimal, Vec<&'static str>> {
    const INVALID: &str = "A valid number is required.";

    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_owned(),
        _ => return Err(vec![INVALID]),
    };

    if text.contains('_') {
        return Err(vec![INVALID]);
    }

    let decimal = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| vec![INVALID])?
        .normalize();

    let (whole_digits, decimal_places) =
        written_digits(&text).unwrap_or_else(|| parsed_digits(&decimal));

    let mut messages = Vec::new();
    if whole_digits + decimal_places > MAX_DIGITS {
        messages.push("Ensure that there are no more than 10 digits in total.");
    }
    if decimal_places > MAX_DECIMAL_PLACES {
        messages.push("Ensure that there are no more than 2 decimal places.");
    }
    if whole_digits > MAX_DIGITS - MAX_DECIMAL_PLACES {
        messages.push("Ensure that there are no more than 8 digits before the decimal point.");
    }

    if messages.is_empty() {
        Ok(decimal)
    } else {
        Err(messages)
    }
}

/// The significant whole and fractional digits of a plain decimal as written.
///
/// Counting the text rather than the parsed value keeps digits that the
/// parser rounds away. Returns `None` for scientific notation.
fn written_digits(text: &str) -> Option<(u32, u32)> {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    if unsigned.contains(['e', 'E']) {
        return None;
    }

    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let whole = whole.trim_start_matches('0');
    let fraction = fraction.trim_end_matches('0');

    Some((whole.len() as u32, fraction.len() as u32))
}

fn parsed_digits(decimal: &Decimal) -> (u32, u32) {
    let digits = decimal.mantissa().unsigned_abs().to_string().len() as u32;
    let decimal_places = decimal.scale();

    (digits.saturating_sub(decimal_places), decimal_places)
}

fn parse_amount(value: &Value) -> Result<Decimal, Vec<&'static str>> {
    let amount = parse_decimal(value)?;

    if amount <= Decimal::ZERO {
        return Err(vec!["Amount must be a positive value."]);
    }

    let mut amount = amount;
    amount.rescale(MAX_DECIMAL_PLACES);
    Ok(amount)
}

fn parse_tax(value: &Value) -> Result<Decimal, Vec<&'static str>> {
    let tax = parse_decimal(value)?;

    if tax.is_sign_negative() && !tax.is_zero() {
        return Err(vec!["Tax must not be negative."]);
    }

    let mut tax = tax;
    tax.set_sign_positive(true);
    tax.rescale(MAX_DECIMAL_PLACES);
    Ok(tax)
}

fn parse_transaction_kind(value: &Value) -> Result<TransactionKind, Vec<&'static str>> {
    value
        .as_str()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| vec!["Transaction type must be 'credit' or 'debit'."])
}

fn parse_tax_kind(value: &Value) -> Result<TaxKind, Vec<&'static str>> {
    value
        .as_str()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| vec!["Tax type must be 'flat' or 'percentage'."])
}

fn parse_date(value: &Value) -> Result<Date, Vec<&'static str>> {
    value
        .as_str()
        .and_then(|text| Date::parse(text.trim(), DATE_FORMAT).ok())
        .ok_or_else(|| vec!["Date has wrong format. Use one of these formats instead: YYYY-MM-DD."])
}
