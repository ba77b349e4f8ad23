// crates/assemblit-store/src/value.rs
// ============================================================================
// Module: Scalar Values
// Description: Untyped scalar currency for filters, rows, and query results.
// Purpose: Bind values as parameters and coerce reads to requested types.
// Dependencies: rusqlite, serde_json, time
// ============================================================================

//! ## Overview
//! [`Scalar`] is what every filter, row, and query result carries. Writes bind
//! scalars as statement parameters; reads come back as the engine's native
//! values and are then coerced with [`ReturnType`]. Booleans are written as the
//! text `True`/`False` to match text affinity. Datetimes round-trip through the
//! `YYYY-MM-DD HH:MM:SS` text form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rusqlite::ToSql;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::Value as SqlValue;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::Duration;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::error::StoreError;
use crate::sql::escape_literal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Text form for stored datetimes.
pub const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// ============================================================================
// SECTION: Scalar
// ============================================================================

/// A single untyped value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// SQL `NULL`.
    Null,
    /// Boolean, stored as text.
    Bool(bool),
    /// 64-bit integer.
    Integer(i64),
    /// Double precision real.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Second-precision timestamp.
    Datetime(PrimitiveDateTime),
    /// Elapsed time.
    Duration(Duration),
    /// List or map stored as JSON text.
    Json(Value),
}

impl Scalar {
    /// Builds a text scalar.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Returns true for [`Scalar::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the inner text when this is a text scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the inner integer when this is an integer scalar.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Converts a JSON value without a type hint.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Real))
                .unwrap_or_else(|| Self::Text(number.to_string())),
            Value::String(text) => Self::Text(text),
            other @ (Value::Array(_) | Value::Object(_)) => Self::Json(other),
        }
    }

    /// Renders the scalar as JSON for output.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Integer(value) => Value::from(*value),
            Self::Real(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
            Self::Blob(bytes) => Value::from(bytes.clone()),
            Self::Datetime(value) => {
                Value::String(format_datetime(*value).unwrap_or_else(|_| value.to_string()))
            }
            Self::Duration(value) => Value::from(value.as_seconds_f64()),
            Self::Json(value) => value.clone(),
        }
    }

    /// Reads an engine value.
    #[must_use]
    pub fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(value) => Self::Integer(value),
            ValueRef::Real(value) => Self::Real(value),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Datetime(value) => match format_datetime(*value) {
                Ok(text) => f.write_str(&text),
                Err(_) => write!(f, "{value}"),
            },
            Self::Duration(value) => write!(f, "{}", value.as_seconds_f64()),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<PrimitiveDateTime> for Scalar {
    fn from(value: PrimitiveDateTime) -> Self {
        Self::Datetime(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Bool(true) => ToSqlOutput::Borrowed(ValueRef::Text(b"True")),
            Self::Bool(false) => ToSqlOutput::Borrowed(ValueRef::Text(b"False")),
            Self::Integer(value) => ToSqlOutput::Owned(SqlValue::Integer(*value)),
            Self::Real(value) => ToSqlOutput::Owned(SqlValue::Real(*value)),
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Self::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
            Self::Datetime(value) => {
                let text = format_datetime(*value)
                    .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
                ToSqlOutput::Owned(SqlValue::Text(text))
            }
            Self::Duration(value) => ToSqlOutput::Owned(SqlValue::Real(value.as_seconds_f64())),
            Self::Json(value) => ToSqlOutput::Owned(SqlValue::Text(value.to_string())),
        };
        Ok(output)
    }
}

// ============================================================================
// SECTION: Return Types
// ============================================================================

/// Coercion target for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// Text rendering of the stored value.
    #[default]
    Text,
    /// Signed integer.
    Integer,
    /// Real number.
    Real,
    /// Boolean parsed from `True`/`False` text or 0/1.
    Boolean,
    /// JSON list or map parsed from text.
    Json,
}

impl ReturnType {
    /// Returns the label used in coercion errors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "str",
            Self::Integer => "int",
            Self::Real => "float",
            Self::Boolean => "bool",
            Self::Json => "json",
        }
    }

    /// Coerces a stored value. `NULL` passes through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Coercion`] when the value cannot be converted.
    pub fn coerce(self, value: Scalar) -> Result<Scalar, StoreError> {
        if value.is_null() {
            return Ok(Scalar::Null);
        }
        let failure = |value: &Scalar| StoreError::Coercion {
            value: value.to_string(),
            target: self.label(),
        };
        match self {
            Self::Text => match value {
                Scalar::Blob(bytes) => String::from_utf8(bytes)
                    .map(Scalar::Text)
                    .map_err(|err| failure(&Scalar::Blob(err.into_bytes()))),
                other => Ok(Scalar::Text(other.to_string())),
            },
            Self::Integer => {
                let parsed = match &value {
                    Scalar::Integer(number) => Some(*number),
                    Scalar::Real(number) => number.to_string().parse::<i64>().ok(),
                    Scalar::Text(text) => text.trim().parse::<i64>().ok(),
                    Scalar::Bool(flag) => Some(i64::from(*flag)),
                    _ => None,
                };
                parsed.map(Scalar::Integer).ok_or_else(|| failure(&value))
            }
            Self::Real => {
                let parsed = match &value {
                    Scalar::Integer(number) => Some(integer_to_real(*number)),
                    Scalar::Real(number) => Some(*number),
                    Scalar::Text(text) => text.trim().parse::<f64>().ok(),
                    _ => None,
                };
                parsed.map(Scalar::Real).ok_or_else(|| failure(&value))
            }
            Self::Boolean => {
                let parsed = match &value {
                    Scalar::Bool(flag) => Some(*flag),
                    Scalar::Integer(0) => Some(false),
                    Scalar::Integer(1) => Some(true),
                    Scalar::Text(text) => parse_bool_literal(text),
                    _ => None,
                };
                parsed.map(Scalar::Bool).ok_or_else(|| failure(&value))
            }
            Self::Json => match &value {
                Scalar::Json(_) => Ok(value),
                Scalar::Text(text) => match serde_json::from_str::<Value>(text) {
                    Ok(parsed @ (Value::Array(_) | Value::Object(_))) => Ok(Scalar::Json(parsed)),
                    _ => Err(failure(&value)),
                },
                _ => Err(failure(&value)),
            },
        }
    }
}

// ============================================================================
// SECTION: Literals
// ============================================================================

/// Renders a scalar as a quoted literal for a `DEFAULT` clause.
///
/// Returns `None` for blobs and JSON, which have no literal form.
#[must_use]
pub fn render_literal(value: &Scalar) -> Option<String> {
    let body = match value {
        Scalar::Null => "NULL".to_string(),
        Scalar::Bool(true) => "TRUE".to_string(),
        Scalar::Bool(false) => "FALSE".to_string(),
        Scalar::Integer(number) => number.to_string(),
        Scalar::Real(number) => number.to_string(),
        Scalar::Text(text) => escape_literal(text),
        Scalar::Datetime(value) => format_datetime(*value).ok()?,
        Scalar::Duration(value) => value.as_seconds_f64().to_string(),
        Scalar::Blob(_) | Scalar::Json(_) => return None,
    };
    Some(format!("'{body}'"))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Formats a datetime as `YYYY-MM-DD HH:MM:SS`.
///
/// # Errors
///
/// Returns the formatter error for out-of-range components.
pub fn format_datetime(value: PrimitiveDateTime) -> Result<String, time::error::Format> {
    value.format(DATETIME_FORMAT)
}

/// Parses a `YYYY-MM-DD HH:MM:SS` datetime.
///
/// # Errors
///
/// Returns [`StoreError::Coercion`] when the text does not match.
pub fn parse_datetime(text: &str) -> Result<PrimitiveDateTime, StoreError> {
    PrimitiveDateTime::parse(text.trim(), DATETIME_FORMAT).map_err(|_| StoreError::Coercion {
        value: text.to_string(),
        target: "datetime",
    })
}

/// Returns the current UTC time without offset.
#[must_use]
pub fn now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Widens an integer to a real.
#[allow(clippy::cast_precision_loss, reason = "Integer columns widen to real on request.")]
const fn integer_to_real(value: i64) -> f64 {
    value as f64
}

/// Parses `True`/`False` style literals, case-insensitively.
fn parse_bool_literal(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn literals_follow_default_clause_rules() {
        assert_eq!(render_literal(&Scalar::Null).unwrap(), "'NULL'");
        assert_eq!(render_literal(&Scalar::Bool(true)).unwrap(), "'TRUE'");
        assert_eq!(render_literal(&Scalar::text("it's")).unwrap(), "'it''s'");
        assert_eq!(
            render_literal(&Scalar::Datetime(datetime!(2024-01-02 03:04:05))).unwrap(),
            "'2024-01-02 03:04:05'"
        );
        assert_eq!(render_literal(&Scalar::Duration(Duration::seconds(90))).unwrap(), "'90'");
        assert!(render_literal(&Scalar::Json(json!([1]))).is_none());
    }

    #[test]
    fn coercion_parses_text() {
        assert_eq!(ReturnType::Integer.coerce(Scalar::text("12")).unwrap(), Scalar::Integer(12));
        assert_eq!(ReturnType::Real.coerce(Scalar::Integer(2)).unwrap(), Scalar::Real(2.0));
        assert_eq!(ReturnType::Boolean.coerce(Scalar::text("False")).unwrap(), Scalar::Bool(false));
        assert_eq!(ReturnType::Text.coerce(Scalar::Integer(7)).unwrap(), Scalar::text("7"));
        assert_eq!(
            ReturnType::Json.coerce(Scalar::text("[\"a\",\"b\"]")).unwrap(),
            Scalar::Json(json!(["a", "b"]))
        );
        assert_eq!(ReturnType::Integer.coerce(Scalar::Null).unwrap(), Scalar::Null);
    }

    #[test]
    fn coercion_failures_name_target() {
        let err = ReturnType::Integer.coerce(Scalar::text("abc")).unwrap_err();
        assert_eq!(err.to_string(), "abc value cannot be converted to int");
        assert!(ReturnType::Integer.coerce(Scalar::Real(1.5)).is_err());
        assert!(ReturnType::Json.coerce(Scalar::text("3")).is_err());
    }

    #[test]
    fn json_values_map_to_scalars() {
        assert_eq!(Scalar::from_json(json!(3)), Scalar::Integer(3));
        assert_eq!(Scalar::from_json(json!("x")), Scalar::text("x"));
        assert_eq!(Scalar::from_json(json!({"a": 1})), Scalar::Json(json!({"a": 1})));
        assert_eq!(Scalar::from(None::<i64>), Scalar::Null);
    }
}
