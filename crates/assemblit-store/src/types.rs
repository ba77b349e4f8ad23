// crates/assemblit-store/src/types.rs
// ============================================================================
// Module: Type Mapper
// Description: Logical column kinds and their sqlite affinity names.
// Purpose: Map between sample kinds, logical kinds, and storage types.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Six logical kinds cover every column the layer writes. Booleans have no
//! kind of their own and are stored with text affinity. The mapping is total
//! in the storage direction; probing an unknown sample kind fails with
//! [`StoreError::UnsupportedType`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::PrimitiveDateTime;

use crate::error::StoreError;
use crate::value::DATETIME_FORMAT;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Logical column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    /// Raw bytes.
    Blob,
    /// Signed integers.
    Integer,
    /// Floating point and complex magnitudes.
    Real,
    /// Strings, booleans, and objects.
    Text,
    /// Second-precision timestamps.
    Datetime,
    /// Elapsed time in seconds.
    Duration,
}

/// Storage affinity name emitted in table definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageAffinity {
    /// `BLOB`
    Blob,
    /// `INTEGER`
    Integer,
    /// `FLOAT`
    Float,
    /// `TEXT`
    Text,
    /// `DATETIME`
    Datetime,
    /// `TIMEDELTA`
    Timedelta,
}

impl StorageAffinity {
    /// Returns the type name used in DDL.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Blob => "BLOB",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Datetime => "DATETIME",
            Self::Timedelta => "TIMEDELTA",
        }
    }
}

impl fmt::Display for StorageAffinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl LogicalType {
    /// Returns the storage affinity for this kind.
    #[must_use]
    pub const fn to_storage_type(self) -> StorageAffinity {
        match self {
            Self::Blob => StorageAffinity::Blob,
            Self::Integer => StorageAffinity::Integer,
            Self::Real => StorageAffinity::Float,
            Self::Text => StorageAffinity::Text,
            Self::Datetime => StorageAffinity::Datetime,
            Self::Duration => StorageAffinity::Timedelta,
        }
    }

    /// Maps a sample kind to its logical kind.
    ///
    /// Accepts single-character array-protocol kind codes (`V`, `i`, `u`,
    /// `f`, `c`, `b`, `O`, `S`, `U`, `M`, `m`) and the descriptive names
    /// used by field descriptors (`bool`, `int`, `float`, `str`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] for any other kind.
    pub fn from_probe(kind: &str) -> Result<Self, StoreError> {
        let logical = match kind.trim() {
            "V" | "blob" | "bytes" => Self::Blob,
            "i" | "u" | "int" | "integer" => Self::Integer,
            "f" | "c" | "float" | "real" => Self::Real,
            "b" | "O" | "S" | "U" | "bool" | "str" | "string" | "text" => Self::Text,
            "M" | "datetime" => Self::Datetime,
            "m" | "timedelta" | "duration" => Self::Duration,
            _ => {
                return Err(StoreError::UnsupportedType {
                    kind: kind.to_string(),
                });
            }
        };
        Ok(logical)
    }
}

// ============================================================================
// SECTION: Inference
// ============================================================================

/// Classifies a textual sample.
///
/// Integers and reals must parse fully, datetimes must use
/// `YYYY-MM-DD HH:MM:SS`. Everything else, boolean literals included, is text.
#[must_use]
pub fn infer_from_text(sample: &str) -> LogicalType {
    let trimmed = sample.trim();
    if trimmed.parse::<i64>().is_ok() {
        return LogicalType::Integer;
    }
    if trimmed.chars().any(|ch| ch.is_ascii_digit()) && trimmed.parse::<f64>().is_ok() {
        return LogicalType::Real;
    }
    if PrimitiveDateTime::parse(trimmed, DATETIME_FORMAT).is_ok() {
        return LogicalType::Datetime;
    }
    LogicalType::Text
}

/// Classifies one JSON cell; `None` for nulls, which carry no evidence.
#[must_use]
pub fn infer_from_json(cell: &Value) -> Option<LogicalType> {
    match cell {
        Value::Null => None,
        Value::Number(number) if number.is_i64() || number.is_u64() => {
            Some(LogicalType::Integer)
        }
        Value::Number(_) => Some(LogicalType::Real),
        Value::String(text) => Some(infer_from_text(text)),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => Some(LogicalType::Text),
    }
}

/// Widens per-cell kinds into one column kind.
///
/// Integer and real widen to real; any other disagreement widens to text. An
/// all-null column is text.
pub fn infer_column<I>(kinds: I) -> LogicalType
where
    I: IntoIterator<Item = Option<LogicalType>>,
{
    let mut current: Option<LogicalType> = None;
    for kind in kinds.into_iter().flatten() {
        current = Some(match current {
            None => kind,
            Some(seen) if seen == kind => seen,
            Some(LogicalType::Integer | LogicalType::Real)
                if matches!(kind, LogicalType::Integer | LogicalType::Real) =>
            {
                LogicalType::Real
            }
            Some(_) => LogicalType::Text,
        });
    }
    current.unwrap_or(LogicalType::Text)
}
