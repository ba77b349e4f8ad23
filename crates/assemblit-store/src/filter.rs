// crates/assemblit-store/src/filter.rs
// ============================================================================
// Module: Filters and Rows
// Description: Predicate, row, and assignment values passed to the connection.
// Purpose: Render WHERE clauses with bound parameters.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`Filter`] names one column (or an ordered set of columns) and a scalar
//! or set value. Scalar values render as equality, sets render as `IN`.
//! Composite filters compare a row value, `("a", "b") = (?, ?)`, and need one
//! value per column. Filters are built per call and never persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::StoreError;
use crate::sql::checked_identifier;
use crate::sql::placeholders;
use crate::value::Scalar;

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Filter value: one scalar or an ordered set.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Equality against one value.
    Scalar(Scalar),
    /// Membership in a set (or row-value equality for composite filters).
    Set(Vec<Scalar>),
}

/// Predicate over one or more columns.
///
/// # Invariants
/// - `columns` is non-empty.
/// - Composite filters carry a set value with one entry per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Filtered columns.
    columns: Vec<String>,
    /// Filter value.
    value: FilterValue,
}

/// Rendered WHERE fragment and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFilter {
    /// SQL fragment without the `WHERE` keyword.
    pub clause: String,
    /// Parameters in placeholder order.
    pub params: Vec<Scalar>,
}

impl Filter {
    /// Equality filter on one column.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            columns: vec![column.into()],
            value: FilterValue::Scalar(value.into()),
        }
    }

    /// Membership filter on one column.
    #[must_use]
    pub fn any_of(column: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            columns: vec![column.into()],
            value: FilterValue::Set(values),
        }
    }

    /// Row-value equality filter over several columns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the column and value counts
    /// differ or no columns are given.
    pub fn composite(columns: Vec<String>, values: Vec<Scalar>) -> Result<Self, StoreError> {
        if columns.is_empty() || columns.len() != values.len() {
            return Err(StoreError::Invalid(format!(
                "composite filter needs one value per column ({} columns, {} values)",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            columns,
            value: FilterValue::Set(values),
        })
    }

    /// Returns the filtered columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the filter value.
    #[must_use]
    pub const fn value(&self) -> &FilterValue {
        &self.value
    }

    /// Returns true when the filter spans several columns.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    /// Normalizes a single-column scalar filter into a one-element set.
    #[must_use]
    pub fn into_set(self) -> Self {
        match self.value {
            FilterValue::Scalar(value) if self.columns.len() == 1 => Self {
                columns: self.columns,
                value: FilterValue::Set(vec![value]),
            },
            value => Self {
                columns: self.columns,
                value,
            },
        }
    }

    /// Renders the predicate; `negate` flips equality and membership.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for invalid identifiers or a composite
    /// filter whose value count does not match.
    pub fn render(&self, negate: bool) -> Result<RenderedFilter, StoreError> {
        let quoted: Vec<String> =
            self.columns.iter().map(|column| checked_identifier(column)).collect::<Result<_, _>>()?;
        if quoted.is_empty() {
            return Err(StoreError::Invalid("filter must name at least one column".to_string()));
        }
        if quoted.len() > 1 {
            let FilterValue::Set(values) = &self.value else {
                return Err(StoreError::Invalid(
                    "composite filter requires one value per column".to_string(),
                ));
            };
            if values.len() != quoted.len() {
                return Err(StoreError::Invalid(
                    "composite filter requires one value per column".to_string(),
                ));
            }
            let operator = if negate { "<>" } else { "=" };
            return Ok(RenderedFilter {
                clause: format!(
                    "({}) {operator} ({})",
                    quoted.join(", "),
                    placeholders(values.len())
                ),
                params: values.clone(),
            });
        }
        let column = &quoted[0];
        let rendered = match &self.value {
            FilterValue::Scalar(Scalar::Null) => RenderedFilter {
                clause: format!("{column} IS {}NULL", if negate { "NOT " } else { "" }),
                params: Vec::new(),
            },
            FilterValue::Scalar(value) => RenderedFilter {
                clause: format!("{column} {} ?", if negate { "<>" } else { "=" }),
                params: vec![value.clone()],
            },
            FilterValue::Set(values) if values.is_empty() => RenderedFilter {
                clause: if negate { "1 = 1" } else { "1 = 0" }.to_string(),
                params: Vec::new(),
            },
            FilterValue::Set(values) => RenderedFilter {
                clause: format!(
                    "{column} {}IN ({})",
                    if negate { "NOT " } else { "" },
                    placeholders(values.len())
                ),
                params: values.clone(),
            },
        };
        Ok(rendered)
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Ordered column names with matching values.
///
/// # Invariants
/// - `columns` and `values` have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column names.
    columns: Vec<String>,
    /// Values in column order.
    values: Vec<Scalar>,
}

impl Row {
    /// Creates a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the lengths differ.
    pub fn new(columns: Vec<String>, values: Vec<Scalar>) -> Result<Self, StoreError> {
        if columns.len() != values.len() {
            return Err(StoreError::Invalid(format!(
                "row has {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            columns,
            values,
        })
    }

    /// Creates a row from `(column, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Scalar>,
    {
        let (columns, values) =
            pairs.into_iter().map(|(column, value)| (column.into(), value.into())).unzip();
        Self {
            columns,
            values,
        }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the values.
    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    /// Returns the value stored under `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns.iter().position(|name| name == column).map(|index| &self.values[index])
    }

    /// Iterates `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// Single-column assignment for updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Column to set.
    pub column: String,
    /// New value.
    pub value: Scalar,
}

impl Assignment {
    /// Creates an assignment.
    #[must_use]
    pub fn new(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}
