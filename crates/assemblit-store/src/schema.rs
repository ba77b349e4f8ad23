// crates/assemblit-store/src/schema.rs
// ============================================================================
// Module: Schema Descriptor
// Description: Ordered column specifications and table-definition compilation.
// Purpose: Describe tables once and compile them to sqlite DDL fragments.
// Dependencies: serde_json, time
// ============================================================================

//! ## Overview
//! A [`Schema`] is a table name plus an ordered list of columns. It is built
//! once, validated at build time, and shared read-only afterwards. Primary
//! key columns are gathered into one composite `PRIMARY KEY(...)` clause
//! instead of per-column markers.
//!
//! Schemas come from three places: hand-written builders for the built-in
//! tables, field descriptor lists for user-defined settings, and inferred
//! column kinds for ingested datasets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Map;
use serde_json::Value;
use time::Duration;

use crate::conflict::ConflictPolicy;
use crate::error::StoreError;
use crate::sql::quote_identifier;
use crate::sql::validate_identifier;
use crate::types::LogicalType;
use crate::value::Scalar;
use crate::value::parse_datetime;
use crate::value::render_literal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Keys every field descriptor must carry.
pub const REQUIRED_FIELD_KEYS: [&str; 4] = ["type", "dtype", "parameter", "name"];

/// Widget type that requires a `kwargs` map.
const SLIDER_FIELD_TYPE: &str = "slider";

// ============================================================================
// SECTION: Column Specs
// ============================================================================

/// Specification of one column.
///
/// # Invariants
/// - `default`, when present, has a literal form (not blob or JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Logical kind.
    pub logical_type: LogicalType,
    /// Whether `NULL` is accepted.
    pub nullable: bool,
    /// Whether values must be unique.
    pub unique: bool,
    /// Default value.
    pub default: Option<Scalar>,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl ColumnSpec {
    /// Creates a nullable, non-unique column with no default.
    #[must_use]
    pub const fn new(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            nullable: true,
            unique: false,
            default: None,
            primary_key: false,
        }
    }

    /// Shorthand for a text column.
    #[must_use]
    pub const fn text() -> Self {
        Self::new(LogicalType::Text)
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column `UNIQUE`.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds the column to the composite primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Scalar>) -> Self {
        self.default = Some(value.into());
        self
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Ordered table description.
///
/// # Invariants
/// - Column names are valid identifiers and unique within the schema.
/// - At most one composite primary key, spanning every flagged column.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Table name.
    name: String,
    /// Columns in declaration order.
    columns: Vec<(String, ColumnSpec)>,
    /// Conflict clauses for constraints.
    policy: ConflictPolicy,
}

/// Incremental [`Schema`] builder.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    /// Table name.
    name: String,
    /// Columns in declaration order.
    columns: Vec<(String, ColumnSpec)>,
}

impl SchemaBuilder {
    /// Appends a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        self.columns.push((name.into(), spec));
        self
    }

    /// Validates and freezes the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for bad or duplicate names and for
    /// defaults with no literal form.
    pub fn build(self) -> Result<Schema, StoreError> {
        validate_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(StoreError::Invalid(format!("schema {} has no columns", self.name)));
        }
        let mut seen = BTreeSet::new();
        for (column, spec) in &self.columns {
            validate_identifier(column)?;
            if !seen.insert(column.as_str()) {
                return Err(StoreError::Invalid(format!(
                    "schema {} declares column {column} twice",
                    self.name
                )));
            }
            if let Some(default) = &spec.default
                && render_literal(default).is_none()
            {
                return Err(StoreError::Invalid(format!(
                    "default for column {column} has no literal form"
                )));
            }
        }
        Ok(Schema {
            name: self.name,
            columns: self.columns,
            policy: ConflictPolicy::default(),
        })
    }
}

impl Schema {
    /// Starts a schema for `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Builds a schema from externally defined field descriptors.
    ///
    /// `fields` must be a list of descriptor objects (see
    /// [`parse_field_list`]). When `primary_key` is given it is prepended as a
    /// unique, non-null text key column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidField`] for malformed descriptors and
    /// [`StoreError::UnsupportedType`] for unknown dtypes.
    pub fn from_field_list(
        name: impl Into<String>,
        fields: &Value,
        primary_key: Option<&str>,
    ) -> Result<Self, StoreError> {
        let descriptors = parse_field_list(fields)?;
        Self::from_fields(name, &descriptors, primary_key)
    }

    /// Builds a schema from parsed field descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for invalid or duplicate column names.
    pub fn from_fields(
        name: impl Into<String>,
        fields: &[FieldDescriptor],
        primary_key: Option<&str>,
    ) -> Result<Self, StoreError> {
        let mut builder = Self::builder(name);
        if let Some(key) = primary_key {
            builder = builder.column(key, ColumnSpec::text().not_null().unique().primary_key());
        }
        for field in fields {
            builder = builder.column(field.parameter.clone(), field.column_spec());
        }
        builder.build()
    }

    /// Builds the schema for a dataset table from inferred column kinds.
    ///
    /// Every column is nullable and no keys are declared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for invalid or duplicate column names.
    pub fn from_inferred(
        name: impl Into<String>,
        columns: &[(String, LogicalType)],
    ) -> Result<Self, StoreError> {
        columns
            .iter()
            .fold(Self::builder(name), |builder, (column, kind)| {
                builder.column(column.clone(), ColumnSpec::new(*kind))
            })
            .build()
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns column names in declaration order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns the specification for `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|(column, _)| column == name).map(|(_, spec)| spec)
    }

    /// Returns the primary-key columns in declaration order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, spec)| spec.primary_key)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Compiles the parenthesized column-definition fragment.
    #[must_use]
    pub fn compile_ddl(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|(name, spec)| {
                let mut part =
                    format!("{} {}", quote_identifier(name), spec.logical_type.to_storage_type());
                if !spec.nullable {
                    part.push_str(&format!(" NOT NULL {}", self.policy.nullable_clause()));
                }
                if spec.unique {
                    part.push_str(&format!(" UNIQUE {}", self.policy.unique_clause()));
                }
                if let Some(literal) = spec.default.as_ref().and_then(render_literal) {
                    part.push_str(&format!(" DEFAULT {literal}"));
                }
                part
            })
            .collect();
        let keys = self.primary_key();
        if !keys.is_empty() {
            let quoted: Vec<String> = keys.into_iter().map(quote_identifier).collect();
            parts.push(format!(
                "PRIMARY KEY({}) {}",
                quoted.join(", "),
                self.policy.primary_key_clause()
            ));
        }
        format!("({})", parts.join(", "))
    }
}

// ============================================================================
// SECTION: Field Descriptors
// ============================================================================

/// Value type declared by a field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDtype {
    /// `bool`
    Bool,
    /// `str`
    Str,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `datetime`
    Datetime,
    /// `timedelta`
    Timedelta,
}

impl FieldDtype {
    /// Parses a dtype name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] for unknown names.
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        match name {
            "bool" => Ok(Self::Bool),
            "str" => Ok(Self::Str),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "datetime" => Ok(Self::Datetime),
            "timedelta" => Ok(Self::Timedelta),
            other => Err(StoreError::UnsupportedType {
                kind: other.to_string(),
            }),
        }
    }

    /// Returns the descriptor name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Datetime => "datetime",
            Self::Timedelta => "timedelta",
        }
    }

    /// Returns the logical column kind; booleans are stored as text.
    #[must_use]
    pub const fn logical_type(self) -> LogicalType {
        match self {
            Self::Bool | Self::Str => LogicalType::Text,
            Self::Int => LogicalType::Integer,
            Self::Float => LogicalType::Real,
            Self::Datetime => LogicalType::Datetime,
            Self::Timedelta => LogicalType::Duration,
        }
    }

    /// Converts a descriptor value, `None` for null or empty strings.
    fn convert(self, parameter: &str, value: &Value) -> Result<Option<Scalar>, StoreError> {
        let mismatch = || {
            StoreError::InvalidField(format!(
                "value for {parameter} must be of dtype {}",
                self.as_str()
            ))
        };
        if value.is_null() || value.as_str().is_some_and(str::is_empty) {
            return Ok(None);
        }
        let scalar = match self {
            Self::Bool => Scalar::Bool(value.as_bool().ok_or_else(mismatch)?),
            Self::Str => Scalar::text(value.as_str().ok_or_else(mismatch)?),
            Self::Int => Scalar::Integer(value.as_i64().ok_or_else(mismatch)?),
            Self::Float => Scalar::Real(value.as_f64().ok_or_else(mismatch)?),
            Self::Datetime => {
                let text = value.as_str().ok_or_else(mismatch)?;
                Scalar::Datetime(parse_datetime(text).map_err(|_| mismatch())?)
            }
            Self::Timedelta => {
                let seconds = value.as_f64().ok_or_else(mismatch)?;
                Scalar::Duration(Duration::checked_seconds_f64(seconds).ok_or_else(mismatch)?)
            }
        };
        Ok(Some(scalar))
    }
}

/// One externally defined setting.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Widget type (`text_input`, `slider`, ...).
    pub kind: String,
    /// Declared value type.
    pub dtype: FieldDtype,
    /// Column name.
    pub parameter: String,
    /// Display label.
    pub name: String,
    /// Current value; `None` makes the column nullable.
    pub value: Option<Scalar>,
    /// Optional help text.
    pub description: Option<String>,
    /// Widget keyword arguments.
    pub kwargs: Option<Map<String, Value>>,
}

impl FieldDescriptor {
    /// Returns the column specification for this field.
    ///
    /// A present value becomes the default and makes the column `NOT NULL`.
    #[must_use]
    pub fn column_spec(&self) -> ColumnSpec {
        let spec = ColumnSpec::new(self.dtype.logical_type());
        match &self.value {
            Some(value) => spec.not_null().with_default(value.clone()),
            None => spec,
        }
    }
}

/// Parses and validates a list of field descriptors.
///
/// # Errors
///
/// Returns [`StoreError::InvalidField`] when `fields` is not a list, when an
/// entry lacks one of [`REQUIRED_FIELD_KEYS`], when a value does not match its
/// dtype, or when a slider has no `kwargs` map. Unknown dtypes fail with
/// [`StoreError::UnsupportedType`].
pub fn parse_field_list(fields: &Value) -> Result<Vec<FieldDescriptor>, StoreError> {
    let Some(entries) = fields.as_array() else {
        return Err(StoreError::InvalidField(
            "settings must be a list of field descriptors".to_string(),
        ));
    };
    entries.iter().enumerate().map(|(index, entry)| parse_field(index, entry)).collect()
}

/// Parses one descriptor object.
fn parse_field(index: usize, entry: &Value) -> Result<FieldDescriptor, StoreError> {
    let Some(object) = entry.as_object() else {
        return Err(StoreError::InvalidField(format!("field descriptor {index} must be an object")));
    };
    let required = |key: &str| -> Result<String, StoreError> {
        object.get(key).and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
            StoreError::InvalidField(format!(
                "field descriptor {index} is missing required keys [{}]",
                REQUIRED_FIELD_KEYS.join(", ")
            ))
        })
    };
    let kind = required("type")?;
    let dtype = FieldDtype::parse(&required("dtype")?)?;
    let parameter = required("parameter")?;
    let name = required("name")?;
    let value = match object.get("value") {
        Some(raw) => dtype.convert(&parameter, raw)?,
        None => None,
    };
    let kwargs = match object.get("kwargs") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            return Err(StoreError::InvalidField(format!("kwargs for {parameter} must be a map")));
        }
    };
    if kind == SLIDER_FIELD_TYPE && kwargs.is_none() {
        return Err(StoreError::InvalidField(format!("slider {parameter} requires a kwargs map")));
    }
    let description = object.get("description").and_then(Value::as_str).map(str::to_string);
    Ok(FieldDescriptor {
        kind,
        dtype,
        parameter,
        name,
        value,
        description,
        kwargs,
    })
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

    use super::*;

    #[test]
    fn compile_emits_single_composite_key() {
        let schema = Schema::builder("links")
            .column("user_id", ColumnSpec::text().not_null().primary_key())
            .column("session_id", ColumnSpec::text().not_null().primary_key())
            .build()
            .unwrap();
        assert_eq!(
            schema.compile_ddl(),
            "(\"user_id\" TEXT NOT NULL ON CONFLICT ABORT, \"session_id\" TEXT NOT NULL ON \
             CONFLICT ABORT, PRIMARY KEY(\"user_id\", \"session_id\") ON CONFLICT ABORT)"
        );
    }

    #[test]
    fn compile_renders_unique_and_default() {
        let schema = Schema::builder("settings")
            .column("name", ColumnSpec::text().unique().with_default("it's"))
            .column("final", ColumnSpec::text().with_default(false))
            .build()
            .unwrap();
        assert_eq!(
            schema.compile_ddl(),
            "(\"name\" TEXT UNIQUE ON CONFLICT ABORT DEFAULT 'it''s', \"final\" TEXT DEFAULT \
             'FALSE')"
        );
        assert!(schema.primary_key().is_empty());
    }

    #[test]
    fn build_rejects_duplicates_and_blob_defaults() {
        let duplicate = Schema::builder("t")
            .column("a", ColumnSpec::text())
            .column("a", ColumnSpec::text())
            .build();
        assert!(matches!(duplicate, Err(StoreError::Invalid(_))));
        let blob = Schema::builder("t")
            .column("a", ColumnSpec::new(LogicalType::Blob).with_default(Scalar::Blob(vec![1])))
            .build();
        assert!(matches!(blob, Err(StoreError::Invalid(_))));
    }

    #[test]
    fn field_list_prepends_primary_key() {
        let fields = json!([
            {
                "type": "text_input",
                "dtype": "str",
                "parameter": "session_name",
                "name": "Name",
                "value": "first"
            },
            {
                "type": "slider",
                "dtype": "int",
                "parameter": "depth",
                "name": "Depth",
                "value": 3,
                "kwargs": {"min_value": 1}
            },
            {
                "type": "checkbox",
                "dtype": "bool",
                "parameter": "verbose",
                "name": "Verbose",
                "value": ""
            }
        ]);
        let schema = Schema::from_field_list("settings", &fields, Some("session_id")).unwrap();
        assert_eq!(schema.columns(), vec!["session_id", "session_name", "depth", "verbose"]);
        assert_eq!(schema.primary_key(), vec!["session_id"]);
        let depth = schema.column("depth").unwrap();
        assert_eq!(depth.logical_type, LogicalType::Integer);
        assert!(!depth.nullable);
        assert_eq!(depth.default, Some(Scalar::Integer(3)));
        let verbose = schema.column("verbose").unwrap();
        assert!(verbose.nullable);
        assert_eq!(verbose.logical_type, LogicalType::Text);
    }

    #[test]
    fn field_list_rejects_malformed_input() {
        assert!(matches!(
            Schema::from_field_list("s", &json!({"type": "x"}), None),
            Err(StoreError::InvalidField(_))
        ));
        let missing = json!([{"type": "text_input", "dtype": "str", "name": "Name"}]);
        let err = Schema::from_field_list("s", &missing, None).unwrap_err();
        assert!(err.to_string().contains("[type, dtype, parameter, name]"));
        let wrong_value = json!([
            {"type": "text_input", "dtype": "int", "parameter": "p", "name": "P", "value": "x"}
        ]);
        assert!(matches!(
            Schema::from_field_list("s", &wrong_value, None),
            Err(StoreError::InvalidField(_))
        ));
        let slider = json!([{"type": "slider", "dtype": "int", "parameter": "p", "name": "P"}]);
        assert!(matches!(
            Schema::from_field_list("s", &slider, None),
            Err(StoreError::InvalidField(_))
        ));
        let dtype =
            json!([{"type": "text_input", "dtype": "complex", "parameter": "p", "name": "P"}]);
        assert!(matches!(
            Schema::from_field_list("s", &dtype, None),
            Err(StoreError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn inferred_schema_is_all_nullable() {
        let schema = Schema::from_inferred(
            "abc",
            &[
                ("region".to_string(), LogicalType::Text),
                ("units".to_string(), LogicalType::Integer),
            ],
        )
        .unwrap();
        assert_eq!(schema.compile_ddl(), "(\"region\" TEXT, \"units\" INTEGER)");
    }
}
