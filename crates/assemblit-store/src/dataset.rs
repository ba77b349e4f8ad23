// crates/assemblit-store/src/dataset.rs
// ============================================================================
// Module: Dataset Ingestion
// Description: Schema-on-write ingestion of tabular uploads.
// Purpose: Materialize each uploaded file as its own table in the data database.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An upload is a column list plus rows of JSON cells. Column kinds are
//! inferred from the cells, the dataset table is created from them, and the
//! rows are inserted in one transaction. The table name is derived from the
//! session id and file name, so uploading the same file into the same session
//! twice is detected and reported instead of duplicating data.
//!
//! Ingestion writes three places in order: the session-to-dataset link, the
//! metadata row, then the dataset table. A failure after the link is written
//! leaves the link behind; deleting the dataset removes it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::filter::Filter;
use crate::filter::Row;
use crate::hashing::dataset_table_name;
use crate::hashing::sha256_hex;
use crate::registry::DatabaseRegistry;
use crate::registry::LogicalDatabase;
use crate::schema::Schema;
use crate::types::LogicalType;
use crate::types::infer_column;
use crate::types::infer_from_json;
use crate::value::Scalar;
use crate::value::now_utc;
use crate::value::parse_datetime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Engine label stored with each dataset.
pub const DATASET_DBMS: &str = "sqlite";
/// Bytes per megabyte for the `size_mb` column.
const BYTES_PER_MB: f64 = 1_048_576.0;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tabular upload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatasetUpload {
    /// Original file name.
    pub file_name: String,
    /// Column names, in table order.
    pub columns: Vec<String>,
    /// Rows of cells, one per column.
    pub rows: Vec<Vec<Value>>,
    /// Grouping columns; defaults to the text columns.
    #[serde(default)]
    pub dimensions: Option<Vec<String>>,
    /// Measure columns; defaults to the numeric columns.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
}

/// Result of an ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Dataset identifier, also the table name.
    pub dataset_id: String,
    /// True when the table already existed and nothing was written.
    pub already_ingested: bool,
    /// Rows inserted.
    pub rows: usize,
    /// Inferred column kinds.
    pub columns: Vec<(String, LogicalType)>,
}

// ============================================================================
// SECTION: Ingestor
// ============================================================================

/// Ingests uploads into the data database.
pub struct DatasetIngestor<'a> {
    /// Database registry.
    registry: &'a DatabaseRegistry,
}

impl<'a> DatasetIngestor<'a> {
    /// Creates an ingestor.
    #[must_use]
    pub const fn new(registry: &'a DatabaseRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Ingests `upload` into `session_id` on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for empty or ragged uploads,
    /// [`StoreError::Coercion`] when a cell cannot take its column kind, and
    /// engine errors otherwise. Nothing is written when the schema is invalid;
    /// a failed write removes the dataset table and its metadata row.
    pub fn ingest(
        &self,
        session_id: &str,
        user_id: &str,
        upload: &DatasetUpload,
    ) -> Result<IngestOutcome, StoreError> {
        validate_upload(upload)?;
        let dataset_id = dataset_table_name(session_id, &upload.file_name);
        let data = self.registry.database(LogicalDatabase::Data)?;
        if data.table_exists(&dataset_id)? {
            return Ok(IngestOutcome {
                dataset_id,
                already_ingested: true,
                rows: 0,
                columns: Vec::new(),
            });
        }

        let kinds = infer_kinds(upload);
        let rows = upload
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&kinds)
                    .map(|(cell, (_, kind))| convert_cell(cell, *kind))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let schema = Schema::from_inferred(&dataset_id, &kinds)?;
        let metadata = self.metadata_row(&dataset_id, user_id, upload, &kinds)?;
        let session_index = self.registry.query_index(LogicalDatabase::Sessions);
        let data_index = self.registry.query_index(LogicalDatabase::Data);
        let link_columns = vec![session_index.to_string(), data_index.to_string()];
        let link_values = vec![Scalar::text(session_id), Scalar::text(&dataset_id)];
        let link_filter = Filter::composite(link_columns.clone(), link_values.clone())?;
        let link = Row::new(link_columns, link_values)?;
        let metadata_filter = Filter::eq(data_index, dataset_id.as_str());
        let sessions = self.registry.database(LogicalDatabase::Sessions)?;

        data.create_table(&dataset_id, &schema)?;
        let inserted = match data.insert_many(&dataset_id, &upload.columns, &rows) {
            Ok(inserted) => inserted,
            Err(err) => return Err(self.rollback(&dataset_id, None, err)),
        };
        let meta_table = self.registry.name(LogicalDatabase::Data);
        if let Err(err) = data.insert(meta_table, &metadata, Some(&metadata_filter)) {
            return Err(self.rollback(&dataset_id, None, err));
        }
        if let Err(err) = sessions.insert(meta_table, &link, Some(&link_filter)) {
            return Err(self.rollback(&dataset_id, Some(&metadata_filter), err));
        }
        Ok(IngestOutcome {
            dataset_id,
            already_ingested: false,
            rows: inserted,
            columns: kinds,
        })
    }

    /// Drops a partially ingested table and its metadata row, returning `err`.
    ///
    /// A cleanup failure is folded into the returned error.
    fn rollback(&self, dataset_id: &str, metadata: Option<&Filter>, err: StoreError) -> StoreError {
        let cleanup = self.registry.database(LogicalDatabase::Data).and_then(|data| {
            if let Some(filter) = metadata {
                data.delete_table_column_value(self.registry.name(LogicalDatabase::Data), filter)?;
            }
            data.drop_table(dataset_id)
        });
        match cleanup {
            Ok(()) => err,
            Err(cleanup) => {
                StoreError::Db(format!("{err}; rollback of {dataset_id} failed: {cleanup}"))
            }
        }
    }

    /// Builds the metadata row in table order.
    fn metadata_row(
        &self,
        dataset_id: &str,
        user_id: &str,
        upload: &DatasetUpload,
        kinds: &[(String, LogicalType)],
    ) -> Result<Row, StoreError> {
        let payload =
            serde_json::to_vec(&upload.rows).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let dimensions = upload.dimensions.clone().unwrap_or_else(|| {
            columns_where(kinds, |kind| matches!(kind, LogicalType::Text | LogicalType::Datetime))
        });
        let metrics = upload.metrics.clone().unwrap_or_else(|| {
            columns_where(kinds, |kind| matches!(kind, LogicalType::Integer | LogicalType::Real))
        });
        let row_count = i64::try_from(upload.rows.len()).unwrap_or(i64::MAX);
        let size = f64::from(u32::try_from(payload.len()).unwrap_or(u32::MAX)) / BYTES_PER_MB;
        Ok(Row::from_pairs([
            (self.registry.query_index(LogicalDatabase::Data), Scalar::text(dataset_id)),
            ("uploaded_by", Scalar::text(user_id)),
            ("created_on", Scalar::Datetime(now_utc())),
            ("final", Scalar::Bool(false)),
            ("version", Scalar::Integer(1)),
            ("file_name", Scalar::text(&upload.file_name)),
            ("dbms", Scalar::text(DATASET_DBMS)),
            ("dimensions", Scalar::Json(Value::from(dimensions))),
            ("metrics", Scalar::Json(Value::from(metrics))),
            ("row_count", Scalar::Integer(row_count)),
            ("size_mb", Scalar::Real(size)),
            ("sha256", Scalar::text(sha256_hex(&payload))),
        ]))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects uploads without columns or with ragged rows.
fn validate_upload(upload: &DatasetUpload) -> Result<(), StoreError> {
    if upload.file_name.trim().is_empty() {
        return Err(StoreError::Invalid("dataset file name is empty".to_string()));
    }
    if upload.columns.is_empty() {
        return Err(StoreError::Invalid(format!("{} has no columns", upload.file_name)));
    }
    if let Some(index) = upload.rows.iter().position(|row| row.len() != upload.columns.len()) {
        return Err(StoreError::Invalid(format!(
            "{} row {index} has {} cells, expected {}",
            upload.file_name,
            upload.rows[index].len(),
            upload.columns.len()
        )));
    }
    Ok(())
}

/// Infers one kind per column.
fn infer_kinds(upload: &DatasetUpload) -> Vec<(String, LogicalType)> {
    upload
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let kind = infer_column(upload.rows.iter().map(|row| infer_from_json(&row[index])));
            (column.clone(), kind)
        })
        .collect()
}

/// Names of columns whose kind satisfies `keep`.
fn columns_where(
    kinds: &[(String, LogicalType)],
    keep: impl Fn(LogicalType) -> bool,
) -> Vec<String> {
    kinds.iter().filter(|(_, kind)| keep(*kind)).map(|(column, _)| column.clone()).collect()
}

/// Converts one cell to its column kind.
fn convert_cell(cell: &Value, kind: LogicalType) -> Result<Scalar, StoreError> {
    let coercion = |target: &'static str| StoreError::Coercion {
        value: cell.to_string(),
        target,
    };
    match (cell, kind) {
        (Value::Null, _) => Ok(Scalar::Null),
        (Value::Number(number), LogicalType::Integer) => {
            number.as_i64().map(Scalar::Integer).ok_or_else(|| coercion("int"))
        }
        (Value::String(text), LogicalType::Integer) => {
            text.trim().parse().map(Scalar::Integer).map_err(|_| coercion("int"))
        }
        (Value::Number(number), LogicalType::Real) => {
            number.as_f64().map(Scalar::Real).ok_or_else(|| coercion("float"))
        }
        (Value::String(text), LogicalType::Real) => {
            text.trim().parse().map(Scalar::Real).map_err(|_| coercion("float"))
        }
        (Value::String(text), LogicalType::Datetime) => {
            parse_datetime(text.trim()).map(Scalar::Datetime)
        }
        (Value::String(text), _) => Ok(Scalar::text(text)),
        (Value::Number(number), _) => Ok(Scalar::text(number.to_string())),
        (Value::Bool(flag), _) => Ok(Scalar::Bool(*flag)),
        (other @ (Value::Array(_) | Value::Object(_)), _) => Ok(Scalar::Json(other.clone())),
    }
}
