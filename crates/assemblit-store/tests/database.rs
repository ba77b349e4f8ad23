// crates/assemblit-store/tests/database.rs
// ============================================================================
// Module: Database Operation Tests
// Description: Table, row, and query operations against real sqlite files.
// Purpose: Validate DDL order, insert shape, cardinality, and update guards.
// ============================================================================

//! ## Overview
//! Exercises [`Database`] end to end on temporary files:
//! - Declared column order survives DDL compilation and introspection
//! - Inserts require the live column order exactly
//! - Single-value selects reject empty and ambiguous results
//! - Updates modify exactly one row or nothing

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use assemblit_store::Assignment;
use assemblit_store::ColumnSpec;
use assemblit_store::Database;
use assemblit_store::DatabaseConfig;
use assemblit_store::DeletionPlan;
use assemblit_store::Filter;
use assemblit_store::LogicalType;
use assemblit_store::OptionalSelect;
use assemblit_store::QueryValue;
use assemblit_store::ReturnType;
use assemblit_store::Row;
use assemblit_store::Scalar;
use assemblit_store::Schema;
use assemblit_store::SelectOptions;
use assemblit_store::StoreError;
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(dir: &TempDir, name: &str) -> Database {
    Database::open(DatabaseConfig::new(dir.path(), name)).unwrap()
}

fn people_schema() -> Schema {
    Schema::builder("people")
        .column("person_id", ColumnSpec::text().not_null().unique().primary_key())
        .column("name", ColumnSpec::text().not_null())
        .column("age", ColumnSpec::new(LogicalType::Integer))
        .column("team", ColumnSpec::text())
        .build()
        .unwrap()
}

fn person(id: &str, name: &str, age: i64, team: &str) -> Row {
    Row::from_pairs([
        ("person_id", Scalar::text(id)),
        ("name", Scalar::text(name)),
        ("age", Scalar::Integer(age)),
        ("team", Scalar::text(team)),
    ])
}

fn seeded(dir: &TempDir) -> Database {
    let db = open(dir, "people");
    db.create_table("people", &people_schema()).unwrap();
    db.insert("people", &person("p1", "Ada", 36, "red"), None).unwrap();
    db.insert("people", &person("p2", "Grace", 45, "red"), None).unwrap();
    db.insert("people", &person("p3", "Edsger", 72, "blue"), None).unwrap();
    db
}

// ============================================================================
// SECTION: Tables
// ============================================================================

#[test]
fn file_name_gets_default_extension() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir, "Users.TXT");
    assert_eq!(db.file_name(), "Users.db");
    assert!(db.path().exists());
}

#[test]
fn create_table_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir, "people");
    db.create_table("people", &people_schema()).unwrap();
    db.insert("people", &person("p1", "Ada", 36, "red"), None).unwrap();
    db.create_table("people", &people_schema()).unwrap();
    assert_eq!(db.select_num_table_records("people", None).unwrap(), 1);
    assert_eq!(db.select_table_names().unwrap(), vec!["people".to_string()]);
}

#[test]
fn drop_table_removes_it() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    assert!(db.table_exists("people").unwrap());
    db.drop_table("people").unwrap();
    assert!(!db.table_exists("people").unwrap());
    db.drop_table("people").unwrap();
}

#[test]
fn field_list_schema_creates_defaults() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir, "sessions");
    let fields = json!([
        {
            "type": "selectbox",
            "dtype": "str",
            "parameter": "region",
            "name": "Region",
            "value": "north"
        },
        {
            "type": "number_input",
            "dtype": "int",
            "parameter": "horizon",
            "name": "Horizon",
            "value": 12
        },
        {"type": "checkbox", "dtype": "bool", "parameter": "holdout", "name": "Holdout"}
    ]);
    let schema = Schema::from_field_list("settings", &fields, Some("session_id")).unwrap();
    db.create_table("settings", &schema).unwrap();
    assert_eq!(
        db.select_table_column_names_as_list("settings").unwrap(),
        vec!["session_id", "region", "horizon", "holdout"]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn declared_column_order_survives_introspection(
        names in prop::collection::btree_set("[a-z][a-z0-9_]{0,10}", 1..8),
        rotation in 0_usize .. 8,
    ) {
        let mut columns: Vec<String> = names.into_iter().collect();
        let len = columns.len();
        columns.rotate_left(rotation % len);
        let kinds =
            [LogicalType::Text, LogicalType::Integer, LogicalType::Real, LogicalType::Datetime];
        let schema = columns
            .iter()
            .zip(kinds.iter().cycle())
            .fold(Schema::builder("t"), |builder, (name, kind)| {
                builder.column(name.clone(), ColumnSpec::new(*kind))
            })
            .build()
            .unwrap();
        let dir = TempDir::new().unwrap();
        let db = open(&dir, "props");
        db.create_table("t", &schema).unwrap();
        prop_assert_eq!(db.select_table_column_names_as_list("t").unwrap(), columns);
    }
}

// ============================================================================
// SECTION: Inserts
// ============================================================================

#[test]
fn insert_requires_exact_column_order() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let permuted = Row::from_pairs([
        ("name", Scalar::text("Barbara")),
        ("person_id", Scalar::text("p4")),
        ("age", Scalar::Integer(50)),
        ("team", Scalar::text("blue")),
    ]);
    let err = db.insert("people", &permuted, None).unwrap_err();
    match err {
        StoreError::Shape {
            table,
            expected,
            ..
        } => {
            assert_eq!(table, "people");
            assert_eq!(expected, vec!["person_id", "name", "age", "team"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(db.select_num_table_records("people", None).unwrap(), 3);

    db.insert("people", &person("p4", "Barbara", 50, "blue"), None).unwrap();
    let row = db
        .select_multi_table_column_value("people", &["name", "age"], &Filter::eq("person_id", "p4"))
        .unwrap();
    assert_eq!(row.values(), &[Scalar::text("Barbara"), Scalar::Integer(50)]);
}

#[test]
fn shape_error_lists_expected_order() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let short = Row::from_pairs([("person_id", "p9")]);
    let message = db.insert("people", &short, None).unwrap_err().to_string();
    assert!(message.contains("[person_id, name, age, team]"), "{message}");
    assert!(message.contains("people.db"), "{message}");
}

#[test]
fn insert_validation_rejects_existing_record() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let err = db
        .insert("people", &person("p1", "Ada", 36, "red"), Some(&Filter::eq("person_id", "p1")))
        .unwrap_err();
    assert!(matches!(err, StoreError::RecordExists { .. }));
}

#[test]
fn validated_insert_into_missing_table_is_invalid() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir, "people");
    let err = db
        .insert("people", &person("p1", "Ada", 36, "red"), Some(&Filter::eq("person_id", "p1")))
        .unwrap_err();
    assert!(
        matches!(&err, StoreError::Invalid(message) if message.contains("does not exist")),
        "{err}"
    );
}

#[test]
fn constraint_violations_surface_as_db_errors() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let err = db.insert("people", &person("p1", "Again", 1, "red"), None).unwrap_err();
    assert!(matches!(err, StoreError::Db(_)));
}

#[test]
fn insert_many_is_atomic() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let columns: Vec<String> =
        ["person_id", "name", "age", "team"].iter().map(ToString::to_string).collect();
    let rows = vec![
        vec![Scalar::text("p5"), Scalar::text("Linus"), Scalar::Integer(30), Scalar::text("red")],
        vec![Scalar::text("p1"), Scalar::text("Dup"), Scalar::Integer(1), Scalar::text("red")],
    ];
    assert!(db.insert_many("people", &columns, &rows).is_err());
    assert_eq!(db.select_num_table_records("people", None).unwrap(), 3);
}

// ============================================================================
// SECTION: Selects
// ============================================================================

#[test]
fn single_select_cardinality() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);

    let one = db
        .select_table_column_value(
            "people",
            "age",
            &Filter::eq("person_id", "p2"),
            SelectOptions::returning(ReturnType::Integer),
        )
        .unwrap();
    assert_eq!(one, QueryValue::One(Scalar::Integer(45)));

    let none = db.select_table_column_value(
        "people",
        "name",
        &Filter::eq("person_id", "missing"),
        SelectOptions::default(),
    );
    assert!(matches!(none, Err(StoreError::NullReturnValue { .. })));
    assert_eq!(none.optional().unwrap(), None);

    let ambiguous = db.select_table_column_value(
        "people",
        "name",
        &Filter::eq("team", "red"),
        SelectOptions::default(),
    );
    assert!(matches!(ambiguous, Err(StoreError::AmbiguousResult { .. })));
}

#[test]
fn multi_select_orders_and_negates() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let names = db
        .select_table_column_value(
            "people",
            "name",
            &Filter::eq("team", "red"),
            SelectOptions::default().multi().descending(),
        )
        .unwrap();
    assert_eq!(names.into_vec(), vec![Scalar::text("Grace"), Scalar::text("Ada")]);

    let others = db
        .select_table_column_value(
            "people",
            "name",
            &Filter::any_of("person_id", vec![Scalar::text("p1"), Scalar::text("p2")]),
            SelectOptions::default().multi().excluding(),
        )
        .unwrap();
    assert_eq!(others.into_vec(), vec![Scalar::text("Edsger")]);
}

#[test]
fn coercion_failure_names_target() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let err = db
        .select_table_column_value(
            "people",
            "name",
            &Filter::eq("person_id", "p1"),
            SelectOptions::returning(ReturnType::Integer),
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Ada value cannot be converted to int");
}

#[test]
fn tables_with_column_are_listed_by_name() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let teams = Schema::builder("teams")
        .column("team", ColumnSpec::text().primary_key())
        .build()
        .unwrap();
    db.create_table("teams", &teams).unwrap();
    assert_eq!(
        db.select_all_tables_with_column_name("team").unwrap(),
        vec!["people".to_string(), "teams".to_string()]
    );
    assert!(db.select_all_tables_with_column_name("absent").unwrap().is_empty());
}

#[test]
fn generic_query_is_read_only() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let total = db
        .select_generic_query("SELECT SUM(age) FROM people", ReturnType::Integer)
        .unwrap();
    assert_eq!(total, Scalar::Integer(153));
    let err = db.select_generic_query("DELETE FROM people", ReturnType::Text).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
    assert_eq!(db.select_num_table_records("people", None).unwrap(), 3);
    let ambiguous = db.select_generic_query("SELECT name FROM people", ReturnType::Text);
    assert!(matches!(ambiguous, Err(StoreError::AmbiguousResult { .. })));
}

// ============================================================================
// SECTION: Updates and Deletes
// ============================================================================

#[test]
fn update_touches_exactly_one_row() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    db.update("people", &Assignment::new("team", "green"), &Filter::eq("person_id", "p3"))
        .unwrap();
    assert_eq!(
        db.select_num_table_records("people", Some(&Filter::eq("team", "green"))).unwrap(),
        1
    );

    let err = db
        .update("people", &Assignment::new("team", "blue"), &Filter::eq("team", "red"))
        .unwrap_err();
    assert!(matches!(err, StoreError::UpdateAmbiguous { matched: 2, .. }));
    assert_eq!(db.select_num_table_records("people", Some(&Filter::eq("team", "red"))).unwrap(), 2);

    let err = db
        .update("people", &Assignment::new("team", "blue"), &Filter::eq("person_id", "nobody"))
        .unwrap_err();
    assert!(matches!(err, StoreError::UpdateNoMatch { .. }));
}

#[test]
fn reset_and_delete_column_values() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let reset = db
        .reset_table_column_value("people", &Assignment::new("team", Scalar::Null), None)
        .unwrap();
    assert_eq!(reset, 3);
    assert_eq!(
        db.select_num_table_records("people", Some(&Filter::eq("team", Scalar::Null))).unwrap(),
        3
    );
    let deleted = db.delete_table_column_value("people", &Filter::eq("person_id", "p1")).unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(db.select_num_table_records("people", None).unwrap(), 2);
}

#[test]
fn deletion_plan_runs_in_order() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let mut plan = DeletionPlan::new();
    plan.push("people", Filter::eq("team", "red"));
    plan.push("people", Filter::eq("person_id", "p3"));
    assert_eq!(db.delete(&plan).unwrap(), 3);
    assert_eq!(db.select_num_table_records("people", None).unwrap(), 0);
}

#[test]
fn composite_filter_matches_row_values() {
    let dir = TempDir::new().unwrap();
    let db = seeded(&dir);
    let filter = Filter::composite(
        vec!["team".to_string(), "name".to_string()],
        vec![Scalar::text("red"), Scalar::text("Ada")],
    )
    .unwrap();
    assert!(db.table_record_exists("people", &filter).unwrap());
    let mismatch = Filter::composite(
        vec!["team".to_string(), "name".to_string()],
        vec![Scalar::text("blue"), Scalar::text("Ada")],
    )
    .unwrap();
    assert!(!db.table_record_exists("people", &mismatch).unwrap());
}
