// crates/assemblit-auth/tests/vault.rs
// ============================================================================
// Module: Vault Tests
// Description: Sign-up, log-in, credential changes, and account deletion.
// Purpose: Validate credential handling against a real users database.
// ============================================================================

//! ## Overview
//! Exercises the vault against a temporary registry:
//! - Usernames are normalized before storage and lookup
//! - Wrong passwords and unknown users are distinguished
//! - Account deletion runs the user cascade

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

use assemblit_auth::AuthError;
use assemblit_auth::Vault;
use assemblit_store::DatabaseRegistry;
use assemblit_store::Filter;
use assemblit_store::LogicalDatabase;
use assemblit_store::NoopAuditSink;
use assemblit_store::RegistryConfig;
use assemblit_store::SessionRecords;
use assemblit_store::SessionState;
use assemblit_store::tables::CREDENTIALS_TABLE;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn registry() -> (TempDir, DatabaseRegistry) {
    let dir = TempDir::new().unwrap();
    let registry = DatabaseRegistry::new(RegistryConfig::new(dir.path()));
    registry.initialize().unwrap();
    (dir, registry)
}

fn sign_up(vault: &Vault<'_>, username: &str) -> String {
    vault.add_credentials(username, "hunter22", "hunter22", Some("Ada")).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sign_up_then_log_in_with_normalized_username() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    let user_id = sign_up(&vault, "  Ada@Example.com");

    let mut state = SessionState::new();
    let logged_in = vault.authenticate("ada@example.COM", " hunter22 ", &mut state).unwrap();
    assert_eq!(logged_in, user_id);
    let user = state.user().unwrap();
    assert_eq!(user.first_name.as_deref(), Some("Ada"));
    assert_eq!(state.selected_id(LogicalDatabase::Users), Some(user_id.as_str()));
}

#[test]
fn stored_password_is_a_hash() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    let user_id = sign_up(&vault, "ada@example.com");
    let stored = registry
        .database(LogicalDatabase::Users)
        .unwrap()
        .select_multi_table_column_value(
            CREDENTIALS_TABLE,
            &["password"],
            &Filter::eq("user_id", user_id.as_str()),
        )
        .unwrap();
    let hash = stored.get("password").and_then(|value| value.as_text()).unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(!hash.contains("hunter22"));
}

#[test]
fn duplicate_username_is_rejected_case_insensitively() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    sign_up(&vault, "ada@example.com");
    let result = vault.add_credentials("ADA@example.com", "x", "x", None);
    assert!(matches!(result, Err(AuthError::UserAlreadyExists)));
}

#[test]
fn sign_up_rejects_bad_input() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    assert!(matches!(
        vault.add_credentials("not-an-email", "a", "a", None),
        Err(AuthError::InvalidUsername(_))
    ));
    assert!(matches!(
        vault.add_credentials("ada@example.com", "a", "b", None),
        Err(AuthError::PasswordsDoNotMatch)
    ));
}

#[test]
fn log_in_distinguishes_unknown_user_and_wrong_password() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    sign_up(&vault, "ada@example.com");
    let mut state = SessionState::new();

    let unknown = vault.authenticate("bob@example.com", "hunter22", &mut state);
    assert_eq!(unknown.unwrap_err().to_string(), "User {bob@example.com} not found.");
    let wrong = vault.authenticate("ada@example.com", "hunter2", &mut state);
    assert!(matches!(wrong, Err(AuthError::IncorrectPassword)));
    assert!(!state.is_authenticated());
}

#[test]
fn password_change_requires_current_password() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    let user_id = sign_up(&vault, "ada@example.com");

    let refused = vault.update_password(&user_id, "nope", "fresh", "fresh");
    assert!(matches!(refused, Err(AuthError::IncorrectPassword)));
    vault.update_password(&user_id, "hunter22", "fresh", "fresh").unwrap();

    let mut state = SessionState::new();
    assert!(vault.authenticate("ada@example.com", "hunter22", &mut state).is_err());
    assert!(vault.authenticate("ada@example.com", "fresh", &mut state).is_ok());
}

#[test]
fn username_change_refuses_taken_names() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    let ada = sign_up(&vault, "ada@example.com");
    sign_up(&vault, "bob@example.com");

    assert!(matches!(
        vault.update_username(&ada, "Bob@example.com"),
        Err(AuthError::UserAlreadyExists)
    ));
    assert_eq!(
        vault.update_username(&ada, "Lovelace@Example.com").unwrap(),
        "lovelace@example.com"
    );
    let mut state = SessionState::new();
    assert!(vault.authenticate("lovelace@example.com", "hunter22", &mut state).is_ok());
    assert!(matches!(
        vault.update_username("missing", "new@example.com"),
        Err(AuthError::UserNotFound(_))
    ));
}

#[test]
fn account_deletion_runs_user_cascade() {
    let (_dir, registry) = registry();
    let vault = Vault::new(&registry, &NoopAuditSink);
    let user_id = sign_up(&vault, "ada@example.com");
    let records = SessionRecords::new(&registry);
    let settings = json!([
        {
            "type": "text_input",
            "dtype": "str",
            "parameter": "label",
            "name": "Label",
            "value": "draft"
        }
    ]);
    let session_id = records.create_session(&user_id, &settings).unwrap();

    let mut state = SessionState::new();
    vault.authenticate("ada@example.com", "hunter22", &mut state).unwrap();
    state.select(LogicalDatabase::Sessions, session_id.clone(), None);

    assert!(matches!(
        vault.delete_account(&user_id, "wrong", &mut state),
        Err(AuthError::IncorrectPassword)
    ));
    let report = vault.delete_account(&user_id, "hunter22", &mut state).unwrap();
    assert_eq!(report.removed_from(LogicalDatabase::Sessions).len(), 1);
    assert!(!state.is_authenticated());
    assert!(state.selection(LogicalDatabase::Sessions).is_none());
    assert!(records.list_sessions(&user_id).unwrap().is_empty());
    assert!(matches!(
        vault.authenticate("ada@example.com", "hunter22", &mut state),
        Err(AuthError::UserNotFound(_))
    ));
}
