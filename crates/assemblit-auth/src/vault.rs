// crates/assemblit-auth/src/vault.rs
// ============================================================================
// Module: Credentials Vault
// Description: Argon2id credential storage and account lifecycle.
// Purpose: Authenticate users and manage their credentials.
// Dependencies: argon2, assemblit-store, thiserror
// ============================================================================

//! ## Overview
//! [`Vault`] reads and writes the credentials table. Every operation that
//! changes a credential first checks the caller knows the current password,
//! except username changes which only need a logged-in user.
//! Security posture: hashes are verified through the Argon2 verifier; stored
//! hashes are never compared as strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use argon2::Argon2;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use assemblit_store::Assignment;
use assemblit_store::CascadeOrchestrator;
use assemblit_store::CascadeReport;
use assemblit_store::Database;
use assemblit_store::DatabaseRegistry;
use assemblit_store::Filter;
use assemblit_store::LogicalDatabase;
use assemblit_store::OptionalSelect;
use assemblit_store::Row;
use assemblit_store::Scalar;
use assemblit_store::SessionState;
use assemblit_store::StoreAuditSink;
use assemblit_store::StoreError;
use assemblit_store::hashing::generate_id;
use assemblit_store::tables::CREATED_ON_COLUMN;
use assemblit_store::tables::CREDENTIALS_TABLE;
use assemblit_store::tables::FIRST_NAME_COLUMN;
use assemblit_store::tables::PASSWORD_COLUMN;
use assemblit_store::tables::USERNAME_COLUMN;
use assemblit_store::tables::credentials_schema;
use assemblit_store::value::now_utc;
use thiserror::Error;

use crate::username::normalize_username;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication and account errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No account with that username or id.
    #[error("User {{{0}}} not found.")]
    UserNotFound(String),
    /// Password verification failed.
    #[error("Incorrect password.")]
    IncorrectPassword,
    /// Password and confirmation differ.
    #[error("The passwords do not match.")]
    PasswordsDoNotMatch,
    /// Empty password.
    #[error("The password must not be empty.")]
    EmptyPassword,
    /// Username already taken.
    #[error("The user already exists.")]
    UserAlreadyExists,
    /// Username is not shaped like an email address.
    #[error("{0} is not a valid email address.")]
    InvalidUsername(String),
    /// Hashing failure.
    #[error("password hashing failed: {0}")]
    Hash(String),
    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Vault
// ============================================================================

/// Credentials vault bound to a registry.
pub struct Vault<'a> {
    /// Database registry.
    registry: &'a DatabaseRegistry,
    /// Audit sink for account deletion cascades.
    audit: &'a dyn StoreAuditSink,
}

impl<'a> Vault<'a> {
    /// Creates a vault.
    #[must_use]
    pub const fn new(registry: &'a DatabaseRegistry, audit: &'a dyn StoreAuditSink) -> Self {
        Self {
            registry,
            audit,
        }
    }

    /// Adds an account and returns its user id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUsername`], [`AuthError::PasswordsDoNotMatch`],
    /// [`AuthError::EmptyPassword`], or [`AuthError::UserAlreadyExists`] for
    /// rejected input.
    pub fn add_credentials(
        &self,
        username: &str,
        password: &str,
        confirm: &str,
        first_name: Option<&str>,
    ) -> Result<String, AuthError> {
        let username = checked_username(username)?;
        let password = checked_new_password(password, confirm)?;
        let users = self.ensure_credentials()?;
        let user_index = self.user_index();
        let taken = Filter::eq(USERNAME_COLUMN, username.as_str());
        if users.table_record_exists(CREDENTIALS_TABLE, &taken)? {
            return Err(AuthError::UserAlreadyExists);
        }

        let user_id = generate_id(&username);
        let first_name = first_name.map(str::trim).filter(|name| !name.is_empty());
        let row = Row::from_pairs([
            (user_index, Scalar::text(&user_id)),
            (USERNAME_COLUMN, Scalar::text(&username)),
            (PASSWORD_COLUMN, Scalar::text(hash_password(password)?)),
            (FIRST_NAME_COLUMN, Scalar::from(first_name)),
            (CREATED_ON_COLUMN, Scalar::Datetime(now_utc())),
        ]);
        match users.insert(
            CREDENTIALS_TABLE,
            &row,
            Some(&Filter::eq(USERNAME_COLUMN, username.as_str())),
        ) {
            Ok(()) => Ok(user_id),
            Err(StoreError::RecordExists {
                ..
            }) => Err(AuthError::UserAlreadyExists),
            Err(err) => Err(err.into()),
        }
    }

    /// Verifies credentials and logs the user into `state`.
    ///
    /// Returns the user id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] or [`AuthError::IncorrectPassword`].
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        state: &mut SessionState,
    ) -> Result<String, AuthError> {
        let username = checked_username(username)?;
        let users = self.ensure_credentials()?;
        let user_index = self.user_index();
        let record = users
            .select_multi_table_column_value(
                CREDENTIALS_TABLE,
                &[user_index, PASSWORD_COLUMN, FIRST_NAME_COLUMN],
                &Filter::eq(USERNAME_COLUMN, username.as_str()),
            )
            .optional()?
            .ok_or_else(|| AuthError::UserNotFound(username.clone()))?;
        verify_password(text_of(&record, PASSWORD_COLUMN), password.trim())?;

        let user_id = text_of(&record, user_index).to_string();
        let first_name =
            record.get(FIRST_NAME_COLUMN).and_then(Scalar::as_text).map(str::to_string);
        state.login(user_id.clone(), first_name);
        Ok(user_id)
    }

    /// Replaces the password of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IncorrectPassword`] when `current` is wrong and
    /// [`AuthError::PasswordsDoNotMatch`] when the new passwords differ.
    pub fn update_password(
        &self,
        user_id: &str,
        current: &str,
        password: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        self.verify_user(user_id, current)?;
        let password = checked_new_password(password, confirm)?;
        self.registry.database(LogicalDatabase::Users)?.update(
            CREDENTIALS_TABLE,
            &Assignment::new(PASSWORD_COLUMN, hash_password(password)?),
            &Filter::eq(self.user_index(), user_id),
        )?;
        Ok(())
    }

    /// Changes the username of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUsername`] or [`AuthError::UserAlreadyExists`]
    /// for rejected names and [`AuthError::UserNotFound`] for unknown ids.
    pub fn update_username(&self, user_id: &str, username: &str) -> Result<String, AuthError> {
        let username = checked_username(username)?;
        let users = self.ensure_credentials()?;
        let taken = Filter::eq(USERNAME_COLUMN, username.as_str());
        if users.table_record_exists(CREDENTIALS_TABLE, &taken)? {
            return Err(AuthError::UserAlreadyExists);
        }
        match users.update(
            CREDENTIALS_TABLE,
            &Assignment::new(USERNAME_COLUMN, username.as_str()),
            &Filter::eq(self.user_index(), user_id),
        ) {
            Ok(()) => Ok(username),
            Err(StoreError::UpdateNoMatch {
                ..
            }) => Err(AuthError::UserNotFound(user_id.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes the account of `user_id` after checking `password`.
    ///
    /// Runs the user cascade; `state` is logged out when it belonged to the
    /// deleted user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IncorrectPassword`] for a wrong password and
    /// [`AuthError::Store`] when a cascade level fails.
    pub fn delete_account(
        &self,
        user_id: &str,
        password: &str,
        state: &mut SessionState,
    ) -> Result<CascadeReport, AuthError> {
        self.verify_user(user_id, password)?;
        Ok(CascadeOrchestrator::new(self.registry, self.audit).delete_user(user_id, state)?)
    }

    /// Checks `password` against the stored hash of `user_id`.
    fn verify_user(&self, user_id: &str, password: &str) -> Result<(), AuthError> {
        let users = self.ensure_credentials()?;
        let record = users
            .select_multi_table_column_value(
                CREDENTIALS_TABLE,
                &[PASSWORD_COLUMN],
                &Filter::eq(self.user_index(), user_id),
            )
            .optional()?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;
        verify_password(text_of(&record, PASSWORD_COLUMN), password.trim())
    }

    /// Opens the users database and creates the credentials table if absent.
    fn ensure_credentials(&self) -> Result<&Database, AuthError> {
        let users = self.registry.database(LogicalDatabase::Users)?;
        users.create_table(CREDENTIALS_TABLE, &credentials_schema(self.user_index())?)?;
        Ok(users)
    }

    /// Returns the users query index.
    fn user_index(&self) -> &'a str {
        self.registry.query_index(LogicalDatabase::Users)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes a username or rejects it.
fn checked_username(username: &str) -> Result<String, AuthError> {
    normalize_username(username)
        .ok_or_else(|| AuthError::InvalidUsername(username.trim().to_string()))
}

/// Trims and compares a new password with its confirmation.
fn checked_new_password<'p>(password: &'p str, confirm: &str) -> Result<&'p str, AuthError> {
    let password = password.trim();
    if password != confirm.trim() {
        return Err(AuthError::PasswordsDoNotMatch);
    }
    if password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }
    Ok(password)
}

/// Hashes `password` with Argon2id and a random salt.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

/// Verifies `password` against a PHC hash string.
fn verify_password(hash: &str, password: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|err| AuthError::Hash(err.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::IncorrectPassword)
}

/// Returns the text in `column`, or an empty string.
fn text_of<'r>(record: &'r Row, column: &str) -> &'r str {
    record.get(column).and_then(Scalar::as_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_differ() {
        let first = hash_password("correct horse").unwrap_or_default();
        let second = hash_password("correct horse").unwrap_or_default();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password(&first, "correct horse").is_ok());
        assert!(matches!(verify_password(&first, "wrong"), Err(AuthError::IncorrectPassword)));
    }

    #[test]
    fn new_passwords_are_trimmed_and_confirmed() {
        assert_eq!(checked_new_password(" secret ", "secret").ok(), Some("secret"));
        assert!(matches!(checked_new_password("a", "b"), Err(AuthError::PasswordsDoNotMatch)));
        assert!(matches!(checked_new_password(" ", ""), Err(AuthError::EmptyPassword)));
    }
}
