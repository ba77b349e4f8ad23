// crates/assemblit-auth/src/lib.rs
// ============================================================================
// Module: Assemblit Auth Library
// Description: Credentials vault over the users database.
// Purpose: Sign-up, log-in, credential changes, and account deletion.
// Dependencies: argon2, assemblit-store
// ============================================================================

//! ## Overview
//! Credentials live in the `credentials` table of the users database. Password
//! hashes are Argon2id PHC strings; plaintext never reaches storage.
//! Deleting an account runs the user cascade, so sessions, datasets, and runs
//! only that user referenced go with it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod username;
pub mod vault;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use username::normalize_username;
pub use vault::AuthError;
pub use vault::Vault;
