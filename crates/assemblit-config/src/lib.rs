// crates/assemblit-config/src/lib.rs
// ============================================================================
// Module: Assemblit Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for `.assemblit/config.yaml` semantics.
// Dependencies: assemblit-store, serde, serde_yaml
// ============================================================================

//! ## Overview
//! `assemblit-config` defines the configuration model for Assemblit: the
//! application block, the four database names and query indexes, the
//! orchestration server, and the audit sink. Validation is strict and fails
//! closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_yaml_example;
