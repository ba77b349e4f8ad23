// crates/assemblit-orchestrator/src/lib.rs
// ============================================================================
// Module: Assemblit Orchestrator Library
// Description: Orchestration server client and run tracking.
// Purpose: Submit analysis runs and keep their state in the analysis database.
// Dependencies: assemblit-config, assemblit-store, reqwest, url
// ============================================================================

//! ## Overview
//! The orchestration server is an opaque job runner reached over HTTP.
//! [`OrchestratorClient`] wraps its REST endpoints; [`RunTracker`] submits a
//! run for a session, links it under that session, and stores the run row
//! that later polls refresh. Deleting the session removes the run through
//! the store cascade.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod state;
pub mod tracker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::FlowRun;
pub use client::FlowRunState;
pub use client::OrchestratorClient;
pub use client::OrchestratorError;
pub use client::RunRequest;
pub use state::RunState;
pub use tracker::RunRecord;
pub use tracker::RunTracker;
