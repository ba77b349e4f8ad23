// crates/assemblit-orchestrator/src/client.rs
// ============================================================================
// Module: Orchestrator Client
// Description: Blocking REST client for the orchestration server.
// Purpose: Health checks, CSRF tokens, deployment lookup, and run calls.
// Dependencies: assemblit-config, reqwest, serde, url
// ============================================================================

//! ## Overview
//! [`OrchestratorClient`] talks to `http://{host}:{port}/{api_route}`.
//! Invariants:
//! - Non-success status codes fail closed.
//! - Redirects are rejected.
//! - Path segments are percent-encoded, so job and deployment names cannot
//!   escape their segment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use assemblit_config::OrchestratorConfig;
use assemblit_store::StoreError;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::state::RunState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the CSRF token.
pub const CSRF_TOKEN_HEADER: &str = "prefect-csrf-token";
/// Header carrying the CSRF client name.
pub const CSRF_CLIENT_HEADER: &str = "prefect-csrf-client";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Client construction or URL failure.
    #[error("orchestrator config error: {0}")]
    Config(String),
    /// Transport failure.
    #[error("orchestrator http error: {0}")]
    Http(String),
    /// Non-success response.
    #[error("orchestrator returned http status {status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },
    /// Response body did not match the expected shape.
    #[error("orchestrator response decode error: {0}")]
    Decode(String),
    /// Storage failure while recording a run.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Run creation request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    /// Run name.
    pub name: String,
    /// Run tags.
    pub tags: Vec<String>,
    /// Job parameters.
    pub parameters: Value,
}

/// Server-side run state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FlowRunState {
    /// State type, e.g. `RUNNING`.
    #[serde(rename = "type")]
    pub state_type: String,
    /// State display name.
    #[serde(default)]
    pub name: String,
}

/// Run as reported by the server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowRun {
    /// Run identifier.
    pub id: String,
    /// Run name.
    #[serde(default)]
    pub name: String,
    /// Current state.
    #[serde(default)]
    pub state: Option<FlowRunState>,
    /// Start timestamp.
    #[serde(default)]
    pub start_time: Option<String>,
    /// End timestamp.
    #[serde(default)]
    pub end_time: Option<String>,
    /// Run time in seconds.
    #[serde(default)]
    pub total_run_time: f64,
    /// Job parameters.
    #[serde(default)]
    pub parameters: Value,
    /// Run tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FlowRun {
    /// Returns the display status, when the state type is known.
    #[must_use]
    pub fn status(&self) -> Option<RunState> {
        self.state.as_ref().and_then(|state| RunState::from_state_type(&state.state_type))
    }

    /// Returns the status label, falling back to the raw state type.
    #[must_use]
    pub fn status_label(&self) -> Option<String> {
        match (self.status(), &self.state) {
            (Some(status), _) => Some(status.label().to_string()),
            (None, Some(state)) => Some(state.state_type.to_ascii_uppercase()),
            (None, None) => None,
        }
    }
}

/// CSRF token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    /// Token value.
    token: String,
}

/// Deployment lookup response.
#[derive(Debug, Deserialize)]
struct DeploymentResponse {
    /// Deployment identifier.
    id: String,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking orchestration server client.
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// HTTP client.
    client: Client,
    /// API base URL.
    base: Url,
    /// Server root URL for run links.
    root: Url,
    /// Client name sent with CSRF requests and as the run tag.
    client_name: String,
}

impl OrchestratorClient {
    /// Builds a client from orchestration settings.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] for invalid hosts or when the
    /// HTTP client cannot be constructed.
    pub fn new(config: &OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let base = Url::parse(&config.base_url())
            .map_err(|err| OrchestratorError::Config(err.to_string()))?;
        let root = Url::parse(&format!("http://{}:{}", config.host, config.port))
            .map_err(|err| OrchestratorError::Config(err.to_string()))?;
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| OrchestratorError::Config(err.to_string()))?;
        Ok(Self {
            client,
            base,
            root,
            client_name: config.client_name.clone(),
        })
    }

    /// Returns the client name.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Checks the server health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the server is unreachable or unhealthy.
    pub fn health(&self) -> Result<(), OrchestratorError> {
        let url = self.endpoint(&["health"])?;
        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|err| OrchestratorError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(OrchestratorError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Requests a CSRF token for this client.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on transport, status, or decode failures.
    pub fn csrf_token(&self) -> Result<String, OrchestratorError> {
        let mut url = self.endpoint(&["csrf-token"])?;
        url.query_pairs_mut().append_pair("client", &self.client_name);
        let response: TokenResponse = send_json(self.client.get(url.as_str()), &url)?;
        Ok(response.token)
    }

    /// Looks up the id of a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on transport, status, or decode failures.
    pub fn deployment_id(
        &self,
        job_name: &str,
        deployment_name: &str,
    ) -> Result<String, OrchestratorError> {
        let url = self.endpoint(&["deployments", "name", job_name, deployment_name])?;
        let response: DeploymentResponse = send_json(self.client.get(url.as_str()), &url)?;
        Ok(response.id)
    }

    /// Creates a run from a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on transport, status, or decode failures.
    pub fn create_run(
        &self,
        deployment_id: &str,
        request: &RunRequest,
    ) -> Result<FlowRun, OrchestratorError> {
        let token = self.csrf_token()?;
        let url = self.endpoint(&["deployments", deployment_id, "create_flow_run"])?;
        let builder = self
            .client
            .post(url.as_str())
            .header(CSRF_TOKEN_HEADER, token)
            .header(CSRF_CLIENT_HEADER, self.client_name.as_str())
            .json(request);
        send_json(builder, &url)
    }

    /// Fetches a run.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on transport, status, or decode failures.
    pub fn get_run(&self, run_id: &str) -> Result<FlowRun, OrchestratorError> {
        let url = self.endpoint(&["flow_runs", run_id])?;
        send_json(self.client.get(url.as_str()), &url)
    }

    /// Returns the dashboard link of a run.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] when the root URL cannot take path segments.
    pub fn run_url(&self, run_id: &str) -> Result<String, OrchestratorError> {
        Ok(extend(&self.root, &["flow-runs", "flow-run", run_id])?.to_string())
    }

    /// Appends path segments to the API base.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, OrchestratorError> {
        extend(&self.base, segments)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends percent-encoded path segments to `base`.
fn extend(base: &Url, segments: &[&str]) -> Result<Url, OrchestratorError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| OrchestratorError::Config(format!("{base} cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sends a request and decodes a successful JSON response.
fn send_json<T: DeserializeOwned>(
    builder: RequestBuilder,
    url: &Url,
) -> Result<T, OrchestratorError> {
    let response = builder.send().map_err(|err| OrchestratorError::Http(err.to_string()))?;
    if !response.status().is_success() {
        return Err(OrchestratorError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    response.json::<T>().map_err(|err| OrchestratorError::Decode(err.to_string()))
}
