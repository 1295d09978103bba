//! PayPipe HTTP Client
//!
//! A type-safe HTTP client for the PayPipe server API.
//!
//! # Example
//!
//! ```no_run
//! use paypipe_client::PipelineClient;
//! use paypipe_core::dto::pipeline::RunPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PipelineClient::new("http://localhost:3001");
//!
//!     let accepted = client.run_pipeline(RunPipeline {
//!         query: "Summarize today's news and tweet it".to_string(),
//!         budget: None,
//!         max_steps: None,
//!     }).await?;
//!
//!     println!("Started pipeline: {}", accepted.pipeline_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod pipelines;
mod services;
mod spend;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the PayPipe server
///
/// Methods are grouped by endpoint family:
/// - Pipeline runs (run, status, preview, history)
/// - Service catalog (list, search)
/// - Spend ledger (summary, limits)
#[derive(Debug, Clone)]
pub struct PipelineClient {
    /// Base URL of the server (e.g., "http://localhost:3001")
    base_url: String,
    client: Client,
}

impl PipelineClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:3001")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client with a custom HTTP client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server
    /// * `client` - A configured reqwest Client (timeouts, proxies, TLS)
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /health
    pub async fn health(&self) -> Result<String> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), error_message(&body)));
        }
        Ok(body)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                error_message(&error_text),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

/// The server reports errors as `{"error": "..."}`; anything else is passed through
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
