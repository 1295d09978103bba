//! Pipeline run endpoints

use crate::PipelineClient;
use crate::error::Result;
use paypipe_core::domain::pipeline::{HistoryEntry, RunStatus};
use paypipe_core::dto::pipeline::{PlanPreview, PreviewPlan, RunAccepted, RunPipeline};
use uuid::Uuid;

impl PipelineClient {
    // =============================================================================
    // Pipeline Runs
    // =============================================================================

    /// Start a pipeline run
    ///
    /// Returns as soon as the server has accepted the run; poll
    /// [`get_pipeline`](Self::get_pipeline) to follow it.
    pub async fn run_pipeline(&self, req: RunPipeline) -> Result<RunAccepted> {
        let url = format!("{}/pipeline/run", self.base_url);
        tracing::debug!("Starting pipeline: {}", req.query);
        let response = self.client.post(&url).json(&req).send().await?;
        self.handle_response(response).await
    }

    /// Live status of a run
    pub async fn get_pipeline(&self, id: Uuid) -> Result<RunStatus> {
        let url = format!("{}/pipeline/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Plan a query without running it
    pub async fn preview_pipeline(&self, req: PreviewPlan) -> Result<PlanPreview> {
        let url = format!("{}/pipeline/preview", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;
        self.handle_response(response).await
    }

    /// Most recent finished runs, newest first
    ///
    /// # Arguments
    /// * `limit` - Maximum number of entries; server default when `None`
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let url = format!("{}/pipeline/history", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let response = request.send().await?;
        self.handle_response(response).await
    }
}
