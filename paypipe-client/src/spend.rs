//! Spend ledger endpoints

use crate::PipelineClient;
use crate::error::Result;
use paypipe_core::domain::spend::{SpendLimits, SpendSummary};
use paypipe_core::dto::spend::UpdateLimits;

impl PipelineClient {
    pub async fn spend_summary(&self) -> Result<SpendSummary> {
        let url = format!("{}/spend", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Change the spend ceilings; `None` fields are left unchanged
    pub async fn update_limits(&self, req: UpdateLimits) -> Result<SpendLimits> {
        let url = format!("{}/spend/limits", self.base_url);
        let response = self.client.put(&url).json(&req).send().await?;
        self.handle_response(response).await
    }
}
