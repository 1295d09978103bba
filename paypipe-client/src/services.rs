//! Service catalog endpoints

use crate::PipelineClient;
use crate::error::Result;
use paypipe_core::domain::service::ServiceDescriptor;

impl PipelineClient {
    /// Every service in the server's catalog
    pub async fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        let url = format!("{}/services", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Services matching any word of `query`
    pub async fn search_services(&self, query: &str) -> Result<Vec<ServiceDescriptor>> {
        let url = format!("{}/services/search", self.base_url);
        let response = self.client.get(&url).query(&[("q", query)]).send().await?;
        self.handle_response(response).await
    }
}
