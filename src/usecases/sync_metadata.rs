use crate::discrepancy::{DiscrepancyAnalyzer, ModelAnalysis, SyncReport};
use crate::error::Result;
use crate::gateway::{fetch_all_pages, MetadataGateway};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::info;

/// Compares the primary server with every replica, one model at a time.
pub struct SyncMetadata {
    primary: Arc<dyn MetadataGateway>,
    replicas: Vec<Arc<dyn MetadataGateway>>,
}

impl SyncMetadata {
    pub fn new(primary: Arc<dyn MetadataGateway>, replicas: Vec<Arc<dyn MetadataGateway>>) -> Self {
        Self { primary, replicas }
    }

    pub async fn execute(&self, models: &[String]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for model in models {
            report.models.push(self.check_model(model).await?);
        }
        Ok(report)
    }

    async fn check_model(&self, model: &str) -> Result<ModelAnalysis> {
        info!("[Primary server] Fetching metadata for model: {}", model);
        let primary = fetch_all_pages(self.primary.as_ref(), model).await?;

        info!(
            "[Replica servers] Fetching metadata for model: {} ({} servers)",
            model,
            self.replicas.len()
        );
        let replicas = try_join_all(
            self.replicas
                .iter()
                .map(|replica| fetch_all_pages(replica.as_ref(), model)),
        )
        .await?;

        let analysis = DiscrepancyAnalyzer.analyze(model, &primary, &replicas);
        info!(
            "[{}] exclusive={} code discrepancies={} field discrepancies={}",
            model,
            analysis.exclusive.len(),
            analysis.code_discrepancies.len(),
            analysis.field_discrepancies.len()
        );
        Ok(analysis)
    }
}
