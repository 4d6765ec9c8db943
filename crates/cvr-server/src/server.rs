use std::sync::Arc;

use cvr_core::{DeploymentService, PayloadStrategy, StrategyKind};
use cvr_ledger::{DeploymentRecordStore, FileRecordStore, InMemoryRecordStore};
use cvr_store::{FsPayloadStore, InMemoryPayloadStore, PayloadStore};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Contract Version Registry server.
pub struct CvrServer {
    config: ServerConfig,
}

impl CvrServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the configured stores and assemble the deployment service.
    pub async fn build_service(&self) -> ServerResult<DeploymentService> {
        let records: Arc<dyn DeploymentRecordStore> = match &self.config.records_path {
            Some(path) => Arc::new(FileRecordStore::open(path).await?),
            None => Arc::new(InMemoryRecordStore::new()),
        };

        let strategy = match self.config.strategy {
            StrategyKind::Embedded => PayloadStrategy::Embedded,
            StrategyKind::ContentAddressed => {
                let store: Arc<dyn PayloadStore> = match &self.config.payload_dir {
                    Some(dir) => Arc::new(FsPayloadStore::open(dir).await?),
                    None => Arc::new(InMemoryPayloadStore::new()),
                };
                PayloadStrategy::ContentAddressed(store)
            }
        };

        info!(
            strategy = %self.config.strategy,
            durable_records = self.config.records_path.is_some(),
            "deployment service ready"
        );
        Ok(DeploymentService::new(
            records,
            strategy,
            self.config.service_config(),
        ))
    }

    /// Build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(AppState::new(self.build_service().await?)))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "CVR server listening");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = CvrServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[tokio::test]
    async fn builds_in_memory_service() {
        let server = CvrServer::new(ServerConfig::default());
        let service = server.build_service().await.unwrap();
        assert_eq!(service.strategy().kind(), StrategyKind::Embedded);
    }

    #[tokio::test]
    async fn builds_durable_content_addressed_service() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            strategy: StrategyKind::ContentAddressed,
            payload_dir: Some(dir.path().join("payloads")),
            records_path: Some(dir.path().join("records.jsonl")),
            ..ServerConfig::default()
        };
        let server = CvrServer::new(config);
        let service = server.build_service().await.unwrap();
        assert_eq!(service.strategy().kind(), StrategyKind::ContentAddressed);
        assert!(dir.path().join("payloads").is_dir());
        assert!(dir.path().join("records.jsonl").exists());
    }
}
