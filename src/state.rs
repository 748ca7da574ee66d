use std::sync::Arc;

use anyhow::Context;

use crate::config::{AppConfig, StoreBackend};
use crate::db;
use crate::expressions::JobCoordinator;
use crate::grpc::{ComputeClient, GrpcComputeClient};
use crate::storage::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub compute: Arc<dyn ComputeClient>,
    pub jobs: JobCoordinator,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Opens the configured store (migrating it first) and a lazy channel to
    /// the agent.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match &config.store {
            StoreBackend::Postgres { database_url } => {
                let pool = db::connect(database_url).await?;
                let applied = db::run_migrations(&pool).await?;
                tracing::info!(?applied, "database ready");
                Arc::new(PgStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let compute = Arc::new(
            GrpcComputeClient::connect_lazy(&config.agent_addr)
                .with_context(|| format!("invalid AGENT_ADDR {:?}", config.agent_addr))?,
        ) as Arc<dyn ComputeClient>;

        Ok(Self::from_parts(store, compute, Arc::new(config)))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        compute: Arc<dyn ComputeClient>,
        config: Arc<AppConfig>,
    ) -> Self {
        let jobs = JobCoordinator::new(store.clone(), compute.clone(), config.job_timeout);
        Self {
            store,
            compute,
            jobs,
            config,
        }
    }
}
