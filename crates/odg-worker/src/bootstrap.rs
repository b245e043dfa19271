//! Wiring from configuration to a client and a task registry.

use std::sync::Arc;

use odg_api::{ApiError, DynDeliveryService, OdgClient};
use odg_tasks::{
    PgExtractor, ReconcileMetrics, RecorderMetrics, RegistryError, TaskRegistry, default_registry,
};
use sqlx_postgres::PgPool;

use crate::config::{AuthMethod, OdgConfig};

/// Builds the API client described by `config`.
pub fn build_client(config: &OdgConfig) -> Result<OdgClient, ApiError> {
    let mut builder = OdgClient::builder(config.endpoint.clone()).timeout(config.timeout());

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }

    if config.auth.method == Some(AuthMethod::Github) {
        builder = builder.github_authentication(
            config.auth.github.url.clone(),
            config.auth.github.token.clone(),
        );
    }

    builder.build()
}

/// Registers every built-in task over the inventory pool and `client`.
pub fn build_registry(pool: PgPool, client: OdgClient) -> Result<TaskRegistry, RegistryError> {
    let extractor = Arc::new(PgExtractor::new(pool));
    let remote: DynDeliveryService = Arc::new(client);
    let metrics: Arc<dyn ReconcileMetrics> = Arc::new(RecorderMetrics);
    default_registry(extractor, remote, metrics)
}
