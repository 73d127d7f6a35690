use crate::api;
use crate::bootstrap::{self, BootstrapResources};
use crate::config::KinshipConfig;
use crate::database::Database;
use crate::realtime::ChangeHub;
use anyhow::Result;

/// Convenience wrapper that bootstraps the backend once and hands out cloned
/// handles for whichever entrypoint (HTTP server, console) needs them.
pub struct KinshipNode {
    config: KinshipConfig,
    bootstrap: BootstrapResources,
    hub: ChangeHub,
}

impl KinshipNode {
    pub async fn start(config: KinshipConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config).await?;
        let hub = ChangeHub::new();

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            admin_granted = ?bootstrap.admin_granted,
            "kinship node initialized"
        );

        Ok(Self {
            config,
            bootstrap,
            hub,
        })
    }

    /// Returns a snapshot of the node's reusable handles.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            config: self.config.clone(),
            database: self.bootstrap.database.clone(),
            hub: self.hub.clone(),
        }
    }

    /// Runs the REST API server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        let snapshot = self.snapshot();
        api::serve_http(snapshot.config, snapshot.database, snapshot.hub).await
    }

    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }

    pub fn hub(&self) -> ChangeHub {
        self.hub.clone()
    }
}

/// Cloned handles for consumers that do not own the node struct.
#[derive(Clone)]
pub struct NodeSnapshot {
    pub config: KinshipConfig,
    pub database: Database,
    pub hub: ChangeHub,
}
