//! In-process deployment: one connection manager plus the provider its
//! clients map regions through.

use std::sync::Arc;

use shmdb_backend::{Backend, MemoryBackend};
use shmdb_client::{Client, ClientConfig};
use shmdb_config::{RegionBacking, ShmdbConfig};
use shmdb_server::{ConnectionManager, ServerConfig};
use shmdb_shm::{AnonymousRegions, FileRegions, RegionProvider};
use shmdb_types::Schema;

use crate::error::Result;

pub struct Shmdb<B: Backend> {
    manager: ConnectionManager<B>,
    client_config: ClientConfig,
}

impl Shmdb<MemoryBackend> {
    /// An in-memory store reachable through anonymous regions, with
    /// `schema` installed.
    pub fn in_process(schema: Schema) -> Result<Self> {
        let mut config = ShmdbConfig::default();
        config.schema.location.clone_from(&schema.location);
        config.schema.tables = schema.tables;
        Self::with_config(Arc::new(MemoryBackend::new()), &config)
    }
}

impl<B: Backend> Shmdb<B> {
    /// Builds the region provider and manager `config` describes. The
    /// configured schema, if it names any tables, is installed right away.
    pub fn with_config(backend: Arc<B>, config: &ShmdbConfig) -> Result<Self> {
        config.validate()?;

        let provider: Arc<dyn RegionProvider> = match config.region.backing {
            RegionBacking::Anonymous => Arc::new(AnonymousRegions::new()),
            RegionBacking::File => Arc::new(FileRegions::new(&config.region.directory)?),
        };
        let manager = ConnectionManager::new(backend, provider, ServerConfig::from(config))?;
        if !config.schema.tables.is_empty() {
            manager.install_schema(config.schema.to_schema())?;
        }

        tracing::info!(
            backing = manager.provider().name(),
            capacity = config.region.capacity,
            "shmdb ready"
        );
        Ok(Self {
            manager,
            client_config: ClientConfig::from(config),
        })
    }

    pub fn install_schema(&self, schema: Schema) -> Result<()> {
        Ok(self.manager.install_schema(schema)?)
    }

    /// Spawns a session and connects a client to it.
    pub fn connect(&self) -> Result<Client> {
        let handle = self.manager.spawn()?;
        let client = Client::connect(self.manager.provider().as_ref(), &handle, &self.client_config)?;
        Ok(client)
    }

    pub fn manager(&self) -> &ConnectionManager<B> {
        &self.manager
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.client_config
    }
}

impl<B: Backend> std::fmt::Debug for Shmdb<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shmdb")
            .field("manager", &self.manager)
            .field("client_config", &self.client_config)
            .finish()
    }
}
