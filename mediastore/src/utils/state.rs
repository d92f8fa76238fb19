use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::{Config, StorageBackend};
use crate::domain::file::{FileCatalog, SqliteFileCatalog};
use crate::service::stream::RangeStreamer;
use crate::service::upload::UploadPipeline;
use crate::storage::ChunkStore;
use crate::storage::driver::database::SqliteChunkStore;
use crate::storage::driver::filesystem::FilesystemChunkStore;
use crate::storage::driver::memory::InMemoryChunkStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChunkStore>,
    pub catalog: Arc<dyn FileCatalog>,
    pub uploader: Arc<UploadPipeline>,
    pub streamer: Arc<RangeStreamer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, pool: Arc<SqlitePool>) -> Self {
        let store: Arc<dyn ChunkStore> = match config.storage {
            StorageBackend::Filesystem => Arc::new(FilesystemChunkStore::new(&config.root_dir)),
            StorageBackend::Database => Arc::new(SqliteChunkStore::new(pool.clone())),
            StorageBackend::Memory => Arc::new(InMemoryChunkStore::new()),
        };
        tracing::info!(backend = %config.storage, "chunk store selected");
        let catalog = Arc::new(SqliteFileCatalog::new(pool));
        Self::with_backends(config, store, catalog)
    }

    pub fn with_backends(
        config: Config,
        store: Arc<dyn ChunkStore>,
        catalog: Arc<dyn FileCatalog>,
    ) -> Self {
        let uploader = UploadPipeline::new(
            store.clone(),
            catalog.clone(),
            config.chunk_size,
            config.upload_concurrency,
        );
        let streamer = RangeStreamer::new(store.clone(), catalog.clone());
        AppState {
            store,
            catalog,
            uploader: Arc::new(uploader),
            streamer: Arc::new(streamer),
            config: Arc::new(config),
        }
    }
}
