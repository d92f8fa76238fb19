use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::{File, create_dir_all, read, remove_dir_all, remove_file, rename, try_exists};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::storage::lock::KeyedLock;
use crate::storage::paths::PathManager;
use crate::storage::{ChunkStore, StorageError, StorageResult};

/// One file per chunk under `<root>/chunks`. A chunk is written to a staging
/// file, synced and renamed, so a crash never leaves a torn chunk behind.
pub struct FilesystemChunkStore {
    path_manager: PathManager,
    locks: KeyedLock<(Uuid, u32)>,
    dir_locks: KeyedLock<Uuid>,
}

impl FilesystemChunkStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        FilesystemChunkStore {
            path_manager: PathManager::new(root),
            locks: KeyedLock::new(),
            dir_locks: KeyedLock::new(),
        }
    }

    /// Creates the directory of `file_id` and syncs every ancestor up to the
    /// store root, so the new entries survive a crash. Returns the
    /// directories that were created.
    async fn create_file_dir(&self, file_id: Uuid) -> std::io::Result<Vec<PathBuf>> {
        let _guard = self.dir_locks.acquire(file_id).await;
        let dir = self.path_manager.file_path(&file_id);

        let mut missing = Vec::new();
        let mut cursor = Some(dir.as_path());
        while let Some(path) = cursor {
            if try_exists(path).await? {
                break;
            }
            missing.push(path.to_path_buf());
            cursor = path.parent();
        }
        if missing.is_empty() {
            return Ok(missing);
        }

        create_dir_all(&dir).await?;
        // A shared shard may exist already but still be unsynced by its creator.
        let chunks = self.path_manager.chunks_path();
        let mut cursor = dir.parent();
        while let Some(parent) = cursor {
            sync_dir(parent).await?;
            if !parent.starts_with(&chunks) {
                break;
            }
            cursor = parent.parent();
        }
        tracing::debug!(%file_id, created = missing.len(), "chunk directory created");
        Ok(missing)
    }

    async fn existing_chunk(&self, file_id: Uuid, seq: u32) -> StorageResult<Option<Vec<u8>>> {
        match read(self.path_manager.chunk_path(&file_id, seq)).await {
            Ok(buf) => Ok(Some(buf)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl ChunkStore for FilesystemChunkStore {
    async fn write_chunk(&self, file_id: Uuid, seq: u32, payload: Bytes) -> StorageResult<()> {
        let _guard = self.locks.acquire((file_id, seq)).await;

        if let Some(existing) = self.existing_chunk(file_id, seq).await? {
            if existing == payload.as_ref() {
                tracing::debug!(%file_id, seq, "chunk already stored with identical payload");
                return Ok(());
            }
            return Err(StorageError::Conflict { file_id, seq });
        }

        let dir = self.path_manager.file_path(&file_id);
        self.create_file_dir(file_id).await?;

        let staging = self.path_manager.staging_path(&file_id, seq);
        let result = async {
            let mut file = File::create(&staging).await?;
            file.write_all(&payload).await?;
            file.sync_all().await?;
            drop(file);
            rename(&staging, self.path_manager.chunk_path(&file_id, seq)).await?;
            sync_dir(&dir).await
        }
        .await;

        if let Err(e) = result {
            let _ = remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_chunk(&self, file_id: Uuid, seq: u32) -> StorageResult<Bytes> {
        self.existing_chunk(file_id, seq)
            .await?
            .map(Bytes::from)
            .ok_or(StorageError::NotFound { file_id, seq })
    }

    async fn delete_file(&self, file_id: Uuid) -> StorageResult<()> {
        match remove_dir_all(self.path_manager.file_path(&file_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// The rename is only durable once the directory entry itself is synced.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
