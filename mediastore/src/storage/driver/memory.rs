//! Process-local chunk store for development and tests.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::storage::{ChunkStore, StorageError, StorageResult};

type ChunkKey = (Uuid /*file_id*/, u32 /*seq*/);

#[derive(Default)]
pub struct InMemoryChunkStore {
    map: RwLock<HashMap<ChunkKey, Bytes>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks currently held for `file_id`.
    pub async fn chunk_count(&self, file_id: Uuid) -> usize {
        self.map
            .read()
            .await
            .keys()
            .filter(|(id, _)| *id == file_id)
            .count()
    }

    /// Ids of every file holding at least one chunk.
    pub async fn file_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.map.read().await.keys().map(|(id, _)| *id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[async_trait::async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn write_chunk(&self, file_id: Uuid, seq: u32, payload: Bytes) -> StorageResult<()> {
        let mut map = self.map.write().await;
        match map.get(&(file_id, seq)) {
            Some(existing) if *existing == payload => Ok(()),
            Some(_) => Err(StorageError::Conflict { file_id, seq }),
            None => {
                map.insert((file_id, seq), payload);
                Ok(())
            }
        }
    }

    async fn read_chunk(&self, file_id: Uuid, seq: u32) -> StorageResult<Bytes> {
        self.map
            .read()
            .await
            .get(&(file_id, seq))
            .cloned()
            .ok_or(StorageError::NotFound { file_id, seq })
    }

    async fn delete_file(&self, file_id: Uuid) -> StorageResult<()> {
        self.map.write().await.retain(|(id, _), _| *id != file_id);
        Ok(())
    }
}
