use bytes::Bytes;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::storage::{ChunkStore, StorageError, StorageResult};

/// Chunks kept in the `chunks` table of the catalog database.
///
/// The pool is opened with `synchronous = FULL`, so a committed insert is on
/// disk before the write is acknowledged. SQLite serializes writers itself.
pub struct SqliteChunkStore {
    pool: Arc<SqlitePool>,
}

impl SqliteChunkStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn write_chunk(&self, file_id: Uuid, seq: u32, payload: Bytes) -> StorageResult<()> {
        let result = sqlx::query(
            "INSERT INTO chunks (file_id, seq, length, data) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (file_id, seq) DO NOTHING",
        )
        .bind(file_id.to_string())
        .bind(seq as i64)
        .bind(payload.len() as i64)
        .bind(payload.as_ref())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            let existing: Vec<u8> =
                sqlx::query_scalar("SELECT data FROM chunks WHERE file_id = $1 AND seq = $2")
                    .bind(file_id.to_string())
                    .bind(seq as i64)
                    .fetch_one(self.pool.as_ref())
                    .await?;
            if existing != payload.as_ref() {
                return Err(StorageError::Conflict { file_id, seq });
            }
        }
        Ok(())
    }

    async fn read_chunk(&self, file_id: Uuid, seq: u32) -> StorageResult<Bytes> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM chunks WHERE file_id = $1 AND seq = $2")
            .bind(file_id.to_string())
            .bind(seq as i64)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(Bytes::from)
            .ok_or(StorageError::NotFound { file_id, seq })
    }

    async fn delete_file(&self, file_id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM chunks WHERE file_id = $1")
            .bind(file_id.to_string())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::db::connect_pool;

    async fn store() -> SqliteChunkStore {
        let pool = connect_pool("sqlite::memory:").await.unwrap();
        SqliteChunkStore::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_roundtrip_and_delete() {
        let store = store().await;
        let id = Uuid::new_v4();
        store
            .write_chunk(id, 0, Bytes::from_static(b"head"))
            .await
            .unwrap();
        store
            .write_chunk(id, 1, Bytes::from_static(b"tail"))
            .await
            .unwrap();
        assert_eq!(
            store.read_chunk(id, 1).await.unwrap(),
            Bytes::from_static(b"tail")
        );

        store.delete_file(id).await.unwrap();
        assert!(matches!(
            store.read_chunk(id, 0).await,
            Err(StorageError::NotFound { seq: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_idempotent_and_conflicting_writes() {
        let store = store().await;
        let id = Uuid::new_v4();
        store
            .write_chunk(id, 0, Bytes::from_static(b"one"))
            .await
            .unwrap();
        store
            .write_chunk(id, 0, Bytes::from_static(b"one"))
            .await
            .unwrap();
        assert!(matches!(
            store.write_chunk(id, 0, Bytes::from_static(b"two")).await,
            Err(StorageError::Conflict { seq: 0, .. })
        ));
    }
}
