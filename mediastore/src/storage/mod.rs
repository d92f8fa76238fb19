//! Chunk-addressable storage.
//!
//! A chunk is addressed by `(file id, sequence number)` and is write-once:
//! rewriting it with the same payload is a no-op, rewriting it with a
//! different payload is a conflict. Writers are serialized per chunk, never
//! per file, so the chunks of one upload can land concurrently.

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

pub mod driver;
pub mod lock;
pub mod paths;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("chunk {seq} of file {file_id} not found")]
    NotFound { file_id: Uuid, seq: u32 },

    #[error("chunk {seq} of file {file_id} already holds a different payload")]
    Conflict { file_id: Uuid, seq: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Durably stores one chunk. Returns only once the payload survives a crash.
    async fn write_chunk(&self, file_id: Uuid, seq: u32, payload: Bytes) -> StorageResult<()>;

    async fn read_chunk(&self, file_id: Uuid, seq: u32) -> StorageResult<Bytes>;

    /// Removes every chunk of `file_id`. Unknown or partially written files are fine.
    async fn delete_file(&self, file_id: Uuid) -> StorageResult<()>;
}
