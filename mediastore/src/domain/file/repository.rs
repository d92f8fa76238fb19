use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::layout::ChunkLayout;
use super::model::{FileDraft, FileId, FileRecord, FileRow, FileStatus};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("file {0} not found")]
    NotFound(FileId),

    #[error("file {id} is {status}, not pending")]
    NotPending { id: FileId, status: FileStatus },

    #[error("could not allocate a file record: {0}")]
    Allocation(String),

    #[error("chunk layout of file {id} is inconsistent: {reason}")]
    Layout { id: FileId, reason: String },

    #[error("file record {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

type Result<T> = std::result::Result<T, CatalogError>;

/// Metadata records of stored files.
///
/// Status changes are compare-and-swap transitions out of `Pending`; at most
/// one of `mark_complete` / `mark_failed` ever takes effect for a file.
#[async_trait::async_trait]
pub trait FileCatalog: Send + Sync {
    /// Inserts a fresh `Pending` record and returns its id.
    async fn create_pending(&self, draft: &FileDraft) -> Result<FileId>;

    /// `Pending -> Complete`. Fails with `NotPending` when the record already
    /// moved, and with `Layout` when `chunk_count` cannot hold `total_length`
    /// bytes at the record's chunk size.
    async fn mark_complete(
        &self,
        id: FileId,
        total_length: u64,
        chunk_count: u32,
        digest: Option<&str>,
    ) -> Result<()>;

    /// `Pending -> Failed`. Idempotent; a `Complete` record is left untouched.
    async fn mark_failed(&self, id: FileId) -> Result<()>;

    /// Reader-facing lookup: anything but a `Complete` record is `NotFound`.
    async fn get(&self, id: FileId) -> Result<FileRecord> {
        let record = self.get_any(id).await?;
        if record.is_complete() {
            Ok(record)
        } else {
            Err(CatalogError::NotFound(id))
        }
    }

    /// Lookup regardless of status, for the upload pipeline.
    async fn get_any(&self, id: FileId) -> Result<FileRecord>;

    /// Drops the record. Its chunks must be deleted through the chunk store.
    async fn delete(&self, id: FileId) -> Result<()>;
}

#[derive(Debug)]
pub struct SqliteFileCatalog {
    pool: Arc<SqlitePool>,
}

impl SqliteFileCatalog {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FileCatalog for SqliteFileCatalog {
    async fn create_pending(&self, draft: &FileDraft) -> Result<FileId> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO files (id, filename, original_name, content_type, kind, chunk_size, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id.to_string())
        .bind(&draft.filename)
        .bind(&draft.original_name)
        .bind(&draft.content_type)
        .bind(draft.kind.as_str())
        .bind(draft.chunk_size as i64)
        .bind(FileStatus::Pending.as_str())
        .bind(Utc::now())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| CatalogError::Allocation(e.to_string()))?;
        Ok(id)
    }

    async fn mark_complete(
        &self,
        id: FileId,
        total_length: u64,
        chunk_count: u32,
        digest: Option<&str>,
    ) -> Result<()> {
        let record = self.get_any(id).await?;
        if record.status != FileStatus::Pending {
            return Err(CatalogError::NotPending {
                id,
                status: record.status,
            });
        }

        let expected = ChunkLayout::new(record.chunk_size).chunk_count(total_length);
        if expected != chunk_count as u64 {
            return Err(CatalogError::Layout {
                id,
                reason: format!(
                    "{total_length} bytes in {} byte chunks need {expected} chunks, got {chunk_count}",
                    record.chunk_size
                ),
            });
        }
        let stored_length = i64::try_from(total_length).map_err(|_| CatalogError::Layout {
            id,
            reason: format!("total length {total_length} is out of range"),
        })?;

        let result = sqlx::query(
            "UPDATE files SET status = $1, total_length = $2, chunk_count = $3, digest = $4, completed_at = $5 \
             WHERE id = $6 AND status = $7",
        )
        .bind(FileStatus::Complete.as_str())
        .bind(stored_length)
        .bind(chunk_count as i64)
        .bind(digest)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(FileStatus::Pending.as_str())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            // Lost the race against another transition.
            let current = self.get_any(id).await?;
            return Err(CatalogError::NotPending {
                id,
                status: current.status,
            });
        }
        Ok(())
    }

    async fn mark_failed(&self, id: FileId) -> Result<()> {
        let result = sqlx::query("UPDATE files SET status = $1 WHERE id = $2 AND status = $3")
            .bind(FileStatus::Failed.as_str())
            .bind(id.to_string())
            .bind(FileStatus::Pending.as_str())
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            let current = self.get_any(id).await?;
            if current.status == FileStatus::Complete {
                tracing::warn!(file_id = %id, "ignoring failure of an already complete file");
            }
        }
        Ok(())
    }

    async fn get_any(&self, id: FileId) -> Result<FileRecord> {
        sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(CatalogError::NotFound(id))?
            .try_into()
    }

    async fn delete(&self, id: FileId) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id.to_string())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
