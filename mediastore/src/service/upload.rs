use std::fmt::Display;
use std::pin::pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, Stream, StreamExt};
use sha2::{Digest, Sha256};

use crate::domain::file::{FileCatalog, FileDraft, FileId, FileRecord, MediaKind};
use crate::error::AppError;
use crate::storage::{ChunkStore, StorageError};

/// What the caller knows about an upload before the first byte arrives.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub filename: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub kind: MediaKind,
    /// Uploads growing past this many bytes are aborted.
    pub max_length: u64,
}

struct Transferred {
    total_length: u64,
    chunk_count: u32,
    digest: String,
}

/// Splits incoming byte streams into fixed-size chunks and publishes the
/// catalog record once every chunk is durable.
pub struct UploadPipeline {
    store: Arc<dyn ChunkStore>,
    catalog: Arc<dyn FileCatalog>,
    chunk_size: u32,
    concurrency: usize,
}

impl UploadPipeline {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        catalog: Arc<dyn FileCatalog>,
        chunk_size: u32,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            chunk_size: chunk_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Consumes `source` into a new file. The returned record is `Complete`;
    /// on any error the record is left `Failed`, including when the returned
    /// future is dropped before it resolves.
    pub async fn upload<S, E>(&self, upload: NewUpload, source: S) -> Result<FileRecord, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display + Send,
    {
        let draft = FileDraft {
            filename: upload.filename,
            original_name: upload.original_name,
            content_type: upload.content_type,
            kind: upload.kind,
            chunk_size: self.chunk_size,
        };
        let file_id = self.catalog.create_pending(&draft).await?;
        tracing::info!(%file_id, kind = %draft.kind, filename = %draft.filename, "upload started");

        let guard = FailOnDrop::new(file_id, self.catalog.clone());
        let outcome = match self.transfer(file_id, upload.max_length, source).await {
            Ok(done) => self
                .catalog
                .mark_complete(
                    file_id,
                    done.total_length,
                    done.chunk_count,
                    Some(&done.digest),
                )
                .await
                .map_err(AppError::from),
            Err(err) => Err(err),
        };

        // The guard stays armed until the record has left `Pending`.
        if let Err(err) = outcome {
            tracing::warn!(%file_id, error = %err, "upload failed");
            if let Err(mark_err) = self.catalog.mark_failed(file_id).await {
                tracing::error!(%file_id, error = %mark_err, "could not mark upload failed");
            }
            guard.disarm();
            return Err(err);
        }
        guard.disarm();

        let record = self.catalog.get(file_id).await?;
        tracing::info!(
            %file_id,
            total_length = record.total_length,
            chunk_count = record.chunk_count,
            "upload complete"
        );
        Ok(record)
    }

    async fn transfer<S, E>(
        &self,
        file_id: FileId,
        max_length: u64,
        source: S,
    ) -> Result<Transferred, AppError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display + Send,
    {
        let chunk_size = self.chunk_size as usize;
        let mut source = pin!(source);
        let mut window = BytesMut::with_capacity(chunk_size);
        let mut hasher = Sha256::new();
        let mut total_length: u64 = 0;
        let mut seq: u32 = 0;
        let mut in_flight: FuturesUnordered<BoxFuture<'_, Result<(), AppError>>> =
            FuturesUnordered::new();

        loop {
            tokio::select! {
                Some(written) = in_flight.next(), if !in_flight.is_empty() => written?,
                item = source.next(), if in_flight.len() < self.concurrency => {
                    let Some(item) = item else { break };
                    let mut data = item.map_err(|e| AppError::SourceInterrupted(e.to_string()))?;

                    total_length += data.len() as u64;
                    if total_length > max_length {
                        return Err(AppError::Validation(format!(
                            "File too large, the limit is {max_length} bytes"
                        )));
                    }
                    hasher.update(&data);

                    while !data.is_empty() {
                        let payload = if window.is_empty() && data.len() >= chunk_size {
                            data.split_to(chunk_size)
                        } else {
                            let take = (chunk_size - window.len()).min(data.len());
                            window.extend_from_slice(&data.split_to(take));
                            if window.len() < chunk_size {
                                continue;
                            }
                            window.split().freeze()
                        };
                        while in_flight.len() >= self.concurrency {
                            if let Some(written) = in_flight.next().await {
                                written?;
                            }
                        }
                        in_flight.push(self.write(file_id, seq, payload).boxed());
                        seq += 1;
                    }
                }
            }
        }

        if !window.is_empty() {
            in_flight.push(self.write(file_id, seq, window.freeze()).boxed());
            seq += 1;
        }
        while let Some(written) = in_flight.next().await {
            written?;
        }

        Ok(Transferred {
            total_length,
            chunk_count: seq,
            digest: format!("sha256:{}", hex::encode(hasher.finalize())),
        })
    }

    async fn write(&self, file_id: FileId, seq: u32, payload: Bytes) -> Result<(), AppError> {
        let len = payload.len();
        self.store
            .write_chunk(file_id, seq, payload)
            .await
            .map_err(|err| match err {
                err @ StorageError::Conflict { .. } => AppError::Conflict(err.to_string()),
                err => AppError::StorageWrite(err.to_string()),
            })?;
        tracing::debug!(%file_id, seq, len, "chunk written");
        Ok(())
    }
}

/// Marks the record failed if the upload future is dropped mid-flight.
struct FailOnDrop {
    file_id: FileId,
    catalog: Option<Arc<dyn FileCatalog>>,
}

impl FailOnDrop {
    fn new(file_id: FileId, catalog: Arc<dyn FileCatalog>) -> Self {
        Self {
            file_id,
            catalog: Some(catalog),
        }
    }

    fn disarm(mut self) {
        self.catalog = None;
    }
}

impl Drop for FailOnDrop {
    fn drop(&mut self) {
        let Some(catalog) = self.catalog.take() else {
            return;
        };
        let file_id = self.file_id;
        tracing::warn!(%file_id, "upload cancelled");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = catalog.mark_failed(file_id).await {
                    tracing::error!(
                        %file_id,
                        error = %err,
                        "could not mark cancelled upload failed"
                    );
                }
            });
        }
    }
}
