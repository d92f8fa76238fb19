use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;

use super::range::RangeSpec;
use crate::domain::file::{ChunkLayout, ChunkSpan, FileCatalog, FileId, FileRecord, MediaKind};
use crate::error::AppError;
use crate::storage::ChunkStore;

const CACHE_POLICY: &str = "public, max-age=31536000";

/// A resolved retrieval: status line, headers and a lazy body.
pub struct Delivery {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ChunkBody,
}

impl IntoResponse for Delivery {
    fn into_response(self) -> Response {
        (
            self.status,
            self.headers,
            Body::from_stream(self.body.into_stream()),
        )
            .into_response()
    }
}

pub struct RangeStreamer {
    store: Arc<dyn ChunkStore>,
    catalog: Arc<dyn FileCatalog>,
}

impl RangeStreamer {
    pub fn new(store: Arc<dyn ChunkStore>, catalog: Arc<dyn FileCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Resolves `file_id` and prepares the body for `range`, or the whole
    /// file when no range is given. With `kind` set, records of another kind
    /// are reported as not found.
    pub async fn open(
        &self,
        file_id: FileId,
        range: Option<RangeSpec>,
        kind: Option<MediaKind>,
    ) -> Result<Delivery, AppError> {
        let record = self.catalog.get(file_id).await?;
        if let Some(kind) = kind {
            if record.kind != kind {
                return Err(AppError::NotFound(format!("{kind} file {file_id}")));
            }
        }

        let total = record.total_length;
        let layout = ChunkLayout::new(record.chunk_size);
        let mut headers = base_headers(&record);

        let delivery = match range {
            None => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(total));
                let span = if total == 0 {
                    None
                } else {
                    layout.span(0, total - 1)
                };
                Delivery {
                    status: StatusCode::OK,
                    headers,
                    body: ChunkBody::new(self.store.clone(), &record, span),
                }
            }
            Some(spec) => {
                let unsatisfiable = AppError::RangeNotSatisfiable {
                    total_length: total,
                };
                let Some((start, end)) = spec.resolve(total) else {
                    return Err(unsatisfiable);
                };
                let span = layout.span(start, end).ok_or(unsatisfiable)?;
                let content_range = format!("bytes {start}-{end}/{total}");
                headers.insert(CONTENT_LENGTH, HeaderValue::from(end - start + 1));
                if let Ok(value) = HeaderValue::from_str(&content_range) {
                    headers.insert(CONTENT_RANGE, value);
                }
                Delivery {
                    status: StatusCode::PARTIAL_CONTENT,
                    headers,
                    body: ChunkBody::new(self.store.clone(), &record, Some(span)),
                }
            }
        };

        tracing::info!(
            %file_id,
            status = delivery.status.as_u16(),
            range = ?range,
            "stream opened"
        );
        Ok(delivery)
    }
}

fn base_headers(record: &FileRecord) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&record.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_POLICY));
    if let Some(etag) = record
        .digest
        .as_ref()
        .map(|digest| format!("\"{digest}\""))
        .and_then(|etag| HeaderValue::from_str(&etag).ok())
    {
        headers.insert(ETAG, etag);
    }
    headers
}

/// Pull-based producer of the chunks covering one byte span.
///
/// Each `next` reads exactly one chunk from the store, trimmed to the span.
/// A failed or malformed chunk yields a single `StreamTerminated` error and
/// ends the body; nothing is retried.
pub struct ChunkBody {
    store: Arc<dyn ChunkStore>,
    file_id: FileId,
    layout: ChunkLayout,
    total_length: u64,
    first_seq: u32,
    next_seq: u32,
    // exclusive
    end_seq: u32,
    head_offset: usize,
    tail_len: usize,
    finished: bool,
}

impl ChunkBody {
    fn new(store: Arc<dyn ChunkStore>, record: &FileRecord, span: Option<ChunkSpan>) -> Self {
        let (first_seq, end_seq, head_offset, tail_len) = match span {
            Some(span) => (
                span.first_chunk,
                span.last_chunk + 1,
                span.head_offset,
                span.tail_len,
            ),
            None => (0, 0, 0, 0),
        };
        Self {
            store,
            file_id: record.id,
            layout: ChunkLayout::new(record.chunk_size),
            total_length: record.total_length,
            first_seq,
            next_seq: first_seq,
            end_seq,
            head_offset,
            tail_len,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished || self.next_seq >= self.end_seq
    }

    pub async fn next(&mut self) -> Option<Result<Bytes, AppError>> {
        if self.is_finished() {
            self.finished = true;
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;

        let chunk = match self.store.read_chunk(self.file_id, seq).await {
            Ok(chunk) => chunk,
            Err(err) => return Some(Err(self.terminate(seq, err.to_string()))),
        };
        let expected = self.layout.chunk_len(self.total_length, seq);
        if expected != Some(chunk.len() as u64) {
            let reason = format!("holds {} bytes, expected {expected:?}", chunk.len());
            return Some(Err(self.terminate(seq, reason)));
        }

        let start = if seq == self.first_seq {
            self.head_offset
        } else {
            0
        };
        let end = if seq + 1 == self.end_seq {
            self.tail_len
        } else {
            chunk.len()
        };
        Some(Ok(chunk.slice(start..end)))
    }

    /// Stops the body early; later calls to `next` return `None`.
    pub fn release(&mut self) {
        self.finished = true;
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, AppError>> + Send + 'static {
        futures::stream::unfold(self, |mut body| async move {
            body.next().await.map(|item| (item, body))
        })
    }

    fn terminate(&mut self, seq: u32, reason: String) -> AppError {
        self.finished = true;
        tracing::error!(file_id = %self.file_id, seq, %reason, "chunk read failed mid-stream");
        AppError::StreamTerminated(format!("chunk {seq} of file {}: {reason}", self.file_id))
    }
}

impl Drop for ChunkBody {
    fn drop(&mut self) {
        if !self.is_finished() {
            tracing::debug!(
                file_id = %self.file_id,
                next_seq = self.next_seq,
                end_seq = self.end_seq,
                "stream dropped before the last chunk"
            );
        }
    }
}
