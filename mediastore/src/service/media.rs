use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Extension, Multipart, State};
use axum::http::StatusCode;
use axum::http::header::{HeaderMap, RANGE};
use axum::response::IntoResponse;
use serde::Serialize;

use super::range::{RangeSpec, parse_range_header};
use super::stream::Delivery;
use super::upload::NewUpload;
use crate::domain::file::{FileId, FileRecord, MediaKind};
use crate::error::AppError;
use crate::utils::state::AppState;
use crate::utils::validation::{check_media, file_extension};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_id: FileId,
    pub filename: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub kind: MediaKind,
    pub length: u64,
    pub chunk_count: u32,
    pub digest: Option<String>,
    pub stream_url: String,
}

impl From<&FileRecord> for FileDescriptor {
    fn from(record: &FileRecord) -> Self {
        FileDescriptor {
            file_id: record.id,
            filename: record.filename.clone(),
            original_name: record.original_name.clone(),
            content_type: record.content_type.clone(),
            kind: record.kind,
            length: record.total_length,
            chunk_count: record.chunk_count,
            digest: record.digest.clone(),
            stream_url: format!("/api/media/stream/{}/{}", record.kind, record.id),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaUploadResponse {
    success: bool,
    message: &'static str,
    audio: FileDescriptor,
    cover_image: Option<FileDescriptor>,
}

#[derive(Serialize)]
struct FileResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    file: FileDescriptor,
}

/// POST /api/media/upload
///
/// `audioFile` is required, `coverImage` optional. If anything fails after
/// one file was stored, or the request is dropped before it answers, that
/// file is discarded again.
pub async fn upload_media_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut staged = DiscardOnDrop::new(state.clone());
    let mut audio: Option<FileRecord> = None;
    let mut cover: Option<FileRecord> = None;

    let outcome = async {
        while let Some(field) = next_field(&mut multipart).await? {
            let (kind, slot) = match field.name() {
                Some("audioFile") => (MediaKind::Audio, &mut audio),
                Some("coverImage") => (MediaKind::Image, &mut cover),
                _ => return Err(AppError::Validation("Unexpected field name".to_string())),
            };
            if slot.is_some() {
                return Err(AppError::Validation(format!(
                    "Only one `{}` field is allowed",
                    kind.field_name()
                )));
            }
            let record = store_field(&state, kind, field).await?;
            staged.track(record.id);
            *slot = Some(record);
        }
        if audio.is_none() {
            return Err(AppError::Validation("Audio file is required".to_string()));
        }
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(err) = outcome {
        discard(&state, &staged.stored).await;
        staged.disarm();
        return Err(err);
    }
    staged.disarm();
    let Some(audio) = audio else {
        return Err(AppError::Validation("Audio file is required".to_string()));
    };

    Ok((
        StatusCode::CREATED,
        Json(MediaUploadResponse {
            success: true,
            message: "Media uploaded successfully",
            audio: FileDescriptor::from(&audio),
            cover_image: cover.as_ref().map(FileDescriptor::from),
        }),
    ))
}

/// POST /api/media/audio
pub async fn upload_audio_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    upload_single(state, multipart, MediaKind::Audio).await
}

/// POST /api/media/image
pub async fn upload_image_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    upload_single(state, multipart, MediaKind::Image).await
}

async fn upload_single(
    state: Arc<AppState>,
    mut multipart: Multipart,
    kind: MediaKind,
) -> Result<impl IntoResponse, AppError> {
    let mut staged = DiscardOnDrop::new(state.clone());
    let mut stored: Option<FileRecord> = None;

    let outcome = async {
        while let Some(field) = next_field(&mut multipart).await? {
            if field.name() != Some(kind.field_name()) {
                return Err(AppError::Validation("Unexpected field name".to_string()));
            }
            if stored.is_some() {
                return Err(AppError::Validation(format!(
                    "Only one `{}` field is allowed",
                    kind.field_name()
                )));
            }
            let record = store_field(&state, kind, field).await?;
            staged.track(record.id);
            stored = Some(record);
        }
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(err) = outcome {
        discard(&state, &staged.stored).await;
        staged.disarm();
        return Err(err);
    }
    staged.disarm();
    let record = stored.ok_or_else(|| {
        AppError::Validation(match kind {
            MediaKind::Audio => "Audio file is required".to_string(),
            MediaKind::Image => "Cover image is required".to_string(),
        })
    })?;

    Ok((
        StatusCode::CREATED,
        Json(FileResponse {
            success: true,
            message: Some("File uploaded successfully"),
            file: FileDescriptor::from(&record),
        }),
    ))
}

async fn next_field<'a>(multipart: &'a mut Multipart) -> Result<Option<Field<'a>>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))
}

async fn store_field(
    state: &AppState,
    kind: MediaKind,
    field: Field<'_>,
) -> Result<FileRecord, AppError> {
    let original_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);
    check_media(kind, content_type.as_deref(), original_name.as_deref())?;

    let upload = NewUpload {
        filename: random_filename(original_name.as_deref()),
        original_name,
        content_type: content_type.unwrap_or_else(|| kind.default_content_type().to_string()),
        kind,
        max_length: state.config.max_size(kind),
    };
    state.uploader.upload(upload, field).await
}

/// 32 random hex digits, keeping the client's extension.
fn random_filename(original_name: Option<&str>) -> String {
    let stem = hex::encode(rand::random::<[u8; 16]>());
    match original_name.and_then(file_extension) {
        Some(ext) => format!("{stem}{ext}"),
        None => stem,
    }
}

async fn discard(state: &AppState, file_ids: &[FileId]) {
    for &file_id in file_ids {
        if let Err(err) = state.store.delete_file(file_id).await {
            tracing::error!(%file_id, error = %err, "could not delete chunks of discarded file");
        }
        if let Err(err) = state.catalog.delete(file_id).await {
            tracing::error!(%file_id, error = %err, "could not delete discarded file record");
        }
        tracing::info!(%file_id, "discarded file of a rejected upload");
    }
}

/// Files stored by a request that has not answered yet. Dropping the guard
/// armed discards them in the background.
struct DiscardOnDrop {
    state: Arc<AppState>,
    stored: Vec<FileId>,
}

impl DiscardOnDrop {
    fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            stored: Vec::new(),
        }
    }

    fn track(&mut self, file_id: FileId) {
        self.stored.push(file_id);
    }

    fn disarm(mut self) {
        self.stored.clear();
    }
}

impl Drop for DiscardOnDrop {
    fn drop(&mut self) {
        if self.stored.is_empty() {
            return;
        }
        let file_ids = std::mem::take(&mut self.stored);
        let state = self.state.clone();
        tracing::warn!(files = file_ids.len(), "upload request dropped, discarding stored files");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { discard(&state, &file_ids).await });
        }
    }
}

fn requested_range(headers: &HeaderMap) -> Option<RangeSpec> {
    headers.get(RANGE).map(|value| {
        value
            .to_str()
            .map(parse_range_header)
            .unwrap_or(RangeSpec::Unsatisfiable)
    })
}

/// GET /api/media/stream/audio/{file_id}
pub async fn stream_audio_handler(
    State(state): State<Arc<AppState>>,
    Extension(file_id): Extension<FileId>,
    headers: HeaderMap,
) -> Result<Delivery, AppError> {
    state
        .streamer
        .open(file_id, requested_range(&headers), Some(MediaKind::Audio))
        .await
}

/// GET /api/media/stream/image/{file_id}
pub async fn stream_image_handler(
    State(state): State<Arc<AppState>>,
    Extension(file_id): Extension<FileId>,
    headers: HeaderMap,
) -> Result<Delivery, AppError> {
    state
        .streamer
        .open(file_id, requested_range(&headers), Some(MediaKind::Image))
        .await
}

/// GET /api/media/{file_id}
pub async fn describe_handler(
    State(state): State<Arc<AppState>>,
    Extension(file_id): Extension<FileId>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.catalog.get(file_id).await?;
    Ok(Json(FileResponse {
        success: true,
        message: None,
        file: FileDescriptor::from(&record),
    }))
}
