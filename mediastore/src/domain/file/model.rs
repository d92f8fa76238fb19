use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::repository::CatalogError;

pub type FileId = Uuid;

/// Lifecycle of a stored object. Only `Pending` ever moves, and only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Complete,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Complete => "complete",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FileStatus::Pending),
            "complete" => Ok(FileStatus::Complete),
            "failed" => Ok(FileStatus::Failed),
            other => Err(format!("unknown file status `{other}`")),
        }
    }
}

/// Logical bucket of a stored object. Audio and cover images are served by
/// separate routes and never resolve through each other's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
        }
    }

    /// Multipart field carrying this kind of file.
    pub fn field_name(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audioFile",
            MediaKind::Image => "coverImage",
        }
    }

    pub fn default_content_type(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Image => "image/jpeg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(MediaKind::Audio),
            "image" => Ok(MediaKind::Image),
            other => Err(format!("unknown media kind `{other}`")),
        }
    }
}

/// Everything known about a file before its first byte arrives.
#[derive(Debug, Clone)]
pub struct FileDraft {
    pub filename: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub kind: MediaKind,
    pub chunk_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub filename: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub kind: MediaKind,
    pub total_length: u64,
    pub chunk_size: u32,
    pub chunk_count: u32,
    pub status: FileStatus,
    /// `sha256:<hex>` of the whole payload, set on completion.
    pub digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn is_complete(&self) -> bool {
        self.status == FileStatus::Complete
    }
}

#[derive(Debug, FromRow)]
pub(super) struct FileRow {
    pub id: String,
    pub filename: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub kind: String,
    pub total_length: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub status: String,
    pub digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = CatalogError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| CatalogError::Corrupt {
            id: row.id.clone(),
            reason,
        };
        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(e.to_string()))?;
        let kind: MediaKind = row.kind.parse().map_err(corrupt)?;
        let status: FileStatus = row.status.parse().map_err(corrupt)?;
        let total_length =
            u64::try_from(row.total_length).map_err(|e| corrupt(format!("total_length: {e}")))?;
        let chunk_size = u32::try_from(row.chunk_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| corrupt(format!("chunk_size {}", row.chunk_size)))?;
        let chunk_count =
            u32::try_from(row.chunk_count).map_err(|e| corrupt(format!("chunk_count: {e}")))?;

        Ok(FileRecord {
            id,
            filename: row.filename,
            original_name: row.original_name,
            content_type: row.content_type,
            kind,
            total_length,
            chunk_size,
            chunk_count,
            status,
            digest: row.digest,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}
