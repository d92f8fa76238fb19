use std::fmt;
use std::str::FromStr;

use crate::domain::file::MediaKind;

pub const DEFAULT_CHUNK_SIZE: u32 = 4 * 1024 * 1024;
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_AUDIO_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

/// Which chunk store backend the server writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Filesystem,
    Database,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FILESYSTEM" => Ok(Self::Filesystem),
            "DATABASE" => Ok(Self::Database),
            "MEMORY" => Ok(Self::Memory),
            other => Err(format!(
                "unknown storage backend `{other}`, expected FILESYSTEM, DATABASE or MEMORY"
            )),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filesystem => "FILESYSTEM",
            Self::Database => "DATABASE",
            Self::Memory => "MEMORY",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub root_dir: String,
    pub db_url: String,
    pub chunk_size: u32,
    pub upload_concurrency: usize,
    pub max_audio_size: u64,
    pub max_image_size: u64,
}

impl Config {
    pub fn max_size(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Audio => self.max_audio_size,
            MediaKind::Image => self.max_image_size,
        }
    }

    /// Upper bound for a whole multipart request: one audio file, one cover
    /// image and some room for the multipart framing.
    pub fn request_body_limit(&self) -> usize {
        let framing = 1024 * 1024;
        (self.max_audio_size + self.max_image_size + framing) as usize
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8970,
            storage: StorageBackend::Filesystem,
            root_dir: "/var/lib/mediastore".to_string(),
            db_url: "sqlite:///var/lib/mediastore/catalog.db".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            max_audio_size: DEFAULT_MAX_AUDIO_SIZE,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}
