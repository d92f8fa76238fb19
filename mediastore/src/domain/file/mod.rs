mod layout;
mod model;
mod repository;

pub use layout::{ChunkLayout, ChunkSpan};
pub use model::{FileDraft, FileId, FileRecord, FileStatus, MediaKind};
pub use repository::{CatalogError, FileCatalog, SqliteFileCatalog};
