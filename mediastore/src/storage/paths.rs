// PathManager maps chunk addresses onto the filesystem backend.
//
// The layout under the configured root is:
//
//	<root>
//	└── chunks
//	    └── <first two hex chars of file id>
//	        └── <file id>
//	            ├── 0
//	            ├── 1
//	            └── <seq>
//
// Chunks are staged as `<seq>.partial` next to their final name and renamed
// into place once synced.

use std::path::{Path, PathBuf};

use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PathManager {
    root_path: PathBuf,
}

impl PathManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        PathManager {
            root_path: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the path to the root of all chunks,
    /// (e.g. `<root>/chunks`).
    pub fn chunks_path(&self) -> PathBuf {
        self.root_path.join("chunks")
    }

    /// Returns the directory holding every chunk of one file,
    /// (e.g. `<root>/chunks/<first two hex chars>/<file id>`).
    pub fn file_path(&self, file_id: &Uuid) -> PathBuf {
        let id = file_id.simple().to_string();
        self.chunks_path().join(&id[..2]).join(&id)
    }

    /// Returns the path of a single chunk,
    /// (e.g. `<root>/chunks/<first two hex chars>/<file id>/<seq>`).
    pub fn chunk_path(&self, file_id: &Uuid, seq: u32) -> PathBuf {
        self.file_path(file_id).join(seq.to_string())
    }

    /// Returns the staging path a chunk is written to before it is renamed,
    /// (e.g. `<root>/chunks/<first two hex chars>/<file id>/<seq>.partial`).
    pub fn staging_path(&self, file_id: &Uuid, seq: u32) -> PathBuf {
        self.file_path(file_id).join(format!("{seq}.partial"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_paths_are_sharded_by_id_prefix() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000001").unwrap();
        let paths = PathManager::new("/srv/media");
        assert_eq!(
            paths.chunk_path(&id, 7),
            PathBuf::from("/srv/media/chunks/a1/a1b2c3d4000040008000000000000001/7")
        );
        assert_eq!(
            paths.file_path(&id),
            PathBuf::from("/srv/media/chunks/a1/a1b2c3d4000040008000000000000001")
        );
        assert_eq!(
            paths.staging_path(&id, 7),
            PathBuf::from("/srv/media/chunks/a1/a1b2c3d4000040008000000000000001/7.partial")
        );
    }
}
