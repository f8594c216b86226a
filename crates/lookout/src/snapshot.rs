use std::io;
use std::path::{Path, PathBuf};

/// The last observed text of the monitored page, kept in a single file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot, returning `None` if it hasn't been written yet.
    pub fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Replaces the snapshot with `text`, verbatim.
    ///
    /// The write is not atomic.
    pub fn store(&self, text: &str) -> io::Result<()> {
        tracing::debug!(path = ?self.path, "writing snapshot");
        std::fs::write(&self.path, text)
    }
}
