use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Local scratch paths owned by one session.
///
/// Paths are released in reverse registration order, so a directory tracked
/// before the files inside it is removed after them.
#[derive(Debug, Default)]
pub struct LocalResourceTracker {
    paths: Vec<PathBuf>,
}

impl LocalResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for cleanup. Registering the same path twice is a no-op.
    pub fn track(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.contains(path) {
            debug!(path = %path.display(), "tracking local file");
            self.paths.push(path.to_path_buf());
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every tracked path. Missing paths and removal errors are logged
    /// and skipped; the tracked set is always empty afterwards.
    pub async fn release_all(&mut self) {
        for path in self.paths.drain(..).rev() {
            let result = match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => debug!(path = %path.display(), "released local file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove local file"),
            }
        }
    }
}
