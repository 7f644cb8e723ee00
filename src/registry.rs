use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;

/// Maps video identifiers (file stems) to files on disk.
///
/// Built by the caller and handed to the pipeline by reference; there is no
/// process-wide registry.
#[derive(Debug, Clone)]
pub struct VideoRegistry {
    accepted_mime: String,
    videos: BTreeMap<String, PathBuf>,
}

impl VideoRegistry {
    pub fn new(accepted_mime: impl Into<String>) -> Self {
        Self {
            accepted_mime: accepted_mime.into(),
            videos: BTreeMap::new(),
        }
    }

    pub fn accepted_mime(&self) -> &str {
        &self.accepted_mime
    }

    pub fn accepts(&self, path: &Path) -> bool {
        mime_guess::from_path(path)
            .iter()
            .any(|mime| mime.essence_str() == self.accepted_mime)
    }

    /// Registers `path` under its file stem. Only the accepted container type
    /// gets in.
    pub fn register(&mut self, path: impl AsRef<Path>) -> Result<String, RegistryError> {
        let path = path.as_ref();

        if !self.accepts(path) {
            log::warn!(
                "Rejected {} (expected {})",
                path.display(),
                self.accepted_mime
            );
            return Err(RegistryError::Unsupported {
                path: path.to_path_buf(),
                expected: self.accepted_mime.clone(),
            });
        }

        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| RegistryError::Unsupported {
                path: path.to_path_buf(),
                expected: self.accepted_mime.clone(),
            })?
            .to_string();

        self.insert(id.clone(), path);
        Ok(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, path: impl Into<PathBuf>) {
        let id = id.into();
        let path = path.into();
        log::debug!("Registered video {} -> {}", id, path.display());
        if let Some(previous) = self.videos.insert(id.clone(), path) {
            log::warn!("Video {} replaced {}", id, previous.display());
        }
    }

    /// Registers every accepted file directly inside `dir`. Files that cannot
    /// be keyed are skipped.
    pub fn scan(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let mut count = 0;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !self.accepts(&path) {
                continue;
            }
            match self.register(&path) {
                Ok(_) => count += 1,
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        log::info!("Found {} videos in {}", count, dir.display());
        Ok(count)
    }

    pub fn resolve(&self, id: &str) -> Result<&Path, RegistryError> {
        self.videos
            .get(id)
            .map(PathBuf::as_path)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.videos
            .iter()
            .map(|(id, path)| (id.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}
