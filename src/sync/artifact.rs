//! Packed configuration artifacts and their temporary storage.

use crate::config::{ARCHIVE_FILE_PREFIX, ARCHIVE_FILE_SUFFIX};
use crate::error::{SemLayerError, SemResult};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A packed configuration directory sitting on local storage, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigArtifact {
    path: PathBuf,
    size: u64,
    version: Option<String>,
}

impl ConfigArtifact {
    pub fn new(path: impl Into<PathBuf>, size: u64, version: Option<String>) -> Self {
        Self {
            path: path.into(),
            size,
            version: version.filter(|v| !v.is_empty()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compressed size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Temporary storage for one packed artifact.
///
/// The backing file is removed by [`TempArtifact::release`], or on drop if the
/// guard is never released explicitly (early return, panic).
#[derive(Debug)]
pub struct TempArtifact {
    file: NamedTempFile,
}

impl TempArtifact {
    pub fn create_in(dir: &Path) -> SemResult<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|err| SemLayerError::io("Failed to create temp directory", dir, err))?;

        let file = tempfile::Builder::new()
            .prefix(ARCHIVE_FILE_PREFIX)
            .suffix(ARCHIVE_FILE_SUFFIX)
            .tempfile_in(dir)
            .map_err(|err| SemLayerError::io("Failed to create temporary artifact", dir, err))?;

        debug!("Created temporary artifact {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn as_file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Delete the backing file, reporting any failure.
    pub fn release(self) -> io::Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        debug!("Removed temporary artifact {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn release_removes_file() {
        let dir = TempDir::new().unwrap();
        let artifact = TempArtifact::create_in(dir.path()).unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".zip"));

        artifact.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = {
            let artifact = TempArtifact::create_in(dir.path()).unwrap();
            artifact.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn empty_version_label_means_current() {
        let artifact = ConfigArtifact::new("/tmp/a.zip", 10, Some(String::new()));
        assert_eq!(artifact.version(), None);
    }
}
