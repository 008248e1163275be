//! Cache locations for the sample dataset
//!
//! The downloaded image lives in the user's cache directory:
//! - Linux: ~/.cache/piroplasma/example_image_001.tif
//! - macOS: ~/Library/Caches/piroplasma/example_image_001.tif
//! - Windows: %LOCALAPPDATA%\piroplasma\example_image_001.tif
//!
//! The filesystem is the source of truth: a file at the final path is a
//! cache hit, whatever its contents.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FilesystemError;

/// Directory name under the platform cache root
pub const CACHE_DIR_NAME: &str = "piroplasma";

/// File name of the cached sample image
pub const IMAGE_FILE_NAME: &str = "example_image_001.tif";

/// Replaces the extension of an in-progress download
pub const TEMP_MARKER: &str = "_tmp";

/// Resolves the cache directory and the sample image path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocator {
    root: PathBuf,
}

impl CacheLocator {
    /// Use the platform cache root, or the home directory if there is none
    pub fn platform() -> Result<Self, FilesystemError> {
        dirs::cache_dir()
            .or_else(dirs::home_dir)
            .map(Self::with_root)
            .ok_or(FilesystemError::NoCacheRoot)
    }

    /// Use an explicit cache root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the plugin cache directory, creating it if needed.
    /// Safe to call repeatedly.
    pub fn cache_dir(&self) -> Result<PathBuf, FilesystemError> {
        let path = self.root.join(CACHE_DIR_NAME);

        fs::create_dir_all(&path).map_err(|source| FilesystemError::CreateDir {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Path of the cached sample image (the file may not exist yet)
    pub fn image_path(&self) -> Result<PathBuf, FilesystemError> {
        Ok(self.cache_dir()?.join(IMAGE_FILE_NAME))
    }
}

/// In-progress download path for `final_path`: same directory, extension
/// replaced by [`TEMP_MARKER`].
pub fn temp_path(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    final_path.with_file_name(format!("{}{}", stem, TEMP_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_dir_is_idempotent() {
        let root = TempDir::new().unwrap();
        let locator = CacheLocator::with_root(root.path());

        let first = locator.cache_dir().unwrap();
        for _ in 0..5 {
            assert_eq!(locator.cache_dir().unwrap(), first);
        }
        assert!(first.is_dir());
        assert_eq!(first, root.path().join(CACHE_DIR_NAME));
    }

    #[test]
    fn test_image_path() {
        let root = TempDir::new().unwrap();
        let locator = CacheLocator::with_root(root.path());

        let path = locator.image_path().unwrap();
        assert_eq!(path, root.path().join("piroplasma").join("example_image_001.tif"));
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn test_cache_dir_blocked_by_file() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join(CACHE_DIR_NAME), b"not a directory").unwrap();
        let locator = CacheLocator::with_root(root.path());

        let err = locator.cache_dir().unwrap_err();
        assert!(matches!(err, FilesystemError::CreateDir { .. }));
    }

    #[test]
    fn test_temp_path_replaces_extension() {
        let final_path = Path::new("/cache/piroplasma/example_image_001.tif");
        assert_eq!(
            temp_path(final_path),
            Path::new("/cache/piroplasma/example_image_001_tmp")
        );
    }

    #[test]
    fn test_temp_path_only_touches_file_name() {
        let final_path = Path::new("/data.tif/example.tif");
        assert_eq!(temp_path(final_path), Path::new("/data.tif/example_tmp"));
    }
}
