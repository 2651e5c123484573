//! Exclusive process lock on the data directory.

use super::StorageSetupError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";

/// Held for the life of the process. The OS releases it on drop or exit.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    /// Create `dir` if needed and lock `dir/LOCK` without blocking.
    pub fn acquire(dir: &Path) -> Result<Self, StorageSetupError> {
        std::fs::create_dir_all(dir).map_err(|source| StorageSetupError::DataDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StorageSetupError::DataDir {
                path: path.clone(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| StorageSetupError::Locked {
                path: dir.to_path_buf(),
            })?;

        debug!(path = %path.display(), "[ks-node] data directory locked");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
