//! File-backed shard store.

use super::codec::{decode_frame, encode_frame};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tessera_common::types::{ObjectLocation, SEPARATOR, ShardId};
use tessera_common::utils::error::{Error, Result, StorageError};
use tessera_core::{IndexShard, ShardStore};

/// Extension of shard files.
pub const SHARD_EXTENSION: &str = "shard";

/// Stores each shard in its own file under a root directory.
///
/// Location `/Users/Indices/email#default3` maps to
/// `<root>/Users/Indices/email#default3.shard`.
pub struct FileShardStore {
    root: PathBuf,
    sync_writes: bool,
}

impl FileShardStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            sync_writes: false,
        })
    }

    /// Whether every write is fsynced before it is renamed into place.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the shard at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidLocation`] for the root location and
    /// for locations with `.` or `..` segments.
    pub fn path_for(&self, location: &ObjectLocation) -> Result<PathBuf> {
        let invalid = || Error::Storage(StorageError::InvalidLocation(location.to_string()));
        let mut path = self.root.clone();
        let mut segments = 0;
        for segment in location.as_str().split(SEPARATOR).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains('\\') {
                return Err(invalid());
            }
            path.push(segment);
            segments += 1;
        }
        if segments == 0 {
            return Err(invalid());
        }
        Ok(with_suffix(path, &format!(".{SHARD_EXTENSION}")))
    }
}

impl ShardStore for FileShardStore {
    fn load_or_create(&self, location: &ObjectLocation, shard_id: ShardId) -> Result<IndexShard> {
        let path = self.path_for(location)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(IndexShard::new(shard_id)),
            Err(e) => return Err(e.into()),
        };

        let shard: IndexShard = decode_frame(&bytes).inspect_err(|e| {
            tracing::warn!(%location, path = %path.display(), error = %e, "corrupt shard file");
        })?;
        if shard.shard_id() != shard_id {
            tracing::warn!(%location, expected = shard_id, found = shard.shard_id(), "shard id mismatch");
            return Err(Error::Storage(StorageError::Corruption(format!(
                "shard file for '{location}' holds shard {} instead of {shard_id}",
                shard.shard_id()
            ))));
        }
        tracing::debug!(%location, keys = shard.key_count(), "shard loaded from disk");
        Ok(shard)
    }

    fn store(&self, location: &ObjectLocation, shard: &IndexShard, overwrite: bool) -> Result<()> {
        let path = self.path_for(location)?;
        if !overwrite && path.exists() {
            return Err(StorageError::AlreadyExists(location.to_string()).into());
        }
        write_atomic(&path, &encode_frame(shard)?, self.sync_writes)
    }

    fn erase(&self, location: &ObjectLocation) -> Result<bool> {
        let path = self.path_for(location)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn with_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path);
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes `bytes` to a temporary sibling of `path`, then renames it over
/// `path`, so readers never see a half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], sync: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = with_suffix(path.to_path_buf(), ".tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        if sync {
            file.sync_all()?;
        }
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
