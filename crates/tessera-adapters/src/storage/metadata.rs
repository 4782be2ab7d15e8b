//! Index metadata files.

use super::codec::{decode_frame, encode_frame};
use super::file::write_atomic;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tessera_common::utils::error::Result;
use tessera_core::IndexMetadata;

/// Extension of metadata files.
pub const METADATA_EXTENSION: &str = "meta";

/// One framed [`IndexMetadata`] per file, named `<name>#<edition>.meta`.
pub struct IndexMetadataStore {
    dir: PathBuf,
}

impl IndexMetadataStore {
    /// Opens (creating if needed) the metadata directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, name: &str, edition: &str) -> PathBuf {
        self.dir
            .join(format!("{name}#{edition}.{METADATA_EXTENSION}"))
    }

    /// Writes (or replaces) the metadata of one index.
    ///
    /// # Errors
    ///
    /// Metadata that fails [`IndexMetadata::validate`] is rejected before
    /// its name or edition is turned into a path.
    pub fn save(&self, metadata: &IndexMetadata) -> Result<()> {
        metadata.validate()?;
        let path = self.file_for(&metadata.name, &metadata.edition);
        write_atomic(&path, &encode_frame(metadata)?, true)?;
        tracing::debug!(index = %metadata.name, path = %path.display(), "index metadata saved");
        Ok(())
    }

    /// Deletes the metadata of one index. Returns true if a file was removed.
    pub fn remove(&self, name: &str, edition: &str) -> Result<bool> {
        match fs::remove_file(self.file_for(name, edition)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads every stored index definition, ordered by file name.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable or corrupt file.
    pub fn load_all(&self) -> Result<Vec<IndexMetadata>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == METADATA_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .iter()
            .map(|path| {
                decode_frame::<IndexMetadata>(&fs::read(path)?).inspect_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "corrupt index metadata");
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tessera_common::types::{AttributeId, ObjectLocation, TypeId};
    use tessera_core::{CompositeKeyDefinition, IndexConfig};

    fn metadata(name: &str) -> IndexMetadata {
        IndexMetadata::new(
            name,
            TypeId::new(3),
            ObjectLocation::new("/Users/"),
            CompositeKeyDefinition::new([AttributeId::new(1), AttributeId::new(2)]),
        )
        .with_config(IndexConfig::unique().with_shard_count(4))
    }

    #[test]
    fn test_save_and_load_all() {
        let dir = tempdir().unwrap();
        {
            let store = IndexMetadataStore::open(dir.path()).unwrap();
            store.save(&metadata("email")).unwrap();
            store.save(&metadata("age")).unwrap();
            store.save(&metadata("email")).unwrap();
        }

        let loaded = IndexMetadataStore::open(dir.path()).unwrap().load_all().unwrap();
        assert_eq!(loaded, vec![metadata("age"), metadata("email")]);
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let store = IndexMetadataStore::open(dir.path()).unwrap();
        store.save(&metadata("email")).unwrap();

        assert!(store.remove("email", "default").unwrap());
        assert!(!store.remove("email", "default").unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_serialized_field_order() {
        let meta = metadata("email");
        let as_tuple = (
            meta.location.clone(),
            meta.edition.clone(),
            meta.name.clone(),
            meta.is_uuid_index,
            meta.type_id,
            meta.shard_count,
            meta.unique,
            meta.definition.clone(),
        );
        assert_eq!(encode_frame(&meta).unwrap(), encode_frame(&as_tuple).unwrap());
    }

    #[test]
    fn test_save_rejects_escaping_edition() {
        let root = tempdir().unwrap();
        let dir = root.path().join("catalog");
        let store = IndexMetadataStore::open(&dir).unwrap();

        assert!(store.save(&metadata("email").with_edition("../../outside")).is_err());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_metadata_fails_load() {
        let dir = tempdir().unwrap();
        let store = IndexMetadataStore::open(dir.path()).unwrap();
        store.save(&metadata("email")).unwrap();
        fs::write(dir.path().join("email#default.meta"), b"garbage").unwrap();

        assert!(store.load_all().is_err());
    }
}
