//! Shared key cache with optional keyring directory.
//!
//! The only mutable state shared between verification tasks. Key material
//! for a fingerprint never changes, so concurrent inserts of the same key are
//! last-writer-wins.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use depverify_core::signature::certificate_keys;
use depverify_core::{KeyId, KeyRecord, KeySource};
use tracing::{debug, warn};

const KEY_FILE_EXTENSION: &str = "gpg";

#[derive(Debug, Default)]
pub struct KeyCache {
    memory: RwLock<CachedKeys>,
    directory: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct CachedKeys {
    records: HashMap<KeyId, KeyRecord>,
    /// Every key inside a cached certificate, mapped to its record's id.
    contained: HashMap<KeyId, KeyId>,
}

impl CachedKeys {
    fn insert(&mut self, record: KeyRecord, contained: Vec<KeyId>) {
        for key in contained {
            self.contained.insert(key, record.fingerprint.clone());
        }
        self.records.insert(record.fingerprint.clone(), record);
    }

    fn get(&self, key: &KeyId) -> Option<&KeyRecord> {
        if let Some(record) = self.records.get(key) {
            return Some(record);
        }
        if let Some(owner) = self.contained.get(key) {
            return self.records.get(owner);
        }
        // Long ids never hit the maps exactly.
        self.records
            .iter()
            .find(|(cached, _)| cached.matches(key))
            .map(|(_, record)| record)
            .or_else(|| {
                self.contained
                    .iter()
                    .find(|(contained, _)| contained.matches(key))
                    .and_then(|(_, owner)| self.records.get(owner))
            })
    }
}

impl KeyCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache persisted as `<KEY ID>.gpg` files in `directory`.
    ///
    /// Existing files are loaded eagerly; unreadable ones are skipped.
    pub fn with_directory(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        let mut memory = CachedKeys::default();
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if let Some(record) = load_key_file(&path) {
                let contained = certificate_keys(&record.material);
                memory.insert(record, contained);
            }
        }
        debug!(directory = %directory.display(), keys = memory.records.len(), "loaded keyring");

        Ok(Self {
            memory: RwLock::new(memory),
            directory: Some(directory),
        })
    }

    /// Look up by fingerprint or long id, including subkeys of cached certificates.
    pub fn get(&self, key: &KeyId) -> Option<KeyRecord> {
        self.memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, record: KeyRecord) {
        if let Some(directory) = &self.directory {
            let path = directory.join(format!("{}.{KEY_FILE_EXTENSION}", record.fingerprint));
            if let Err(err) = fs::write(&path, &record.material) {
                warn!(path = %path.display(), %err, "failed to persist key to keyring");
            }
        }
        let contained = certificate_keys(&record.material);
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record, contained);
    }

    pub fn len(&self) -> usize {
        self.memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load_key_file(path: &Path) -> Option<KeyRecord> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(KEY_FILE_EXTENSION) {
        return None;
    }
    let fingerprint = KeyId::parse(path.file_stem()?.to_str()?).ok()?;
    match fs::read(path) {
        Ok(material) => Some(KeyRecord::new(fingerprint, material, KeySource::Cache)),
        Err(err) => {
            warn!(path = %path.display(), %err, "skipping unreadable key file");
            None
        }
    }
}
