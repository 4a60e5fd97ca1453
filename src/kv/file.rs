//! Directory-backed key-value store.
//!
//! Layout:
//!
//! ```text
//! <path>/MANIFEST          magic + format version
//! <path>/LOCK              exclusive lock held while the store is open
//! <path>/data/<hex>.val    one file per key, name is the hex-encoded key
//! ```
//!
//! Value files carry a header with a CRC32 of the payload so torn or
//! tampered files are reported instead of parsed.

use super::KeyValueStore;
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"SOS\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// Magic bytes for value files.
const VALUE_MAGIC: &[u8; 4] = b"VAL\0";

/// Current value file format version.
const VALUE_VERSION: u8 = 1;

/// magic (4) + version (1) + crc32 (4) + payload length (8)
const VALUE_HEADER_LEN: usize = 17;

const VALUE_EXTENSION: &str = "val";

/// File store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Base path for the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./signoff-data"),
            create_if_missing: true,
        }
    }
}

/// Durable key-value store with one file per key.
pub struct FileStore {
    config: FileStoreConfig,

    /// Directory holding the value files.
    data_dir: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Serializes writes so temporary files never collide.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: FileStoreConfig) -> BackendResult<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(BackendError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: FileStoreConfig) -> BackendResult<Self> {
        let data_dir = config.path.join("data");
        fs::create_dir_all(&data_dir)?;

        Self::write_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;

        debug!(path = %config.path.display(), "created file store");

        Ok(Self {
            config,
            data_dir,
            _lock_file: lock_file,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Open an existing store.
    pub fn open(config: FileStoreConfig) -> BackendResult<Self> {
        Self::verify_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;

        let data_dir = config.path.join("data");
        fs::create_dir_all(&data_dir)?;

        debug!(path = %config.path.display(), "opened file store");

        Ok(Self {
            config,
            data_dir,
            _lock_file: lock_file,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// List all stored keys, sorted.
    pub async fn keys(&self) -> BackendResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match hex::decode(stem).map(String::from_utf8) {
                Ok(Ok(key)) => keys.push(key),
                _ => warn!(file = %path.display(), "skipping value file with undecodable name"),
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", hex::encode(key.as_bytes()), VALUE_EXTENSION))
    }

    fn encode_value(value: &str) -> Vec<u8> {
        let payload = value.as_bytes();
        let mut buf = Vec::with_capacity(VALUE_HEADER_LEN + payload.len());

        buf.extend_from_slice(VALUE_MAGIC);
        buf.push(VALUE_VERSION);
        buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        buf.extend_from_slice(payload);

        buf
    }

    fn decode_value(key: &str, bytes: &[u8]) -> BackendResult<String> {
        if bytes.len() < VALUE_HEADER_LEN {
            return Err(BackendError::InvalidFormat(format!(
                "value file for '{}' is truncated",
                key
            )));
        }

        if &bytes[0..4] != VALUE_MAGIC {
            return Err(BackendError::InvalidFormat(format!(
                "invalid value magic for '{}'",
                key
            )));
        }

        if bytes[4] != VALUE_VERSION {
            return Err(BackendError::InvalidFormat(format!(
                "unsupported value version {} for '{}'",
                bytes[4], key
            )));
        }

        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&bytes[5..9]);
        let expected = u32::from_le_bytes(crc_bytes);

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[9..17]);
        let len = u64::from_le_bytes(len_bytes);

        let payload = &bytes[VALUE_HEADER_LEN..];
        if payload.len() as u64 != len {
            return Err(BackendError::InvalidFormat(format!(
                "value for '{}' has {} bytes, header says {}",
                key,
                payload.len(),
                len
            )));
        }

        let got = crc32fast::hash(payload);
        if got != expected {
            return Err(BackendError::ChecksumMismatch {
                key: key.to_string(),
                expected,
                got,
            });
        }

        String::from_utf8(payload.to_vec()).map_err(|e| {
            BackendError::InvalidFormat(format!("value for '{}' is not UTF-8: {}", key, e))
        })
    }

    fn write_manifest(path: &Path) -> BackendResult<()> {
        use std::io::Write;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> BackendResult<()> {
        use std::io::Read;

        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(BackendError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(BackendError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> BackendResult<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file.try_lock_exclusive().map_err(|_| {
            warn!(path = %path.display(), "file store already locked");
            BackendError::Locked
        })?;

        Ok(lock_file)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        match tokio::fs::read(self.value_path(key)).await {
            Ok(bytes) => Self::decode_value(key, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        let _lock = self.write_lock.lock().await;

        let path = self.value_path(key);
        let tmp_path = path.with_extension("tmp");

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&Self::encode_value(value)).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        let _lock = self.write_lock.lock().await;

        let mut removed = 0usize;
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        debug!(path = %self.config.path.display(), removed, "cleared file store");
        Ok(())
    }
}
