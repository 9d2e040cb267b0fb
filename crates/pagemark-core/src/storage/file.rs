//! Records kept as JSON files in a directory.
//!
//! File names encode the record key reversibly: ASCII letters, digits,
//! `-` and `.` pass through, every other byte becomes `_` plus two hex
//! digits. Distinct keys therefore never share a file, and [`Storage::list`]
//! recovers keys from names alone.

use super::{AnnotationRecord, BoxFuture, Storage, StorageError, StorageResult};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// One JSON file per record under `base_path`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Use `base_path`, creating it when missing.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::Io(format!("Failed to create {}: {e}", base_path.display()))
        })?;
        Ok(Self { base_path })
    }

    /// `<local data dir>/pagemark/annotations`, falling back to the home
    /// directory.
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("pagemark").join("annotations"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.{EXTENSION}", encode_key(key)))
    }
}

fn encode_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
            name.push(char::from(byte));
        } else {
            let _ = write!(name, "_{byte:02x}");
        }
    }
    name
}

/// Inverse of [`encode_key`]; `None` for names it cannot have produced.
fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut key = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = name.get(i + 1..i + 3)?;
            key.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            key.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(key).ok()
}

fn read_record(path: &Path, key: &str) -> StorageResult<AnnotationRecord> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Err(e) => return Err(StorageError::Io(format!("Failed to read {}: {e}", path.display()))),
    };
    let record = AnnotationRecord::from_json(&json).map_err(|e| {
        StorageError::Serialization(format!("Failed to parse {}: {e}", path.display()))
    })?;
    if record.key() != key {
        return Err(StorageError::Other(format!(
            "{} holds {} instead of {key}",
            path.display(),
            record.key()
        )));
    }
    Ok(record)
}

impl Storage for FileStorage {
    fn save(&self, key: &str, record: &AnnotationRecord) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(key);
        let json = record.to_json();
        Box::pin(async move {
            let json = json.map_err(|e| StorageError::Serialization(e.to_string()))?;
            fs::write(&path, json)
                .map_err(|e| StorageError::Io(format!("Failed to write {}: {e}", path.display())))
        })
    }

    fn load(&self, key: &str) -> BoxFuture<'_, StorageResult<AnnotationRecord>> {
        let path = self.record_path(key);
        let key = key.to_string();
        Box::pin(async move { read_record(&path, &key) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(key);
        Box::pin(async move {
            match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => {
                    Err(StorageError::Io(format!("Failed to delete {}: {e}", path.display())))
                }
            }
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let entries = fs::read_dir(&self.base_path).map_err(|e| {
                StorageError::Io(format!("Failed to list {}: {e}", self.base_path.display()))
            })?;
            let mut keys = Vec::new();
            for path in entries.flatten().map(|entry| entry.path()) {
                if path.extension().is_none_or(|ext| ext != EXTENSION) {
                    continue;
                }
                match path.file_stem().and_then(|stem| stem.to_str()).and_then(decode_key) {
                    Some(key) => keys.push(key),
                    None => log::warn!("Skipping foreign file {}", path.display()),
                }
            }
            keys.sort();
            Ok(keys)
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.record_path(key);
        Box::pin(async move { Ok(path.is_file()) })
    }
}
