//! In-memory storage implementation.

use super::{AnnotationRecord, BoxFuture, Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for tests and session-scoped persistence.
///
/// Records are held serialized so an optional byte budget can be enforced
/// the way browser storage quotas are.
#[derive(Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, String>>,
    budget: Option<usize>,
}

impl MemoryStorage {
    /// Create a new empty, unbounded memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory storage holding at most `budget` bytes of JSON.
    pub fn with_budget(budget: usize) -> Self {
        Self {
            records: RwLock::default(),
            budget: Some(budget),
        }
    }

    /// Bytes currently stored.
    pub fn used_bytes(&self) -> usize {
        self.records
            .read()
            .map(|r| r.values().map(String::len).sum())
            .unwrap_or(0)
    }
}

impl Storage for MemoryStorage {
    fn save(&self, key: &str, record: &AnnotationRecord) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        let json = record.to_json();
        Box::pin(async move {
            let json = json.map_err(|e| StorageError::Serialization(e.to_string()))?;
            let mut records = self.records.write().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            if let Some(budget) = self.budget {
                let others: usize = records
                    .iter()
                    .filter(|(k, _)| **k != key)
                    .map(|(_, v)| v.len())
                    .sum();
                let needed = others + json.len();
                if needed > budget {
                    return Err(StorageError::QuotaExceeded { needed, budget });
                }
            }
            records.insert(key, json);
            Ok(())
        })
    }

    fn load(&self, key: &str) -> BoxFuture<'_, StorageResult<AnnotationRecord>> {
        let key = key.to_string();
        Box::pin(async move {
            let records = self.records.read().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            let json = records.get(&key).ok_or_else(|| StorageError::NotFound(key.clone()))?;
            AnnotationRecord::from_json(json)
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut records = self.records.write().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            records.remove(&key);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let records = self.records.read().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            Ok(records.keys().cloned().collect())
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let key = key.to_string();
        Box::pin(async move {
            let records = self.records.read().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            Ok(records.contains_key(&key))
        })
    }
}
