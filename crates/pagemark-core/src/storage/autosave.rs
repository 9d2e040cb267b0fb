//! Auto-save of annotation records.
//!
//! Changes are saved after a quiet period. Records that do not fit the
//! primary store go to a session store instead, so drawing never stops
//! because persistence failed.

use crate::config::EditorConfig;
use crate::storage::{
    AnnotationRecord, DocumentFingerprint, MemoryStorage, Storage, StorageError, StorageResult,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default quiet period before an auto-save, in milliseconds.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1000;

/// Where a record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Primary,
    Session,
}

/// Manages debounced persistence with a session fallback.
pub struct AutoSaveManager<P: Storage + ?Sized, S: Storage + ?Sized> {
    /// Durable storage backend.
    primary: Arc<P>,
    /// Session-scoped fallback.
    session: Arc<S>,
    /// Quiet period after the last change.
    debounce: Duration,
    /// Largest record sent to the primary store.
    budget: usize,
    /// Time of the most recent unsaved change.
    last_change: Option<Instant>,
    /// Revision of the most recent unsaved change.
    dirty_revision: Option<u64>,
    /// Revision of the last successful save.
    saved_revision: Option<u64>,
}

/// Auto-save manager over type-erased backends, as held by the editor.
pub type DynAutoSaveManager = AutoSaveManager<dyn Storage, dyn Storage>;

impl<P: Storage + ?Sized, S: Storage + ?Sized> fmt::Debug for AutoSaveManager<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoSaveManager")
            .field("debounce", &self.debounce)
            .field("budget", &self.budget)
            .field("dirty_revision", &self.dirty_revision)
            .field("saved_revision", &self.saved_revision)
            .finish_non_exhaustive()
    }
}

impl<P: Storage + ?Sized, S: Storage + ?Sized> AutoSaveManager<P, S> {
    /// Create a new auto-save manager over the given backends.
    pub fn new(primary: Arc<P>, session: Arc<S>) -> Self {
        Self {
            primary,
            session,
            debounce: Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            budget: usize::MAX,
            last_change: None,
            dirty_revision: None,
            saved_revision: None,
        }
    }

    /// Apply debounce and budget from the editor config.
    pub fn with_config(mut self, config: &EditorConfig) -> Self {
        self.debounce = Duration::from_millis(config.autosave_debounce_ms);
        self.budget = config.storage_budget_bytes;
        self
    }

    /// Set the debounce interval.
    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn set_budget(&mut self, budget: usize) {
        self.budget = budget;
    }

    /// Note a store change at `revision`. Restarts the quiet period.
    pub fn mark_dirty(&mut self, revision: u64) {
        self.mark_dirty_at(revision, Instant::now());
    }

    pub fn mark_dirty_at(&mut self, revision: u64, now: Instant) {
        if self.saved_revision == Some(revision) {
            return;
        }
        self.dirty_revision = Some(revision);
        self.last_change = Some(now);
    }

    /// Check if the document has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty_revision.is_some()
    }

    /// Whether the quiet period has passed since the last change.
    pub fn should_save(&self) -> bool {
        self.should_save_at(Instant::now())
    }

    pub fn should_save_at(&self, now: Instant) -> bool {
        match (self.dirty_revision, self.last_change) {
            (Some(_), Some(changed)) => now.saturating_duration_since(changed) >= self.debounce,
            _ => false,
        }
    }

    /// Save if dirty and the quiet period has passed.
    pub async fn maybe_save(
        &mut self,
        record: &AnnotationRecord,
    ) -> StorageResult<Option<SaveTarget>> {
        if !self.should_save() {
            return Ok(None);
        }
        self.save(record).await.map(Some)
    }

    /// Save now.
    ///
    /// Records larger than the budget, or refused by the primary store for
    /// quota reasons, are written to the session store and any older primary
    /// copy is removed so it cannot shadow the newer one on restore.
    pub async fn save(&mut self, record: &AnnotationRecord) -> StorageResult<SaveTarget> {
        let key = record.key();
        let size = record
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?
            .len();

        let target = if size > self.budget {
            log::warn!(
                "Record {key} is {size} bytes (budget {}), keeping it for this session only",
                self.budget
            );
            self.save_to_session(&key, record).await?
        } else {
            match self.primary.save(&key, record).await {
                Ok(()) => {
                    self.session.delete(&key).await?;
                    SaveTarget::Primary
                }
                Err(StorageError::QuotaExceeded { needed, budget }) => {
                    log::warn!(
                        "Storage quota exceeded for {key} ({needed} > {budget} bytes), \
                         keeping it for this session only"
                    );
                    self.save_to_session(&key, record).await?
                }
                Err(e) => return Err(e),
            }
        };

        self.saved_revision = Some(record.revision);
        self.dirty_revision = None;
        self.last_change = None;
        log::debug!("Saved {key} to {target:?} storage");
        Ok(target)
    }

    async fn save_to_session(
        &self,
        key: &str,
        record: &AnnotationRecord,
    ) -> StorageResult<SaveTarget> {
        self.session.save(key, record).await?;
        if let Err(e) = self.primary.delete(key).await {
            log::warn!("Failed to remove stale record {key}: {e}");
        }
        Ok(SaveTarget::Session)
    }

    /// Find the saved record for a document, primary store first.
    pub async fn restore(
        &mut self,
        fingerprint: &DocumentFingerprint,
    ) -> Option<AnnotationRecord> {
        let key = fingerprint.key();
        let record = match self.primary.load(&key).await {
            Ok(record) => Some(record),
            Err(StorageError::NotFound(_)) => self.session.load(&key).await.ok(),
            Err(e) => {
                log::warn!("Failed to read {key} from primary storage: {e}");
                self.session.load(&key).await.ok()
            }
        };
        if let Some(record) = &record {
            log::info!(
                "Restored {} annotation(s) for {key}",
                record.annotation_count()
            );
            // Revisions restart with every session.
            self.saved_revision = None;
            self.dirty_revision = None;
            self.last_change = None;
        }
        record
    }

    /// Remove every saved copy of a document's annotations.
    pub async fn clear(&mut self, fingerprint: &DocumentFingerprint) -> StorageResult<()> {
        let key = fingerprint.key();
        self.primary.delete(&key).await?;
        self.session.delete(&key).await?;
        self.saved_revision = None;
        self.dirty_revision = None;
        self.last_change = None;
        log::info!("Cleared saved annotations for {key}");
        Ok(())
    }

    /// Keys of every record in the primary store.
    pub async fn list_documents(&self) -> StorageResult<Vec<String>> {
        self.primary.list().await
    }

    /// Get a reference to the primary storage backend.
    pub fn primary(&self) -> &Arc<P> {
        &self.primary
    }

    /// Get a reference to the session storage backend.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }
}

/// Auto-save manager backed by files with an in-memory session fallback.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformAutoSaveManager = AutoSaveManager<crate::storage::FileStorage, MemoryStorage>;

/// Convenience function to create an auto-save manager with default storage.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_autosave_manager(
    config: &EditorConfig,
) -> StorageResult<PlatformAutoSaveManager> {
    let primary = Arc::new(crate::storage::FileStorage::default_location()?);
    Ok(AutoSaveManager::new(primary, Arc::new(MemoryStorage::new())).with_config(config))
}
