use crate::models::{Gem, GemChanges, GemId};
use crate::services::store::{GemStore, UpdateOutcome};
use async_trait::async_trait;
use mongodb::bson::Document;
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// `GemStore` held in process memory, for tests and local runs.
///
/// `$set` is applied field by field on top-level keys. `set_unavailable(true)`
/// makes every call fail like a lost database connection.
#[derive(Default)]
pub struct InMemoryGemStore {
    gems: Mutex<Vec<Document>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryGemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of store operations attempted so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.gems.lock().map(|gems| gems.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self) -> Result<std::sync::MutexGuard<'_, Vec<Document>>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(
                "Database error".to_string(),
                anyhow::anyhow!("in-memory store marked unavailable"),
            ));
        }
        self.gems.lock().map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Gem store mutex poisoned: {}", e))
        })
    }
}

fn has_id(document: &Document, id: GemId) -> bool {
    document
        .get_object_id("_id")
        .map(|oid| oid == id.object_id())
        .unwrap_or(false)
}

#[async_trait]
impl GemStore for InMemoryGemStore {
    async fn list(&self) -> Result<Vec<Gem>, AppError> {
        let gems = self.begin()?;
        Ok(gems.iter().cloned().map(Gem::from).collect())
    }

    async fn find(&self, id: GemId) -> Result<Option<Gem>, AppError> {
        let gems = self.begin()?;
        Ok(gems.iter().find(|d| has_id(d, id)).cloned().map(Gem::from))
    }

    async fn insert(&self, gem: &Gem) -> Result<GemId, AppError> {
        let mut gems = self.begin()?;
        let id = gem.id().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("gem inserted without an ObjectId"))
        })?;
        if gems.iter().any(|d| has_id(d, id)) {
            return Err(AppError::DatabaseError(
                "Database error".to_string(),
                anyhow::anyhow!("duplicate key {}", id),
            ));
        }
        gems.push(gem.document().clone());
        Ok(id)
    }

    async fn update(&self, id: GemId, changes: GemChanges) -> Result<UpdateOutcome, AppError> {
        let mut gems = self.begin()?;
        let Some(document) = gems.iter_mut().find(|d| has_id(d, id)) else {
            return Ok(UpdateOutcome::NotFound);
        };

        let mut modified = false;
        for (key, value) in changes.into_document() {
            if document.get(&key) != Some(&value) {
                document.insert(key, value);
                modified = true;
            }
        }
        Ok(UpdateOutcome::from_counts(1, u64::from(modified)))
    }

    async fn delete(&self, id: GemId) -> Result<bool, AppError> {
        let mut gems = self.begin()?;
        let before = gems.len();
        gems.retain(|d| !has_id(d, id));
        Ok(gems.len() < before)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.begin().map(|_| ())
    }
}
