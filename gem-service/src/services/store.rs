use crate::models::{Gem, GemChanges, GemId};
use async_trait::async_trait;
use service_core::error::AppError;

/// Result of a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    NotFound,
    /// Matched, but every supplied field already held that value.
    Unchanged,
    Modified,
}

impl UpdateOutcome {
    pub fn from_counts(matched: u64, modified: u64) -> Self {
        match (matched, modified) {
            (0, _) => UpdateOutcome::NotFound,
            (_, 0) => UpdateOutcome::Unchanged,
            _ => UpdateOutcome::Modified,
        }
    }
}

/// Persistence for the `hidden_gems` collection.
#[async_trait]
pub trait GemStore: Send + Sync {
    /// Every gem, in the store's natural order.
    async fn list(&self) -> Result<Vec<Gem>, AppError>;
    async fn find(&self, id: GemId) -> Result<Option<Gem>, AppError>;
    async fn insert(&self, gem: &Gem) -> Result<GemId, AppError>;
    /// Merge `changes` into the gem. Fields not named are left untouched.
    async fn update(&self, id: GemId, changes: GemChanges) -> Result<UpdateOutcome, AppError>;
    /// `false` when nothing matched.
    async fn delete(&self, id: GemId) -> Result<bool, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_driver_counts() {
        assert_eq!(UpdateOutcome::from_counts(0, 0), UpdateOutcome::NotFound);
        assert_eq!(UpdateOutcome::from_counts(1, 0), UpdateOutcome::Unchanged);
        assert_eq!(UpdateOutcome::from_counts(1, 1), UpdateOutcome::Modified);
    }
}
