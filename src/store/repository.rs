//! Persistence contract for the engine
//!
//! The engine only needs single-record CRUD plus two typed listings. No
//! multi-record transaction is assumed: a pattern write may succeed and a
//! following cascade write fail, and callers own any retry.

use crate::store::error::StoreResult;
use crate::store::types::{
    CascadeId, CascadeLinks, ExtractedPattern, PatternCascade, PatternFilter, PatternId,
    PatternSort, StoreStats,
};
use async_trait::async_trait;

/// Repository over pattern observations and cascade edges
#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Persist a new pattern; fails with `Conflict` if the id exists
    async fn create_pattern(&self, pattern: &ExtractedPattern) -> StoreResult<()>;

    /// Load a pattern by id
    async fn get_pattern(&self, id: PatternId) -> StoreResult<Option<ExtractedPattern>>;

    /// Overwrite the mutable fields of an existing pattern
    async fn update_pattern(&self, pattern: &ExtractedPattern) -> StoreResult<()>;

    /// Delete a pattern and every cascade touching it.
    ///
    /// Returns the ids of the removed cascades.
    async fn delete_pattern(&self, id: PatternId) -> StoreResult<Vec<CascadeId>>;

    /// Persist a new cascade; both endpoints must exist
    async fn create_cascade(&self, cascade: &PatternCascade) -> StoreResult<()>;

    /// Load a cascade by id
    async fn get_cascade(&self, id: CascadeId) -> StoreResult<Option<PatternCascade>>;

    /// Delete a single cascade; returns whether it existed
    async fn delete_cascade(&self, id: CascadeId) -> StoreResult<bool>;

    /// List patterns matching a filter, in the given order
    async fn list_patterns(
        &self,
        filter: &PatternFilter,
        sort: PatternSort,
    ) -> StoreResult<Vec<ExtractedPattern>>;

    /// Edges into and out of a pattern, each ordered by timestamp
    async fn list_cascades(&self, pattern_id: PatternId) -> StoreResult<CascadeLinks>;

    /// Every stored cascade, ordered by timestamp
    async fn all_cascades(&self) -> StoreResult<Vec<PatternCascade>>;

    /// Record counts
    async fn stats(&self) -> StoreResult<StoreStats>;
}
