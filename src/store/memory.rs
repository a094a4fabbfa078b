//! In-memory pattern store
//!
//! Holds everything in hash maps behind a Tokio `RwLock`. Used by tests and
//! by callers that want an ephemeral engine.

use crate::store::error::{StoreError, StoreResult};
use crate::store::repository::PatternRepository;
use crate::store::types::{
    CascadeId, CascadeLinks, ExtractedPattern, PatternCascade, PatternFilter, PatternId,
    PatternSort, StoreStats,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    patterns: HashMap<PatternId, ExtractedPattern>,
    cascades: HashMap<CascadeId, PatternCascade>,
}

/// Pattern store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_edges(edges: &mut [PatternCascade]) {
    edges.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl PatternRepository for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_pattern(&self, pattern: &ExtractedPattern) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.patterns.contains_key(&pattern.id()) {
            return Err(StoreError::Conflict(pattern.id().to_string()));
        }
        state.patterns.insert(pattern.id(), pattern.clone());
        Ok(())
    }

    async fn get_pattern(&self, id: PatternId) -> StoreResult<Option<ExtractedPattern>> {
        Ok(self.state.read().await.patterns.get(&id).cloned())
    }

    async fn update_pattern(&self, pattern: &ExtractedPattern) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.patterns.get_mut(&pattern.id()) {
            Some(existing) => {
                *existing = pattern.clone();
                Ok(())
            }
            None => Err(StoreError::PatternNotFound(pattern.id())),
        }
    }

    async fn delete_pattern(&self, id: PatternId) -> StoreResult<Vec<CascadeId>> {
        let mut state = self.state.write().await;
        if state.patterns.remove(&id).is_none() {
            return Err(StoreError::PatternNotFound(id));
        }

        let removed: Vec<CascadeId> = state
            .cascades
            .values()
            .filter(|c| c.touches(id))
            .map(|c| c.id)
            .collect();
        for cascade_id in &removed {
            state.cascades.remove(cascade_id);
        }

        Ok(removed)
    }

    async fn create_cascade(&self, cascade: &PatternCascade) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for endpoint in [cascade.from_pattern, cascade.to_pattern] {
            if !state.patterns.contains_key(&endpoint) {
                return Err(StoreError::PatternNotFound(endpoint));
            }
        }
        if state.cascades.contains_key(&cascade.id) {
            return Err(StoreError::Conflict(cascade.id.to_string()));
        }
        state.cascades.insert(cascade.id, cascade.clone());
        Ok(())
    }

    async fn get_cascade(&self, id: CascadeId) -> StoreResult<Option<PatternCascade>> {
        Ok(self.state.read().await.cascades.get(&id).cloned())
    }

    async fn delete_cascade(&self, id: CascadeId) -> StoreResult<bool> {
        Ok(self.state.write().await.cascades.remove(&id).is_some())
    }

    async fn list_patterns(
        &self,
        filter: &PatternFilter,
        sort: PatternSort,
    ) -> StoreResult<Vec<ExtractedPattern>> {
        let state = self.state.read().await;
        let mut patterns: Vec<ExtractedPattern> = state
            .patterns
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort.apply(&mut patterns);
        Ok(patterns)
    }

    async fn list_cascades(&self, pattern_id: PatternId) -> StoreResult<CascadeLinks> {
        let state = self.state.read().await;
        let mut links = CascadeLinks::default();
        for cascade in state.cascades.values() {
            if cascade.to_pattern == pattern_id {
                links.incoming.push(cascade.clone());
            }
            if cascade.from_pattern == pattern_id {
                links.outgoing.push(cascade.clone());
            }
        }
        sort_edges(&mut links.incoming);
        sort_edges(&mut links.outgoing);
        Ok(links)
    }

    async fn all_cascades(&self) -> StoreResult<Vec<PatternCascade>> {
        let mut edges: Vec<PatternCascade> =
            self.state.read().await.cascades.values().cloned().collect();
        sort_edges(&mut edges);
        Ok(edges)
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let state = self.state.read().await;
        Ok(StoreStats {
            patterns: state.patterns.len() as u64,
            cascades: state.cascades.len() as u64,
            skipped_rows: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::PatternType;

    #[tokio::test]
    async fn test_crud() {
        let store = MemoryStore::new();
        let mut pattern = ExtractedPattern::with_timestamp(PatternType::Headache, 1_000);

        store.create_pattern(&pattern).await.unwrap();
        assert!(matches!(
            store.create_pattern(&pattern).await,
            Err(StoreError::Conflict(_))
        ));

        pattern.set_intensity(4);
        store.update_pattern(&pattern).await.unwrap();
        let loaded = store.get_pattern(pattern.id()).await.unwrap().unwrap();
        assert_eq!(loaded.intensity(), 4);

        store.delete_pattern(pattern.id()).await.unwrap();
        assert!(store.get_pattern(pattern.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_incident_cascades() {
        let store = MemoryStore::new();
        let a = ExtractedPattern::with_timestamp(PatternType::SensoryOverload, 1_000);
        let b = ExtractedPattern::with_timestamp(PatternType::Shutdown, 2_000);
        let c = ExtractedPattern::with_timestamp(PatternType::LowEnergy, 3_000);
        for p in [&a, &b, &c] {
            store.create_pattern(p).await.unwrap();
        }

        let ab = PatternCascade::new(a.id(), b.id(), 0.8, 2_000).unwrap();
        let bc = PatternCascade::new(b.id(), c.id(), 0.6, 3_000).unwrap();
        store.create_cascade(&ab).await.unwrap();
        store.create_cascade(&bc).await.unwrap();

        let links = store.list_cascades(b.id()).await.unwrap();
        assert_eq!(links.incoming, vec![ab.clone()]);
        assert_eq!(links.outgoing, vec![bc.clone()]);

        let mut removed = store.delete_pattern(b.id()).await.unwrap();
        removed.sort();
        let mut expected = vec![ab.id, bc.id];
        expected.sort();
        assert_eq!(removed, expected);
        assert!(store.all_cascades().await.unwrap().is_empty());
        assert!(store.list_cascades(a.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cascade_requires_endpoints() {
        let store = MemoryStore::new();
        let a = ExtractedPattern::new(PatternType::Meltdown);
        store.create_pattern(&a).await.unwrap();

        let missing = PatternId::new();
        let edge = PatternCascade::new(a.id(), missing, 0.5, 0).unwrap();
        assert!(matches!(
            store.create_cascade(&edge).await,
            Err(StoreError::PatternNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_filtered() {
        let store = MemoryStore::new();
        for (ts, pattern_type) in [
            (3_000, PatternType::Headache),
            (1_000, PatternType::Headache),
            (2_000, PatternType::Meltdown),
        ] {
            store
                .create_pattern(&ExtractedPattern::with_timestamp(pattern_type, ts))
                .await
                .unwrap();
        }

        let headaches = store
            .list_patterns(
                &PatternFilter::new().pattern_type(PatternType::Headache),
                PatternSort::TimestampDesc,
            )
            .await
            .unwrap();
        let ts: Vec<i64> = headaches.iter().map(|p| p.timestamp()).collect();
        assert_eq!(ts, vec![3_000, 1_000]);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.patterns, 3);
        assert_eq!(stats.cascades, 0);
    }
}
