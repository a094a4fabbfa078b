//! Pattern Engine
//!
//! Orchestrates the journal data flow:
//!
//! ```text
//! entry details → classify → ExtractedPattern (one per type) → store
//!                                   │
//!                                   └─ scorer? → cascade proposals → graph + store
//!
//! store snapshot → aggregate → discoveries
//! ```
//!
//! The cascade graph is loaded from the store on open and kept in memory.
//! Edge writes hold the graph write lock from validation until insertion, so
//! two concurrent proposals for the same pair cannot both pass the same-day
//! check. Writes to a single pattern are serialized through a per-id lock.

use crate::cascade::{CascadeConfig, CascadeGraph, CascadeRejection, CascadeScorer};
use crate::classifier::classify;
use crate::discovery::{AggregationConfig, Discovery, DiscoveryAggregator, InsightNarrator};
use crate::store::{
    CascadeId, CascadeLinks, ExtractedPattern, Factor, PatternCascade, PatternFilter, PatternId,
    PatternRepository, PatternSort, PatternUpdate, StoreError, StoreStats, TimeRange,
};
use crate::taxonomy::PatternType;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Errors returned by the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cascade rejected: {0}")]
    Rejected(#[from] CascadeRejection),

    #[error("Pattern not found: {0}")]
    PatternNotFound(PatternId),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub cascade: CascadeConfig,
    pub aggregation: AggregationConfig,
    /// Window used by [`PatternEngine::recent_discoveries`]; `None` means all history
    pub discovery_window_days: Option<i64>,
}

/// One journal entry as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct JournalObservation {
    pub entry_id: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Detail strings picked in the entry form
    pub details: Vec<String>,
    pub triggers: Vec<String>,
    pub coping_strategies: Vec<String>,
    pub factors: Vec<Factor>,
    pub intensity: Option<i64>,
    pub confidence: f64,
    pub note: Option<String>,
}

impl JournalObservation {
    pub fn new(entry_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            entry_id: entry_id.into(),
            timestamp,
            details: Vec::new(),
            triggers: Vec::new(),
            coping_strategies: Vec::new(),
            factors: Vec::new(),
            intensity: None,
            confidence: 1.0,
            note: None,
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(details.into_iter().map(Into::into));
        self
    }

    pub fn trigger(mut self, tag: impl Into<String>) -> Self {
        self.triggers.push(tag.into());
        self
    }

    pub fn coping(mut self, tag: impl Into<String>) -> Self {
        self.coping_strategies.push(tag.into());
        self
    }

    pub fn factor(mut self, factor: Factor) -> Self {
        self.factors.push(factor);
        self
    }

    pub fn intensity(mut self, value: i64) -> Self {
        self.intensity = Some(value);
        self
    }

    pub fn confidence(mut self, value: f64) -> Self {
        self.confidence = value;
        self
    }

    pub fn note(mut self, text: impl Into<String>) -> Self {
        self.note = Some(text.into());
        self
    }

    fn to_pattern(&self, pattern_type: PatternType) -> ExtractedPattern {
        let mut pattern = ExtractedPattern::with_timestamp(pattern_type, self.timestamp)
            .triggers(self.triggers.iter().cloned())
            .coping_strategies(self.coping_strategies.iter().cloned())
            .with_confidence(self.confidence)
            .source_entry(self.entry_id.clone());

        if let Some(intensity) = self.intensity {
            pattern = pattern.intensity_level(intensity);
        }
        if let Some(note) = &self.note {
            pattern = pattern.details(note.clone());
        }
        for factor in &self.factors {
            pattern = pattern.factor(factor.clone());
        }
        pattern
    }
}

/// An automatic link whose write failed after the patterns were stored
#[derive(Debug, Clone, PartialEq)]
pub struct FailedLink {
    pub from: PatternId,
    pub to: PatternId,
    pub error: String,
}

/// What recording one journal entry produced
#[derive(Debug, Clone, Default)]
pub struct EntryOutcome {
    pub patterns: Vec<ExtractedPattern>,
    pub cascades: Vec<PatternCascade>,
    pub failed_links: Vec<FailedLink>,
    /// Candidate lookups that failed during automatic linking
    pub link_errors: Vec<String>,
}

impl EntryOutcome {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Pattern correlation engine over a repository
pub struct PatternEngine<R: PatternRepository> {
    repo: R,
    config: EngineConfig,
    graph: RwLock<CascadeGraph>,
    aggregator: DiscoveryAggregator,
    scorer: Option<Arc<dyn CascadeScorer>>,
    record_locks: StdMutex<HashMap<PatternId, Arc<Mutex<()>>>>,
}

impl<R: PatternRepository> PatternEngine<R> {
    /// Open the engine and load the cascade graph from the repository
    pub async fn open(repo: R, config: EngineConfig) -> EngineResult<Self> {
        let edges = repo.all_cascades().await?;
        let graph = CascadeGraph::from_edges(edges, &config.cascade);

        tracing::info!(
            store = repo.name(),
            cascades = graph.len(),
            "Pattern engine opened"
        );

        Ok(Self {
            repo,
            aggregator: DiscoveryAggregator::new(config.aggregation),
            config,
            graph: RwLock::new(graph),
            scorer: None,
            record_locks: StdMutex::new(HashMap::new()),
        })
    }

    /// Enable automatic cascade linking with this scorer
    pub fn with_scorer(mut self, scorer: Arc<dyn CascadeScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Replace the insight narrator
    pub fn with_narrator(mut self, narrator: Arc<dyn InsightNarrator>) -> Self {
        self.aggregator = self.aggregator.with_narrator(narrator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn record_lock(&self, id: PatternId) -> Arc<Mutex<()>> {
        let mut locks = self
            .record_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(id).or_default().clone()
    }

    /// Drop a caller's handle and forget the lock once nobody else holds it.
    /// Handles are only cloned under the table mutex, so the count is stable here.
    fn release_lock(&self, id: PatternId, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .record_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks.get(&id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn lock_table_len(&self) -> usize {
        self.record_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Classify and record one journal entry.
    ///
    /// One pattern is stored per distinct classified type. An entry whose
    /// details match nothing yields an empty outcome. Pattern write failures
    /// are returned. Once the patterns are stored the call succeeds: linking
    /// failures are reported in [`EntryOutcome::failed_links`] and
    /// [`EntryOutcome::link_errors`] and not retried.
    pub async fn record_entry(&self, entry: JournalObservation) -> EngineResult<EntryOutcome> {
        let types = classify(&entry.details);
        let mut outcome = EntryOutcome::default();

        if types.is_empty() {
            tracing::debug!(entry_id = %entry.entry_id, "Entry matched no patterns");
            return Ok(outcome);
        }

        for pattern_type in types {
            let pattern = entry.to_pattern(pattern_type);
            self.repo.create_pattern(&pattern).await?;
            outcome.patterns.push(pattern);
        }

        if let Some(scorer) = &self.scorer {
            self.link_recent(scorer.as_ref(), &mut outcome).await;
        }

        tracing::info!(
            entry_id = %entry.entry_id,
            patterns = outcome.patterns.len(),
            cascades = outcome.cascades.len(),
            failed_links = outcome.failed_links.len(),
            link_errors = outcome.link_errors.len(),
            "Recorded entry"
        );

        Ok(outcome)
    }

    async fn link_recent(&self, scorer: &dyn CascadeScorer, outcome: &mut EntryOutcome) {
        let window = self.config.cascade.link_window_ms;

        for index in 0..outcome.patterns.len() {
            let to = outcome.patterns[index].clone();
            let Some(range) = TimeRange::try_new(to.timestamp().saturating_sub(window), to.timestamp()) else {
                continue;
            };

            let earlier = match self
                .repo
                .list_patterns(&PatternFilter::new().time_range(range), PatternSort::TimestampAsc)
                .await
            {
                Ok(earlier) => earlier,
                Err(e) => {
                    tracing::warn!(
                        to = %to.id(),
                        error = %e,
                        "Failed to load cascade candidates"
                    );
                    outcome.link_errors.push(e.to_string());
                    continue;
                }
            };

            for from in &earlier {
                let Some(confidence) = scorer.score(from, &to) else {
                    continue;
                };
                if confidence.is_nan() || confidence < self.config.cascade.min_confidence {
                    continue;
                }

                match self
                    .write_edge(from.id(), to.id(), confidence, to.timestamp(), None)
                    .await
                {
                    Ok(edge) => outcome.cascades.push(edge),
                    Err(EngineError::Rejected(reason)) => {
                        tracing::debug!(%reason, "Skipped automatic cascade");
                    }
                    Err(e) => {
                        tracing::warn!(
                            from = %from.id(),
                            to = %to.id(),
                            error = %e,
                            "Failed to store automatic cascade"
                        );
                        outcome.failed_links.push(FailedLink {
                            from: from.id(),
                            to: to.id(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Store a single pattern observation
    pub async fn record_pattern(&self, pattern: ExtractedPattern) -> EngineResult<ExtractedPattern> {
        let lock = self.record_lock(pattern.id());
        let guard = lock.lock().await;
        let result = self.repo.create_pattern(&pattern).await;
        drop(guard);
        self.release_lock(pattern.id(), lock);

        result?;
        tracing::debug!(pattern_id = %pattern.id(), pattern_type = %pattern.pattern_type(), "Recorded pattern");
        Ok(pattern)
    }

    /// Apply an update to a stored pattern
    pub async fn update_pattern(
        &self,
        id: PatternId,
        update: PatternUpdate,
    ) -> EngineResult<ExtractedPattern> {
        let lock = self.record_lock(id);
        let guard = lock.lock().await;
        let result = self.apply_update(id, update).await;
        drop(guard);
        self.release_lock(id, lock);

        let pattern = result?;
        tracing::debug!(pattern_id = %id, "Updated pattern");
        Ok(pattern)
    }

    async fn apply_update(
        &self,
        id: PatternId,
        update: PatternUpdate,
    ) -> EngineResult<ExtractedPattern> {
        let mut pattern = self
            .repo
            .get_pattern(id)
            .await?
            .ok_or(EngineError::PatternNotFound(id))?;
        update.apply(&mut pattern);
        self.repo.update_pattern(&pattern).await?;
        Ok(pattern)
    }

    /// Delete a pattern and every cascade touching it
    pub async fn delete_pattern(&self, id: PatternId) -> EngineResult<Vec<CascadeId>> {
        let lock = self.record_lock(id);
        let guard = lock.lock().await;
        let mut graph = self.graph.write().await;

        let result = self.repo.delete_pattern(id).await;
        if result.is_ok() {
            graph.remove_pattern(id);
        }
        drop(graph);
        drop(guard);
        self.release_lock(id, lock);

        let removed = match result {
            Ok(removed) => removed,
            Err(StoreError::PatternNotFound(_)) => return Err(EngineError::PatternNotFound(id)),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(pattern_id = %id, cascades = removed.len(), "Deleted pattern");
        Ok(removed)
    }

    /// Propose a cascade `from → to` timestamped now
    pub async fn propose_cascade(
        &self,
        from: PatternId,
        to: PatternId,
        confidence: f64,
        description: Option<String>,
    ) -> EngineResult<PatternCascade> {
        self.propose_cascade_at(from, to, confidence, description, Utc::now().timestamp_millis())
            .await
    }

    /// Propose a cascade with an explicit timestamp
    pub async fn propose_cascade_at(
        &self,
        from: PatternId,
        to: PatternId,
        confidence: f64,
        description: Option<String>,
        at: i64,
    ) -> EngineResult<PatternCascade> {
        let edge = self.write_edge(from, to, confidence, at, description).await?;
        tracing::info!(
            cascade_id = %edge.id,
            from = %from,
            to = %to,
            confidence = edge.confidence,
            "Recorded cascade"
        );
        Ok(edge)
    }

    async fn write_edge(
        &self,
        from: PatternId,
        to: PatternId,
        confidence: f64,
        at: i64,
        description: Option<String>,
    ) -> EngineResult<PatternCascade> {
        let mut graph = self.graph.write().await;

        let mut edge = graph.prepare(from, to, confidence, at)?;
        if let Some(text) = description {
            edge = edge.description(text);
        }

        match self.repo.create_cascade(&edge).await {
            Ok(()) => {}
            Err(StoreError::PatternNotFound(missing)) => {
                return Err(CascadeRejection::MissingEndpoint(missing).into())
            }
            Err(e) => return Err(e.into()),
        }

        graph.insert(edge.clone());
        Ok(edge)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_pattern(&self, id: PatternId) -> EngineResult<Option<ExtractedPattern>> {
        Ok(self.repo.get_pattern(id).await?)
    }

    pub async fn list_patterns(
        &self,
        filter: &PatternFilter,
        sort: PatternSort,
    ) -> EngineResult<Vec<ExtractedPattern>> {
        Ok(self.repo.list_patterns(filter, sort).await?)
    }

    pub async fn has_cascades(&self, id: PatternId) -> bool {
        self.graph.read().await.has_cascades(id)
    }

    /// Edges leading out of a pattern, ordered by timestamp
    pub async fn cascades_to(&self, id: PatternId) -> Vec<PatternCascade> {
        self.graph
            .read()
            .await
            .cascades_to(id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Edges leading into a pattern, ordered by timestamp
    pub async fn cascades_from(&self, id: PatternId) -> Vec<PatternCascade> {
        self.graph
            .read()
            .await
            .cascades_from(id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn links(&self, id: PatternId) -> CascadeLinks {
        self.graph.read().await.links(id)
    }

    /// Patterns reachable from `id` within `max_depth` hops
    pub async fn downstream(&self, id: PatternId, max_depth: usize) -> Vec<PatternId> {
        self.graph.read().await.downstream(id, max_depth)
    }

    /// Aggregate discoveries over the stored history, optionally windowed
    pub async fn discoveries(&self, window: Option<TimeRange>) -> EngineResult<Vec<Discovery>> {
        let filter = match window {
            Some(range) => PatternFilter::new().time_range(range),
            None => PatternFilter::new(),
        };
        let patterns = self.repo.list_patterns(&filter, PatternSort::TimestampAsc).await?;
        Ok(self.aggregator.aggregate(&patterns, window))
    }

    /// Discoveries over the configured default window
    pub async fn recent_discoveries(&self) -> EngineResult<Vec<Discovery>> {
        let window = self.config.discovery_window_days.map(TimeRange::last_days);
        self.discoveries(window).await
    }

    /// Patterns whose source entry is not among the live journal entries
    pub async fn orphaned_patterns(
        &self,
        live_entry_ids: HashSet<String>,
    ) -> EngineResult<Vec<ExtractedPattern>> {
        let filter = PatternFilter::new().orphaned_from(live_entry_ids);
        Ok(self.repo.list_patterns(&filter, PatternSort::TimestampAsc).await?)
    }

    pub async fn stats(&self) -> EngineResult<StoreStats> {
        Ok(self.repo.stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::FixedConfidence;
    use crate::discovery::ConfidenceTier;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const HOUR: i64 = 3600 * 1000;
    const DAY: i64 = 24 * HOUR;
    // 2024-01-15T10:00:00Z
    const MORNING: i64 = 1_705_312_800_000;

    async fn engine() -> PatternEngine<MemoryStore> {
        PatternEngine::open(MemoryStore::new(), EngineConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_entry_classifies() {
        let engine = engine().await;
        let entry = JournalObservation::new("entry-1", MORNING)
            .detail("Too many things to do")
            .trigger("inbox")
            .intensity(4);

        let outcome = engine.record_entry(entry).await.unwrap();
        let types: Vec<PatternType> = outcome.patterns.iter().map(|p| p.pattern_type()).collect();
        assert_eq!(types, vec![PatternType::BurnoutIndicator, PatternType::DecisionFatigue]);
        for pattern in &outcome.patterns {
            assert_eq!(pattern.intensity(), 4);
            assert_eq!(pattern.source_entry_id.as_deref(), Some("entry-1"));
        }
        assert_eq!(engine.stats().await.unwrap().patterns, 2);
        assert!(outcome.cascades.is_empty());
    }

    #[tokio::test]
    async fn test_unclassified_entry_is_empty() {
        let engine = engine().await;
        let outcome = engine
            .record_entry(JournalObservation::new("entry-1", MORNING).detail("Nothing known"))
            .await
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(engine.stats().await.unwrap().patterns, 0);
    }

    #[tokio::test]
    async fn test_propose_cascade_rules() {
        let engine = engine().await;
        let a = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::SensoryOverload, MORNING))
            .await
            .unwrap();
        let b = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::Shutdown, MORNING + HOUR))
            .await
            .unwrap();

        assert!(matches!(
            engine.propose_cascade_at(a.id(), a.id(), 0.9, None, MORNING).await,
            Err(EngineError::Rejected(CascadeRejection::SelfLoop(_)))
        ));

        let first = engine
            .propose_cascade_at(a.id(), b.id(), 0.8, Some("loud room".into()), MORNING)
            .await
            .unwrap();
        assert_eq!(first.description.as_deref(), Some("loud room"));

        assert!(matches!(
            engine.propose_cascade_at(a.id(), b.id(), 0.8, None, MORNING + 2 * HOUR).await,
            Err(EngineError::Rejected(CascadeRejection::DuplicateSameDay { .. }))
        ));
        engine
            .propose_cascade_at(a.id(), b.id(), 0.8, None, MORNING + DAY)
            .await
            .unwrap();

        assert_eq!(engine.cascades_to(a.id()).await.len(), 2);
        assert_eq!(engine.cascades_from(b.id()).await.len(), 2);
        assert!(engine.has_cascades(b.id()).await);
        assert_eq!(engine.downstream(a.id(), 3).await, vec![b.id()]);
    }

    #[tokio::test]
    async fn test_missing_endpoint_rejected() {
        let engine = engine().await;
        let a = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::Headache, MORNING))
            .await
            .unwrap();
        let ghost = PatternId::new();

        assert!(matches!(
            engine.propose_cascade_at(a.id(), ghost, 0.5, None, MORNING).await,
            Err(EngineError::Rejected(CascadeRejection::MissingEndpoint(id))) if id == ghost
        ));
        assert!(!engine.has_cascades(a.id()).await);
    }

    #[tokio::test]
    async fn test_concurrent_proposals_dedup() {
        let engine = Arc::new(engine().await);
        let a = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::Headache, MORNING))
            .await
            .unwrap();
        let b = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::Irritability, MORNING))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            let (from, to) = (a.id(), b.id());
            handles.push(tokio::spawn(async move {
                engine.propose_cascade_at(from, to, 0.5, None, MORNING + i * 60_000).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(engine.repository().all_cascades().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_pattern_removes_edges() {
        let engine = engine().await;
        let a = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::SleepDisruption, MORNING))
            .await
            .unwrap();
        let b = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::LowEnergy, MORNING))
            .await
            .unwrap();
        let edge = engine
            .propose_cascade_at(a.id(), b.id(), 0.7, None, MORNING)
            .await
            .unwrap();

        let removed = engine.delete_pattern(b.id()).await.unwrap();
        assert_eq!(removed, vec![edge.id]);
        assert!(!engine.has_cascades(a.id()).await);
        assert!(matches!(
            engine.delete_pattern(b.id()).await,
            Err(EngineError::PatternNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_pattern() {
        let engine = engine().await;
        let a = engine
            .record_pattern(ExtractedPattern::with_timestamp(PatternType::Meltdown, MORNING))
            .await
            .unwrap();

        let updated = engine
            .update_pattern(a.id(), PatternUpdate::new().intensity(42).confidence(0.5))
            .await
            .unwrap();
        assert_eq!(updated.intensity(), 5);
        assert_eq!(updated.confidence(), 0.5);

        let stored = engine.get_pattern(a.id()).await.unwrap().unwrap();
        assert_eq!(stored, updated);

        assert!(matches!(
            engine.update_pattern(PatternId::new(), PatternUpdate::new()).await,
            Err(EngineError::PatternNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_automatic_linking() {
        let engine = engine().await.with_scorer(Arc::new(FixedConfidence(0.6)));

        let noisy = engine
            .record_entry(JournalObservation::new("entry-1", MORNING).detail("Noise level"))
            .await
            .unwrap();
        let later = engine
            .record_entry(
                JournalObservation::new("entry-2", MORNING + 2 * HOUR).detail("Task I keep avoiding"),
            )
            .await
            .unwrap();

        // 2 earlier patterns x 2 new patterns
        assert_eq!(later.cascades.len(), 4);
        assert!(later.failed_links.is_empty());
        for pattern in &noisy.patterns {
            assert_eq!(engine.cascades_to(pattern.id()).await.len(), 2);
        }

        // Outside the window
        let next_day = engine
            .record_entry(JournalObservation::new("entry-3", MORNING + DAY).detail("Travel"))
            .await
            .unwrap();
        assert!(next_day.cascades.is_empty());
    }

    #[tokio::test]
    async fn test_low_scores_not_linked() {
        let engine = engine().await.with_scorer(Arc::new(FixedConfidence(0.1)));
        engine
            .record_entry(JournalObservation::new("entry-1", MORNING).detail("Noise level"))
            .await
            .unwrap();
        let later = engine
            .record_entry(JournalObservation::new("entry-2", MORNING + HOUR).detail("Travel"))
            .await
            .unwrap();
        assert!(later.cascades.is_empty());
    }

    /// Memory store whose cascade writes or next pattern listing can be made to fail
    struct FlakyStore {
        inner: MemoryStore,
        fail_cascades: AtomicBool,
        fail_next_list: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_cascades: AtomicBool::new(false),
                fail_next_list: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl PatternRepository for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn create_pattern(&self, pattern: &ExtractedPattern) -> crate::store::StoreResult<()> {
            self.inner.create_pattern(pattern).await
        }
        async fn get_pattern(&self, id: PatternId) -> crate::store::StoreResult<Option<ExtractedPattern>> {
            self.inner.get_pattern(id).await
        }
        async fn update_pattern(&self, pattern: &ExtractedPattern) -> crate::store::StoreResult<()> {
            self.inner.update_pattern(pattern).await
        }
        async fn delete_pattern(&self, id: PatternId) -> crate::store::StoreResult<Vec<CascadeId>> {
            self.inner.delete_pattern(id).await
        }
        async fn create_cascade(&self, cascade: &PatternCascade) -> crate::store::StoreResult<()> {
            if self.fail_cascades.load(Ordering::SeqCst) {
                return Err(StoreError::Database("disk full".into()));
            }
            self.inner.create_cascade(cascade).await
        }
        async fn get_cascade(&self, id: CascadeId) -> crate::store::StoreResult<Option<PatternCascade>> {
            self.inner.get_cascade(id).await
        }
        async fn delete_cascade(&self, id: CascadeId) -> crate::store::StoreResult<bool> {
            self.inner.delete_cascade(id).await
        }
        async fn list_patterns(
            &self,
            filter: &PatternFilter,
            sort: PatternSort,
        ) -> crate::store::StoreResult<Vec<ExtractedPattern>> {
            if self.fail_next_list.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Database("database is locked".into()));
            }
            self.inner.list_patterns(filter, sort).await
        }
        async fn list_cascades(&self, pattern_id: PatternId) -> crate::store::StoreResult<CascadeLinks> {
            self.inner.list_cascades(pattern_id).await
        }
        async fn all_cascades(&self) -> crate::store::StoreResult<Vec<PatternCascade>> {
            self.inner.all_cascades().await
        }
        async fn stats(&self) -> crate::store::StoreResult<StoreStats> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn test_failed_links_reported() {
        let store = FlakyStore::new();
        store.fail_cascades.store(true, Ordering::SeqCst);
        let engine = PatternEngine::open(store, EngineConfig::default())
            .await
            .unwrap()
            .with_scorer(Arc::new(FixedConfidence(0.9)));

        engine
            .record_entry(JournalObservation::new("entry-1", MORNING).detail("Travel"))
            .await
            .unwrap();
        let outcome = engine
            .record_entry(JournalObservation::new("entry-2", MORNING + HOUR).detail("Headache"))
            .await
            .unwrap();

        // Travel and RoutineDisruption before, Headache after
        assert_eq!(outcome.patterns.len(), 1);
        assert!(outcome.cascades.is_empty());
        assert_eq!(outcome.failed_links.len(), 2);
        assert!(outcome.failed_links[0].error.contains("disk full"));
        assert_eq!(engine.stats().await.unwrap().patterns, 3);
        assert!(!engine.has_cascades(outcome.patterns[0].id()).await);

        // Nothing half-inserted: the pair can be linked once the store recovers
        engine.repository().fail_cascades.store(false, Ordering::SeqCst);
        let travel = engine
            .list_patterns(&PatternFilter::new().pattern_type(PatternType::Travel), PatternSort::default())
            .await
            .unwrap();
        engine
            .propose_cascade_at(travel[0].id(), outcome.patterns[0].id(), 0.9, None, MORNING + HOUR)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_entry_saved_when_candidate_lookup_fails() {
        let store = FlakyStore::new();
        store.fail_next_list.store(true, Ordering::SeqCst);
        let engine = PatternEngine::open(store, EngineConfig::default())
            .await
            .unwrap()
            .with_scorer(Arc::new(FixedConfidence(0.9)));

        let outcome = engine
            .record_entry(JournalObservation::new("entry-1", MORNING).detail("Noise level"))
            .await
            .unwrap();

        // SensoryOverload and NoiseSensitivity; the first lookup failed, the second ran
        assert_eq!(outcome.patterns.len(), 2);
        assert_eq!(outcome.link_errors.len(), 1);
        assert!(outcome.link_errors[0].contains("database is locked"));
        assert!(outcome.cascades.is_empty());
        assert_eq!(engine.stats().await.unwrap().patterns, 2);
    }

    #[tokio::test]
    async fn test_lock_table_does_not_grow() {
        let engine = engine().await;
        for i in 0..5 {
            let pattern = engine
                .record_pattern(ExtractedPattern::with_timestamp(PatternType::Headache, MORNING + i))
                .await
                .unwrap();
            engine
                .update_pattern(pattern.id(), PatternUpdate::new().intensity(2))
                .await
                .unwrap();
        }
        let _ = engine.update_pattern(PatternId::new(), PatternUpdate::new()).await;
        let _ = engine.delete_pattern(PatternId::new()).await;

        assert_eq!(engine.lock_table_len(), 0);
    }

    #[tokio::test]
    async fn test_graph_reloaded_on_open() {
        let store = MemoryStore::new();
        let a = ExtractedPattern::with_timestamp(PatternType::Headache, MORNING);
        let b = ExtractedPattern::with_timestamp(PatternType::Irritability, MORNING);
        store.create_pattern(&a).await.unwrap();
        store.create_pattern(&b).await.unwrap();
        store
            .create_cascade(&PatternCascade::new(a.id(), b.id(), 0.5, MORNING).unwrap())
            .await
            .unwrap();

        let engine = PatternEngine::open(store, EngineConfig::default()).await.unwrap();
        assert_eq!(engine.cascades_to(a.id()).await.len(), 1);
        assert!(matches!(
            engine.propose_cascade_at(a.id(), b.id(), 0.5, None, MORNING + HOUR).await,
            Err(EngineError::Rejected(CascadeRejection::DuplicateSameDay { .. }))
        ));
    }

    #[tokio::test]
    async fn test_discoveries_and_orphans() {
        let engine = engine().await;
        for (i, entry) in ["a", "b", "c", "d"].iter().enumerate() {
            engine
                .record_entry(
                    JournalObservation::new(*entry, MORNING + i as i64 * DAY)
                        .detail("Headache")
                        .trigger("screen time"),
                )
                .await
                .unwrap();
        }

        let discoveries = engine.discoveries(None).await.unwrap();
        assert_eq!(discoveries.len(), 1);
        assert_eq!(discoveries[0].confidence_tier, ConfidenceTier::Developing);

        let window = TimeRange::try_new(MORNING + DAY, MORNING + 3 * DAY).unwrap();
        let windowed = engine.discoveries(Some(window)).await.unwrap();
        assert_eq!(windowed[0].confidence_tier, ConfidenceTier::Emerging);

        let live: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let orphans = engine.orphaned_patterns(live).await.unwrap();
        let entries: Vec<&str> = orphans
            .iter()
            .filter_map(|p| p.source_entry_id.as_deref())
            .collect();
        assert_eq!(entries, vec!["c", "d"]);
    }
}
