//! Core record types for the pattern store
//!
//! - `ExtractedPattern`: one observation of a pattern in a journal entry
//! - `PatternCascade`: a directed edge between two observations
//! - `Factor`: a typed contributing factor
//! - `TimeRange`, `PatternFilter`, `PatternSort`: query inputs

use crate::store::error::CascadeRejection;
use crate::taxonomy::{PatternCategory, PatternType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of an extracted pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatternId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unique identifier of a cascade edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CascadeId(Uuid);

impl CascadeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for CascadeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CascadeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CascadeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of contributing factor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FactorType {
    Medication,
    Time,
    Context,
    Symptom,
    Activity,
}

impl std::fmt::Display for FactorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorType::Medication => write!(f, "medication"),
            FactorType::Time => write!(f, "time"),
            FactorType::Context => write!(f, "context"),
            FactorType::Symptom => write!(f, "symptom"),
            FactorType::Activity => write!(f, "activity"),
        }
    }
}

/// A named, typed factor that contributed to an observation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Factor {
    pub name: String,
    #[serde(rename = "type")]
    pub factor_type: FactorType,
}

impl Factor {
    pub fn new(name: impl Into<String>, factor_type: FactorType) -> Self {
        Self {
            name: name.into(),
            factor_type,
        }
    }
}

/// Clamp a raw intensity into `[0, 5]`; 0 means unset
pub fn clamp_intensity(value: i64) -> u8 {
    value.clamp(0, 5) as u8
}

/// Clamp a confidence into `[0, 1]`; NaN becomes 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn clean_tag(tag: impl Into<String>) -> Option<String> {
    let tag = tag.into();
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A single timestamped observation of a pattern
///
/// Identity, type, category and timestamp are fixed at creation. Intensity
/// and confidence are clamped on every write.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractedPattern {
    id: PatternId,
    pattern_type: PatternType,
    category: PatternCategory,
    intensity: u8,
    confidence: f64,
    /// Unix timestamp in milliseconds
    timestamp: i64,
    /// Free text entered in the details field
    pub details: Option<String>,
    /// Only meaningful when the type has a duration
    pub duration_minutes: Option<u32>,
    pub triggers: Vec<String>,
    pub coping_strategies: Vec<String>,
    pub contributing_factors: Vec<Factor>,
    /// Journal entry this was extracted from (weak reference)
    pub source_entry_id: Option<String>,
}

impl ExtractedPattern {
    /// Create a new observation timestamped now
    pub fn new(pattern_type: PatternType) -> Self {
        Self::with_timestamp(pattern_type, Utc::now().timestamp_millis())
    }

    /// Create an observation with a specific timestamp
    pub fn with_timestamp(pattern_type: PatternType, timestamp: i64) -> Self {
        Self {
            id: PatternId::new(),
            pattern_type,
            category: pattern_type.category(),
            intensity: 0,
            confidence: 1.0,
            timestamp,
            details: None,
            duration_minutes: None,
            triggers: Vec::new(),
            coping_strategies: Vec::new(),
            contributing_factors: Vec::new(),
            source_entry_id: None,
        }
    }

    /// Rebuild a stored observation. The category is always derived from the
    /// type.
    pub(crate) fn restore(id: PatternId, pattern_type: PatternType, timestamp: i64) -> Self {
        let mut pattern = Self::with_timestamp(pattern_type, timestamp);
        pattern.id = id;
        pattern
    }

    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn pattern_type(&self) -> PatternType {
        self.pattern_type
    }

    pub fn category(&self) -> PatternCategory {
        self.category
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Set intensity, clamping into `[0, 5]`
    pub fn set_intensity(&mut self, value: i64) {
        self.intensity = clamp_intensity(value);
    }

    /// Set confidence, clamping into `[0, 1]`
    pub fn set_confidence(&mut self, value: f64) {
        self.confidence = clamp_confidence(value);
    }

    /// Builder: set intensity (clamped)
    pub fn intensity_level(mut self, value: i64) -> Self {
        self.set_intensity(value);
        self
    }

    /// Builder: set confidence (clamped)
    pub fn with_confidence(mut self, value: f64) -> Self {
        self.set_confidence(value);
        self
    }

    /// Builder: add a trigger; blank tags are dropped
    pub fn trigger(mut self, tag: impl Into<String>) -> Self {
        self.triggers.extend(clean_tag(tag));
        self
    }

    /// Builder: add multiple triggers
    pub fn triggers<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers
            .extend(tags.into_iter().filter_map(|t| clean_tag(t)));
        self
    }

    /// Builder: add a coping strategy; blank tags are dropped
    pub fn coping(mut self, tag: impl Into<String>) -> Self {
        self.coping_strategies.extend(clean_tag(tag));
        self
    }

    /// Builder: add multiple coping strategies
    pub fn coping_strategies<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coping_strategies
            .extend(tags.into_iter().filter_map(|t| clean_tag(t)));
        self
    }

    /// Builder: add a contributing factor
    pub fn factor(mut self, factor: Factor) -> Self {
        self.contributing_factors.push(factor);
        self
    }

    /// Builder: set the source journal entry
    pub fn source_entry(mut self, entry_id: impl Into<String>) -> Self {
        self.source_entry_id = Some(entry_id.into());
        self
    }

    /// Builder: set free-text details
    pub fn details(mut self, text: impl Into<String>) -> Self {
        self.details = Some(text.into());
        self
    }

    /// Builder: set duration (ignored for types without a duration)
    pub fn duration(mut self, minutes: u32) -> Self {
        if self.pattern_type.has_duration() {
            self.duration_minutes = Some(minutes);
        }
        self
    }

    /// Whether the source entry is absent from the given live entry set
    pub fn is_orphaned(&self, live_entries: &HashSet<String>) -> bool {
        match &self.source_entry_id {
            Some(entry) => !live_entries.contains(entry),
            None => true,
        }
    }
}

/// Mutable fields of a stored observation
#[derive(Debug, Clone, Default)]
pub struct PatternUpdate {
    pub intensity: Option<i64>,
    pub confidence: Option<f64>,
    pub details: Option<Option<String>>,
    pub duration_minutes: Option<Option<u32>>,
    pub triggers: Option<Vec<String>>,
    pub coping_strategies: Option<Vec<String>>,
    pub contributing_factors: Option<Vec<Factor>>,
    pub source_entry_id: Option<Option<String>>,
}

impl PatternUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intensity(mut self, value: i64) -> Self {
        self.intensity = Some(value);
        self
    }

    pub fn confidence(mut self, value: f64) -> Self {
        self.confidence = Some(value);
        self
    }

    pub fn triggers(mut self, tags: Vec<String>) -> Self {
        self.triggers = Some(tags);
        self
    }

    pub fn coping_strategies(mut self, tags: Vec<String>) -> Self {
        self.coping_strategies = Some(tags);
        self
    }

    pub fn detach_entry(mut self) -> Self {
        self.source_entry_id = Some(None);
        self
    }

    /// Apply to a pattern. Id, type, category and timestamp are untouched.
    pub fn apply(self, pattern: &mut ExtractedPattern) {
        if let Some(value) = self.intensity {
            pattern.set_intensity(value);
        }
        if let Some(value) = self.confidence {
            pattern.set_confidence(value);
        }
        if let Some(details) = self.details {
            pattern.details = details;
        }
        if let Some(minutes) = self.duration_minutes {
            let has_duration = pattern.pattern_type.has_duration();
            pattern.duration_minutes = minutes.filter(|_| has_duration);
        }
        if let Some(tags) = self.triggers {
            pattern.triggers = tags.into_iter().filter_map(|t| clean_tag(t)).collect();
        }
        if let Some(tags) = self.coping_strategies {
            pattern.coping_strategies = tags.into_iter().filter_map(|t| clean_tag(t)).collect();
        }
        if let Some(factors) = self.contributing_factors {
            pattern.contributing_factors = factors;
        }
        if let Some(entry) = self.source_entry_id {
            pattern.source_entry_id = entry;
        }
    }
}

/// A directed, confidence-scored link between two observations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternCascade {
    pub id: CascadeId,
    pub from_pattern: PatternId,
    pub to_pattern: PatternId,
    pub confidence: f64,
    #[serde(default)]
    pub description: Option<String>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl PatternCascade {
    /// Create an edge. Self-loops are rejected; confidence is clamped.
    pub fn new(
        from: PatternId,
        to: PatternId,
        confidence: f64,
        timestamp: i64,
    ) -> Result<Self, CascadeRejection> {
        if from == to {
            return Err(CascadeRejection::SelfLoop(from));
        }

        Ok(Self {
            id: CascadeId::new(),
            from_pattern: from,
            to_pattern: to,
            confidence: clamp_confidence(confidence),
            description: None,
            timestamp,
        })
    }

    /// Builder: set description
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Whether this edge touches the given pattern
    pub fn touches(&self, id: PatternId) -> bool {
        self.from_pattern == id || self.to_pattern == id
    }
}

/// Incoming and outgoing edges of one pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CascadeLinks {
    /// Edges ending at the pattern
    pub incoming: Vec<PatternCascade>,
    /// Edges starting at the pattern
    pub outgoing: Vec<PatternCascade>,
}

impl CascadeLinks {
    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }
}

/// Time range for queries (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (exclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a time range, returning None if start >= end
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// The `days` days ending at (and including) `end`.
    /// Spans past the representable range clamp to the earliest timestamp.
    pub fn days_ending_at(end: i64, days: i64) -> Self {
        let span = days.max(0).saturating_mul(24 * 3600 * 1000);
        Self {
            start: end.saturating_sub(span),
            end: end.saturating_add(1),
        }
    }

    /// Create a range for the last N days from now
    pub fn last_days(days: i64) -> Self {
        Self::days_ending_at(Utc::now().timestamp_millis(), days)
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Get the duration in milliseconds
    pub fn duration_millis(&self) -> i64 {
        self.end - self.start
    }
}

/// Ordering for pattern listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternSort {
    #[default]
    TimestampAsc,
    TimestampDesc,
    IntensityDesc,
}

impl PatternSort {
    /// Sort in place; ties broken by id for stable output
    pub fn apply(&self, patterns: &mut [ExtractedPattern]) {
        match self {
            PatternSort::TimestampAsc => {
                patterns.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
            }
            PatternSort::TimestampDesc => {
                patterns.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)))
            }
            PatternSort::IntensityDesc => patterns.sort_by(|a, b| {
                b.intensity
                    .cmp(&a.intensity)
                    .then(b.timestamp.cmp(&a.timestamp))
                    .then(a.id.cmp(&b.id))
            }),
        }
    }
}

/// Query filter for pattern listings
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    pub pattern_type: Option<PatternType>,
    pub category: Option<PatternCategory>,
    pub time_range: Option<TimeRange>,
    pub source_entry_id: Option<String>,
    /// Only patterns whose source entry is not in this set
    pub orphaned_from: Option<HashSet<String>>,
    pub min_intensity: Option<u8>,
}

impl PatternFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern_type(mut self, pattern_type: PatternType) -> Self {
        self.pattern_type = Some(pattern_type);
        self
    }

    pub fn category(mut self, category: PatternCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn source_entry(mut self, entry_id: impl Into<String>) -> Self {
        self.source_entry_id = Some(entry_id.into());
        self
    }

    pub fn orphaned_from(mut self, live_entries: HashSet<String>) -> Self {
        self.orphaned_from = Some(live_entries);
        self
    }

    pub fn min_intensity(mut self, intensity: u8) -> Self {
        self.min_intensity = Some(intensity);
        self
    }

    /// Check if a pattern matches this filter
    pub fn matches(&self, pattern: &ExtractedPattern) -> bool {
        if let Some(t) = self.pattern_type {
            if pattern.pattern_type != t {
                return false;
            }
        }

        if let Some(c) = self.category {
            if pattern.category != c {
                return false;
            }
        }

        if let Some(range) = self.time_range {
            if !range.contains(pattern.timestamp) {
                return false;
            }
        }

        if let Some(entry) = &self.source_entry_id {
            if pattern.source_entry_id.as_ref() != Some(entry) {
                return false;
            }
        }

        if let Some(live) = &self.orphaned_from {
            if !pattern.is_orphaned(live) {
                return false;
            }
        }

        if let Some(min) = self.min_intensity {
            if pattern.intensity < min {
                return false;
            }
        }

        true
    }
}

/// Counts reported by a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub patterns: u64,
    pub cascades: u64,
    /// Rows that could not be decoded and were skipped
    pub skipped_rows: u64,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "patterns={}, cascades={}, skipped_rows={}",
            self.patterns, self.cascades, self.skipped_rows
        )
    }
}
