//! Discovery Aggregator
//!
//! Turns the flat history of pattern observations into human-facing
//! discoveries: "this keeps happening, usually with these factors".
//!
//! - **aggregator**: Signature grouping and tiering
//! - **narrator**: Insight text for a discovery (pluggable)
//!
//! Discoveries are derived values. They are recomputed on every run, have
//! no identity across runs, and are never persisted.

mod aggregator;
mod narrator;

pub use aggregator::{DiscoveryAggregator, Signature};
pub use narrator::{InsightNarrator, Narrative, TemplateNarrator};

use crate::store::{Factor, PatternId};
use crate::taxonomy::PatternType;
use serde::Serialize;

/// How well-established a discovery is
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Emerging,
    Developing,
    Strong,
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Emerging => write!(f, "emerging"),
            ConfidenceTier::Developing => write!(f, "developing"),
            ConfidenceTier::Strong => write!(f, "strong"),
        }
    }
}

/// Occurrence thresholds for discoveries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationConfig {
    /// Smallest group that becomes a discovery (never below 2)
    pub min_occurrences: usize,
    /// Occurrences at which a discovery is `developing`
    pub developing_at: usize,
    /// Occurrences at which a discovery is `strong`
    pub strong_at: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 2,
            developing_at: 4,
            strong_at: 6,
        }
    }
}

impl AggregationConfig {
    /// Tier for a group size, or `None` if the group is too small
    pub fn tier(&self, occurrences: usize) -> Option<ConfidenceTier> {
        if occurrences < self.min_occurrences.max(2) {
            None
        } else if occurrences >= self.strong_at {
            Some(ConfidenceTier::Strong)
        } else if occurrences >= self.developing_at {
            Some(ConfidenceTier::Developing)
        } else {
            Some(ConfidenceTier::Emerging)
        }
    }
}

/// An aggregated insight over repeated observations
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Discovery {
    pub pattern_type: PatternType,
    /// Normalized tags shared by every observation in the group
    pub signature: Vec<String>,
    pub insight_text: String,
    /// Confidence reported by the narrator for `insight_text`
    pub insight_confidence: f64,
    pub confidence_tier: ConfidenceTier,
    pub occurrences: usize,
    /// Earliest contributing timestamp (ms)
    pub first_seen: i64,
    /// Latest contributing timestamp (ms)
    pub last_seen: i64,
    /// `last_seen - first_seen` in milliseconds
    pub timespan_ms: i64,
    pub factors: Vec<Factor>,
    pub related_entry_ids: Vec<String>,
    pub pattern_ids: Vec<PatternId>,
    /// Mean intensity over observations that set one
    pub average_intensity: Option<f64>,
}

impl Discovery {
    pub fn timespan(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.timespan_ms)
    }

    pub fn timespan_days(&self) -> f64 {
        self.timespan_ms as f64 / (24.0 * 3600.0 * 1000.0)
    }
}
