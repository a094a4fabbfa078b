//! Cascade Graph
//!
//! Hypothesized causal chains between pattern observations
//! ("sensory overload → shutdown"):
//!
//! - **graph**: Edge arena + adjacency index, proposal rules, traversal
//! - **scoring**: Pluggable confidence for automatically proposed edges
//!
//! # Rules
//!
//! ```text
//! propose(a, a, _)            → SelfLoop
//! propose(a, b, _) twice/day  → DuplicateSameDay
//! propose(a, b, _) next day   → second edge (repeats strengthen the link)
//! delete(a)                   → every edge touching a is removed
//! ```

mod graph;
mod scoring;

pub use graph::{calendar_day, CascadeGraph};
pub use scoring::{CascadeScorer, FixedConfidence};

pub use crate::store::CascadeRejection;

/// Parameters for cascade proposal and automatic linking
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
    /// How far back a new pattern looks for earlier patterns to link from
    pub link_window_ms: i64,
    /// Scored pairs below this are not linked
    pub min_confidence: f64,
    /// Offset used to decide which calendar day an edge falls on
    pub utc_offset_minutes: i32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            link_window_ms: 6 * 3600 * 1000, // 6 hours
            min_confidence: 0.3,
            utc_offset_minutes: 0,
        }
    }
}
