//! Cascade Graph - directed edges between pattern observations
//!
//! An arena of edges keyed by id, plus two adjacency indexes keyed by
//! pattern id:
//!
//! ```text
//! outgoing: pattern → [edge ids where pattern is the source]   (cascadesTo)
//! incoming: pattern → [edge ids where pattern is the target]   (cascadesFrom)
//! ```
//!
//! Cycles and repeated edges are valid. The only uniqueness rule is that an
//! ordered pair gets at most one edge per calendar day.

use crate::cascade::CascadeConfig;
use crate::store::{CascadeId, CascadeLinks, CascadeRejection, PatternCascade, PatternId};
use chrono::{FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

/// Calendar day of a millisecond timestamp in the given offset
pub fn calendar_day(timestamp: i64, offset: &FixedOffset) -> Option<NaiveDate> {
    Utc.timestamp_millis_opt(timestamp)
        .single()
        .map(|dt| dt.with_timezone(offset).date_naive())
}

/// In-memory cascade graph
#[derive(Debug, Clone)]
pub struct CascadeGraph {
    edges: HashMap<CascadeId, PatternCascade>,
    outgoing: HashMap<PatternId, Vec<CascadeId>>,
    incoming: HashMap<PatternId, Vec<CascadeId>>,
    offset: FixedOffset,
}

impl Default for CascadeGraph {
    fn default() -> Self {
        Self::new(&CascadeConfig::default())
    }
}

impl CascadeGraph {
    /// Create an empty graph
    pub fn new(config: &CascadeConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or_else(|| {
            tracing::warn!(
                minutes = config.utc_offset_minutes,
                "Invalid UTC offset, using UTC for calendar days"
            );
            Utc.fix()
        });

        Self {
            edges: HashMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            offset,
        }
    }

    /// Rebuild from stored edges
    pub fn from_edges(edges: impl IntoIterator<Item = PatternCascade>, config: &CascadeConfig) -> Self {
        let mut graph = Self::new(config);
        for edge in edges {
            graph.insert(edge);
        }
        graph
    }

    /// Validate a proposed edge without inserting it
    pub fn prepare(
        &self,
        from: PatternId,
        to: PatternId,
        confidence: f64,
        at: i64,
    ) -> Result<PatternCascade, CascadeRejection> {
        let candidate = PatternCascade::new(from, to, confidence, at)?;

        if let Some(existing) = self.same_day_edge(from, to, at) {
            return Err(CascadeRejection::DuplicateSameDay {
                from,
                to,
                existing,
            });
        }

        Ok(candidate)
    }

    /// Validate and insert a proposed edge
    pub fn propose(
        &mut self,
        from: PatternId,
        to: PatternId,
        confidence: f64,
        at: i64,
    ) -> Result<PatternCascade, CascadeRejection> {
        let edge = self.prepare(from, to, confidence, at)?;
        self.insert(edge.clone());
        Ok(edge)
    }

    /// Insert an already-validated edge. Returns false if the id is present.
    pub fn insert(&mut self, edge: PatternCascade) -> bool {
        if self.edges.contains_key(&edge.id) {
            return false;
        }

        self.outgoing.entry(edge.from_pattern).or_default().push(edge.id);
        self.incoming.entry(edge.to_pattern).or_default().push(edge.id);
        self.edges.insert(edge.id, edge);
        true
    }

    fn same_day_edge(&self, from: PatternId, to: PatternId, at: i64) -> Option<CascadeId> {
        let day = calendar_day(at, &self.offset)?;
        self.outgoing
            .get(&from)?
            .iter()
            .filter_map(|id| self.edges.get(id))
            .find(|e| e.to_pattern == to && calendar_day(e.timestamp, &self.offset) == Some(day))
            .map(|e| e.id)
    }

    /// Remove a single edge
    pub fn remove_edge(&mut self, id: CascadeId) -> Option<PatternCascade> {
        let edge = self.edges.remove(&id)?;
        detach(&mut self.outgoing, edge.from_pattern, id);
        detach(&mut self.incoming, edge.to_pattern, id);
        Some(edge)
    }

    /// Remove every edge touching a pattern; returns the removed ids
    pub fn remove_pattern(&mut self, pattern: PatternId) -> Vec<CascadeId> {
        let mut ids: Vec<CascadeId> = self
            .outgoing
            .get(&pattern)
            .into_iter()
            .chain(self.incoming.get(&pattern))
            .flatten()
            .copied()
            .collect();
        ids.sort();
        ids.dedup();

        for id in &ids {
            self.remove_edge(*id);
        }
        ids
    }

    pub fn get(&self, id: CascadeId) -> Option<&PatternCascade> {
        self.edges.get(&id)
    }

    /// Whether a pattern has any incoming or outgoing edge
    pub fn has_cascades(&self, pattern: PatternId) -> bool {
        let non_empty = |index: &HashMap<PatternId, Vec<CascadeId>>| {
            index.get(&pattern).map(|ids| !ids.is_empty()).unwrap_or(false)
        };
        non_empty(&self.outgoing) || non_empty(&self.incoming)
    }

    /// Edges leading out of a pattern, ordered by timestamp
    pub fn cascades_to(&self, pattern: PatternId) -> Vec<&PatternCascade> {
        self.resolve(self.outgoing.get(&pattern))
    }

    /// Edges leading into a pattern, ordered by timestamp
    pub fn cascades_from(&self, pattern: PatternId) -> Vec<&PatternCascade> {
        self.resolve(self.incoming.get(&pattern))
    }

    /// Both directions as owned lists
    pub fn links(&self, pattern: PatternId) -> CascadeLinks {
        CascadeLinks {
            incoming: self.cascades_from(pattern).into_iter().cloned().collect(),
            outgoing: self.cascades_to(pattern).into_iter().cloned().collect(),
        }
    }

    /// All edges for an ordered pair, ordered by timestamp
    pub fn edges_between(&self, from: PatternId, to: PatternId) -> Vec<&PatternCascade> {
        self.cascades_to(from)
            .into_iter()
            .filter(|e| e.to_pattern == to)
            .collect()
    }

    /// Patterns reachable from `start` within `max_depth` hops, nearest
    /// first. `start` itself is never included, even when a cycle leads
    /// back to it.
    pub fn downstream(&self, start: PatternId, max_depth: usize) -> Vec<PatternId> {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut reached = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for edge in self.cascades_to(current) {
                if visited.insert(edge.to_pattern) {
                    reached.push(edge.to_pattern);
                    queue.push_back((edge.to_pattern, depth + 1));
                }
            }
        }

        reached
    }

    /// Iterate over all edges in no particular order
    pub fn edges(&self) -> impl Iterator<Item = &PatternCascade> {
        self.edges.values()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn resolve(&self, ids: Option<&Vec<CascadeId>>) -> Vec<&PatternCascade> {
        let mut edges: Vec<&PatternCascade> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
            .collect();
        edges.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        edges
    }
}

fn detach(index: &mut HashMap<PatternId, Vec<CascadeId>>, pattern: PatternId, id: CascadeId) {
    if let Some(ids) = index.get_mut(&pattern) {
        ids.retain(|existing| *existing != id);
        if ids.is_empty() {
            index.remove(&pattern);
        }
    }
}
