//! Cascade confidence scoring
//!
//! How confident a link between two observations is depends on the caller:
//! an extraction model, a category-affinity heuristic, or a fixed value.
//! The engine only asks a [`CascadeScorer`] and never assumes a formula.
//!
//! `None` means "do not link this pair".

use crate::store::ExtractedPattern;

/// Scores a candidate edge `from → to`
pub trait CascadeScorer: Send + Sync {
    fn score(&self, from: &ExtractedPattern, to: &ExtractedPattern) -> Option<f64>;
}

impl<F> CascadeScorer for F
where
    F: Fn(&ExtractedPattern, &ExtractedPattern) -> Option<f64> + Send + Sync,
{
    fn score(&self, from: &ExtractedPattern, to: &ExtractedPattern) -> Option<f64> {
        self(from, to)
    }
}

/// Gives every candidate pair the same confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedConfidence(pub f64);

impl CascadeScorer for FixedConfidence {
    fn score(&self, _from: &ExtractedPattern, _to: &ExtractedPattern) -> Option<f64> {
        Some(self.0)
    }
}
