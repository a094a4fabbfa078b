//! Signature grouping over pattern observations
//!
//! Observations are grouped by signature:
//!
//! ```text
//! (pattern_type, sorted { normalize(tag) : tag ∈ triggers ∪ coping_strategies })
//! normalize(tag) = lowercase(trim(tag)), blanks dropped
//! ```
//!
//! Groups are kept in a `BTreeMap`, so the same input always yields the same
//! groups in the same order. The aggregator keeps no state between runs.

use crate::discovery::{AggregationConfig, Discovery, InsightNarrator, TemplateNarrator};
use crate::store::{clamp_confidence, ExtractedPattern, Factor, FactorType, TimeRange};
use crate::taxonomy::PatternType;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Grouping key for observations
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub pattern_type: PatternType,
    pub tags: Vec<String>,
}

impl Signature {
    pub fn of(pattern: &ExtractedPattern) -> Self {
        let tags: BTreeSet<String> = pattern
            .triggers
            .iter()
            .chain(&pattern.coping_strategies)
            .filter_map(|t| normalize_tag(t))
            .collect();

        Self {
            pattern_type: pattern.pattern_type(),
            tags: tags.into_iter().collect(),
        }
    }
}

fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Groups repeated observations into tiered discoveries
#[derive(Clone)]
pub struct DiscoveryAggregator {
    config: AggregationConfig,
    narrator: Arc<dyn InsightNarrator>,
}

impl Default for DiscoveryAggregator {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}

impl DiscoveryAggregator {
    /// Create an aggregator with the template narrator
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            config,
            narrator: Arc::new(TemplateNarrator),
        }
    }

    /// Replace the narrator
    pub fn with_narrator(mut self, narrator: Arc<dyn InsightNarrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Compute discoveries from a snapshot of observations.
    ///
    /// Only observations inside `window` (if given) are considered. Output is
    /// ordered by occurrences (most first), then most recent, then type and
    /// signature.
    pub fn aggregate(
        &self,
        patterns: &[ExtractedPattern],
        window: Option<TimeRange>,
    ) -> Vec<Discovery> {
        let mut groups: BTreeMap<Signature, Vec<&ExtractedPattern>> = BTreeMap::new();
        for pattern in patterns {
            if let Some(range) = window {
                if !range.contains(pattern.timestamp()) {
                    continue;
                }
            }
            groups.entry(Signature::of(pattern)).or_default().push(pattern);
        }

        let mut discoveries: Vec<Discovery> = groups
            .into_iter()
            .filter_map(|(signature, members)| self.build(signature, members))
            .collect();

        discoveries.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then(b.last_seen.cmp(&a.last_seen))
                .then(a.pattern_type.cmp(&b.pattern_type))
                .then(a.signature.cmp(&b.signature))
        });

        tracing::debug!(
            patterns = patterns.len(),
            discoveries = discoveries.len(),
            "Aggregated discoveries"
        );

        discoveries
    }

    fn build(
        &self,
        signature: Signature,
        mut members: Vec<&ExtractedPattern>,
    ) -> Option<Discovery> {
        let tier = self.config.tier(members.len())?;
        members.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()).then(a.id().cmp(&b.id())));

        let first_seen = members.first()?.timestamp();
        let last_seen = members.last()?.timestamp();

        let mut seen_entries = HashSet::new();
        let related_entry_ids: Vec<String> = members
            .iter()
            .filter_map(|p| p.source_entry_id.clone())
            .filter(|id| seen_entries.insert(id.clone()))
            .collect();

        let intensities: Vec<f64> = members
            .iter()
            .map(|p| p.intensity())
            .filter(|i| *i > 0)
            .map(f64::from)
            .collect();
        let average_intensity = if intensities.is_empty() {
            None
        } else {
            Some(intensities.iter().sum::<f64>() / intensities.len() as f64)
        };

        let mut discovery = Discovery {
            pattern_type: signature.pattern_type,
            signature: signature.tags,
            insight_text: String::new(),
            insight_confidence: 0.0,
            confidence_tier: tier,
            occurrences: members.len(),
            first_seen,
            last_seen,
            timespan_ms: last_seen - first_seen,
            factors: collect_factors(&members),
            related_entry_ids,
            pattern_ids: members.iter().map(|p| p.id()).collect(),
            average_intensity,
        };

        let narrative = self.narrator.narrate(&discovery);
        discovery.insight_text = narrative.text;
        discovery.insight_confidence = clamp_confidence(narrative.confidence);
        Some(discovery)
    }
}

/// Union of explicit factors, triggers (as context) and coping strategies
/// (as activity). Keyed by normalized name; explicit factors win.
fn collect_factors(members: &[&ExtractedPattern]) -> Vec<Factor> {
    let mut by_name: BTreeMap<String, Factor> = BTreeMap::new();

    for pattern in members {
        for factor in &pattern.contributing_factors {
            if let Some(key) = normalize_tag(&factor.name) {
                by_name.entry(key).or_insert_with(|| factor.clone());
            }
        }
    }

    for pattern in members {
        let tagged = pattern
            .triggers
            .iter()
            .map(|t| (t, FactorType::Context))
            .chain(pattern.coping_strategies.iter().map(|t| (t, FactorType::Activity)));

        for (tag, factor_type) in tagged {
            if let Some(key) = normalize_tag(tag) {
                by_name
                    .entry(key)
                    .or_insert_with(|| Factor::new(tag.trim(), factor_type));
            }
        }
    }

    by_name.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{ConfidenceTier, Narrative};

    const DAY: i64 = 24 * 3600 * 1000;
    const START: i64 = 1_705_312_800_000;

    fn observations(pattern_type: PatternType, count: usize) -> Vec<ExtractedPattern> {
        (0..count)
            .map(|i| {
                ExtractedPattern::with_timestamp(pattern_type, START + i as i64 * DAY)
                    .trigger("Loud cafe")
                    .coping("headphones")
                    .intensity_level(i as i64 + 1)
                    .source_entry(format!("entry-{}", i))
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(DiscoveryAggregator::default().aggregate(&[], None).is_empty());
    }

    #[test]
    fn test_thresholds() {
        let aggregator = DiscoveryAggregator::default();
        let cases = [
            (1, None),
            (2, Some(ConfidenceTier::Emerging)),
            (4, Some(ConfidenceTier::Developing)),
            (6, Some(ConfidenceTier::Strong)),
        ];

        for (count, expected) in cases {
            let discoveries = aggregator.aggregate(&observations(PatternType::Shutdown, count), None);
            match expected {
                None => assert!(discoveries.is_empty(), "{} occurrences promoted", count),
                Some(tier) => {
                    assert_eq!(discoveries.len(), 1);
                    assert_eq!(discoveries[0].confidence_tier, tier);
                    assert_eq!(discoveries[0].occurrences, count);
                }
            }
        }
    }

    #[test]
    fn test_group_details() {
        let patterns = observations(PatternType::SensoryOverload, 4);
        let discoveries = DiscoveryAggregator::default().aggregate(&patterns, None);
        assert_eq!(discoveries.len(), 1);

        let d = &discoveries[0];
        assert_eq!(d.pattern_type, PatternType::SensoryOverload);
        assert_eq!(d.signature, vec!["headphones", "loud cafe"]);
        assert_eq!(d.timespan_ms, 3 * DAY);
        assert_eq!(d.first_seen, START);
        assert_eq!(
            d.related_entry_ids,
            vec!["entry-0", "entry-1", "entry-2", "entry-3"]
        );
        assert_eq!(
            d.factors,
            vec![
                Factor::new("headphones", FactorType::Activity),
                Factor::new("Loud cafe", FactorType::Context),
            ]
        );
        assert_eq!(d.average_intensity, Some(2.5));
        assert!(d.insight_text.contains("Sensory Overload"));
    }

    #[test]
    fn test_signature_normalizes_tags() {
        let a = ExtractedPattern::with_timestamp(PatternType::Headache, START)
            .triggers(["Screen time", "skipped lunch"]);
        let b = ExtractedPattern::with_timestamp(PatternType::Headache, START + DAY)
            .triggers(["skipped lunch "])
            .coping("SCREEN TIME");
        assert_eq!(Signature::of(&a), Signature::of(&b));

        let c = ExtractedPattern::with_timestamp(PatternType::Headache, START).trigger("other");
        assert_ne!(Signature::of(&a), Signature::of(&c));
    }

    #[test]
    fn test_different_types_not_grouped() {
        let mut patterns = observations(PatternType::SensoryOverload, 1);
        patterns.extend(observations(PatternType::Shutdown, 1));
        assert!(DiscoveryAggregator::default().aggregate(&patterns, None).is_empty());
    }

    #[test]
    fn test_window_excludes_outside() {
        let patterns = observations(PatternType::Shutdown, 6);
        let window = TimeRange::try_new(START + 2 * DAY, START + 10 * DAY).unwrap();
        let discoveries = DiscoveryAggregator::default().aggregate(&patterns, Some(window));
        assert_eq!(discoveries.len(), 1);
        assert_eq!(discoveries[0].occurrences, 4);
        assert_eq!(discoveries[0].confidence_tier, ConfidenceTier::Developing);
    }

    #[test]
    fn test_stable_output() {
        let mut patterns = observations(PatternType::Shutdown, 3);
        patterns.extend(observations(PatternType::Meltdown, 3));
        patterns.extend(observations(PatternType::Headache, 5));

        let aggregator = DiscoveryAggregator::default();
        let first = aggregator.aggregate(&patterns, None);
        patterns.reverse();
        let second = aggregator.aggregate(&patterns, None);
        assert_eq!(first, second);

        let order: Vec<PatternType> = first.iter().map(|d| d.pattern_type).collect();
        assert_eq!(
            order,
            vec![PatternType::Headache, PatternType::Meltdown, PatternType::Shutdown]
        );
    }

    #[test]
    fn test_explicit_factor_type_wins() {
        let patterns: Vec<ExtractedPattern> = (0..2)
            .map(|i| {
                ExtractedPattern::with_timestamp(PatternType::Headache, START + i * DAY)
                    .trigger("ibuprofen")
                    .factor(Factor::new("Ibuprofen", FactorType::Medication))
            })
            .collect();

        let discoveries = DiscoveryAggregator::default().aggregate(&patterns, None);
        assert_eq!(
            discoveries[0].factors,
            vec![Factor::new("Ibuprofen", FactorType::Medication)]
        );
    }

    #[test]
    fn test_clamped_data_does_not_fail() {
        let patterns: Vec<ExtractedPattern> = (0..2)
            .map(|i| {
                ExtractedPattern::with_timestamp(PatternType::Headache, START + i * DAY)
                    .intensity_level(-100)
                    .with_confidence(f64::INFINITY)
            })
            .collect();

        let discoveries = DiscoveryAggregator::default().aggregate(&patterns, None);
        assert_eq!(discoveries.len(), 1);
        assert_eq!(discoveries[0].average_intensity, None);
        assert!(discoveries[0].signature.is_empty());
    }

    struct Fixed;

    impl InsightNarrator for Fixed {
        fn narrate(&self, _discovery: &Discovery) -> Narrative {
            Narrative {
                text: "custom".to_string(),
                confidence: 2.0,
            }
        }
    }

    #[test]
    fn test_custom_narrator() {
        let aggregator = DiscoveryAggregator::default().with_narrator(Arc::new(Fixed));
        let discoveries = aggregator.aggregate(&observations(PatternType::Shutdown, 2), None);
        assert_eq!(discoveries[0].insight_text, "custom");
        assert_eq!(discoveries[0].insight_confidence, 1.0);
    }

    struct Unsure;

    impl InsightNarrator for Unsure {
        fn narrate(&self, _discovery: &Discovery) -> Narrative {
            Narrative {
                text: "unsure".to_string(),
                confidence: f64::NAN,
            }
        }
    }

    #[test]
    fn test_nan_narrator_confidence() {
        let aggregator = DiscoveryAggregator::default().with_narrator(Arc::new(Unsure));
        let discoveries = aggregator.aggregate(&observations(PatternType::Shutdown, 2), None);
        assert_eq!(discoveries[0].insight_confidence, 0.0);
    }
}
