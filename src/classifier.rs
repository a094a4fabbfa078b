//! Detail Classifier
//!
//! Maps the contextual details a user selects for a journal entry onto
//! pattern types. Details come from five independent axes (environment,
//! event, health, social, demand); each known detail maps to one or two
//! pattern types.
//!
//! # Example
//! ```
//! use patternlog::classifier::classify;
//! use patternlog::taxonomy::PatternType;
//!
//! let types = classify(["Too many things to do", "Task I keep avoiding"]);
//! assert_eq!(
//!     types,
//!     vec![
//!         PatternType::BurnoutIndicator,
//!         PatternType::DecisionFatigue,
//!         PatternType::TaskAvoidance,
//!         PatternType::TaskInitiation,
//!     ]
//! );
//! ```
//!
//! # Design Notes
//! - Lookup is exact and case-sensitive
//! - Unknown details are ignored, never an error
//! - Output is deduplicated and sorted by canonical string

use crate::taxonomy::PatternType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Axis a detail was selected from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DetailAxis {
    Environment,
    Event,
    Health,
    Social,
    Demand,
}

impl DetailAxis {
    pub fn all() -> &'static [DetailAxis] {
        &[
            DetailAxis::Environment,
            DetailAxis::Event,
            DetailAxis::Health,
            DetailAxis::Social,
            DetailAxis::Demand,
        ]
    }
}

impl std::fmt::Display for DetailAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetailAxis::Environment => write!(f, "environment"),
            DetailAxis::Event => write!(f, "event"),
            DetailAxis::Health => write!(f, "health"),
            DetailAxis::Social => write!(f, "social"),
            DetailAxis::Demand => write!(f, "demand"),
        }
    }
}

/// One row of the classification table
#[derive(Debug, Clone, Copy)]
pub struct DetailRule {
    pub detail: &'static str,
    pub axis: DetailAxis,
    pub patterns: &'static [PatternType],
}

/// Which detail produced which pattern types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub detail: String,
    pub axis: DetailAxis,
    pub patterns: Vec<PatternType>,
}

use DetailAxis::*;
use PatternType as P;

const fn rule(
    detail: &'static str,
    axis: DetailAxis,
    patterns: &'static [PatternType],
) -> DetailRule {
    DetailRule {
        detail,
        axis,
        patterns,
    }
}

/// The detail → pattern table
pub static DETAIL_RULES: &[DetailRule] = &[
    // Environment
    rule("Noise level", Environment, &[P::SensoryOverload, P::NoiseSensitivity]),
    rule("Bright lights", Environment, &[P::SensoryOverload, P::LightSensitivity]),
    rule("Crowded space", Environment, &[P::SensoryOverload, P::SocialExhaustion]),
    rule("Strong smells", Environment, &[P::SensoryOverload]),
    rule("Uncomfortable clothing", Environment, &[P::TextureSensitivity]),
    rule("Temperature", Environment, &[P::EnvironmentalStressor]),
    rule("Cluttered space", Environment, &[P::EnvironmentalStressor]),
    rule("New place", Environment, &[P::EnvironmentChange, P::TransitionDifficulty]),
    rule("Weather change", Environment, &[P::WeatherSensitivity]),
    // Event
    rule("Plans changed", Event, &[P::UnexpectedChange, P::RoutineDisruption]),
    rule("Conflict", Event, &[P::EmotionalFlooding, P::RejectionSensitivity]),
    rule("Deadline", Event, &[P::DeadlinePressure, P::AnxietySpike]),
    rule("Travel", Event, &[P::Travel, P::RoutineDisruption]),
    rule("Bad news", Event, &[P::AnxietySpike]),
    rule("Switching between activities", Event, &[P::TransitionDifficulty, P::TaskSwitchingDifficulty]),
    rule("Appointment", Event, &[P::RoutineDisruption]),
    // Health
    rule("Poor sleep", Health, &[P::SleepDisruption, P::LowEnergy]),
    rule("Headache", Health, &[P::Headache]),
    rule("Skipped meal", Health, &[P::AppetiteChange, P::Irritability]),
    rule("Medication change", Health, &[P::MedicationEffect]),
    rule("Pain flare", Health, &[P::ChronicPain, P::PhysicalTension]),
    rule("Menstrual cycle", Health, &[P::HormonalShift]),
    rule("Feeling unwell", Health, &[P::LowEnergy]),
    // Social
    rule("Lots of socializing", Social, &[P::SocialExhaustion]),
    rule("Masking at work", Social, &[P::Masking, P::SocialExhaustion]),
    rule("Felt misunderstood", Social, &[P::Miscommunication, P::RejectionSensitivity]),
    rule("Phone calls", Social, &[P::CommunicationDifficulty, P::AnxietySpike]),
    rule("Group conversation", Social, &[P::CommunicationDifficulty, P::SocialExhaustion]),
    rule("Needed time alone", Social, &[P::SocialWithdrawal]),
    // Demand
    rule("Too many things to do", Demand, &[P::DecisionFatigue, P::BurnoutIndicator]),
    rule("Task I keep avoiding", Demand, &[P::TaskAvoidance, P::TaskInitiation]),
    rule("Lots of decisions", Demand, &[P::DecisionFatigue]),
    rule("Forgot something important", Demand, &[P::WorkingMemoryLapse]),
    rule("Lost track of time", Demand, &[P::TimeBlindness, P::Hyperfocus]),
    rule("Constant interruptions", Demand, &[P::TaskSwitchingDifficulty, P::Irritability]),
    rule("No downtime", Demand, &[P::BurnoutIndicator, P::EnergyCrash]),
    rule("Boring task", Demand, &[P::TaskInitiation, P::Restlessness]),
];

fn lookup(detail: &str) -> Option<&'static DetailRule> {
    DETAIL_RULES.iter().find(|r| r.detail == detail)
}

/// Classify a set of details into pattern types
///
/// Returns the union of all matches, deduplicated and sorted by canonical
/// string. Unrecognized details contribute nothing.
pub fn classify<I, S>(details: I) -> Vec<PatternType>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let matched: BTreeSet<PatternType> = details
        .into_iter()
        .filter_map(|d| lookup(d.as_ref()))
        .flat_map(|r| r.patterns.iter().copied())
        .collect();

    matched.into_iter().collect()
}

/// Per-detail breakdown of a classification, in the order the recognized
/// details were given
pub fn explain<I, S>(details: I) -> Vec<Classification>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    details
        .into_iter()
        .filter_map(|d| lookup(d.as_ref()))
        .map(|r| {
            let mut patterns = r.patterns.to_vec();
            patterns.sort();
            Classification {
                detail: r.detail.to_string(),
                axis: r.axis,
                patterns,
            }
        })
        .collect()
}

/// Details the entry form offers for an axis, in table order
pub fn known_details(axis: DetailAxis) -> Vec<&'static str> {
    DETAIL_RULES
        .iter()
        .filter(|r| r.axis == axis)
        .map(|r| r.detail)
        .collect()
}

/// Axis a known detail belongs to
pub fn axis_of(detail: &str) -> Option<DetailAxis> {
    lookup(detail).map(|r| r.axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_shape() {
        let mut seen = HashSet::new();
        for rule in DETAIL_RULES {
            assert!(seen.insert(rule.detail), "duplicate detail {}", rule.detail);
            assert!(
                (1..=2).contains(&rule.patterns.len()),
                "{} maps to {} types",
                rule.detail,
                rule.patterns.len()
            );
        }
        for axis in DetailAxis::all() {
            assert!(!known_details(*axis).is_empty(), "no details for {}", axis);
        }
    }

    #[test]
    fn test_many_valued_mapping() {
        let types = classify(["Too many things to do"]);
        assert_eq!(
            types,
            vec![PatternType::BurnoutIndicator, PatternType::DecisionFatigue]
        );
    }

    #[test]
    fn test_combined_details_sorted() {
        let types = classify(["Too many things to do", "Task I keep avoiding"]);
        assert_eq!(
            types,
            vec![
                PatternType::BurnoutIndicator,
                PatternType::DecisionFatigue,
                PatternType::TaskAvoidance,
                PatternType::TaskInitiation,
            ]
        );
    }

    #[test]
    fn test_empty_and_unknown() {
        let empty: [&str; 0] = [];
        assert!(classify(empty).is_empty());
        assert!(classify(["Something nobody listed"]).is_empty());
        // case-sensitive
        assert!(classify(["noise level"]).is_empty());
    }

    #[test]
    fn test_overlapping_details_dedup() {
        let types = classify(["Too many things to do", "Lots of decisions"]);
        assert_eq!(
            types,
            vec![PatternType::BurnoutIndicator, PatternType::DecisionFatigue]
        );
    }

    #[test]
    fn test_deterministic() {
        let input: HashSet<&str> = ["Noise level", "Conflict", "Poor sleep", "Boring task"]
            .into_iter()
            .collect();
        let first = classify(input.iter());
        let second = classify(input.iter());
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort_by_key(|t| t.as_str());
        assert_eq!(first, sorted);
    }

    #[test]
    fn test_single_detail_subset_of_pair() {
        let details: Vec<&str> = DETAIL_RULES
            .iter()
            .map(|r| r.detail)
            .chain(["unrecognized"])
            .collect();

        for s in &details {
            let alone: HashSet<PatternType> = classify([*s]).into_iter().collect();
            for t in &details {
                let pair: HashSet<PatternType> = classify([*s, *t]).into_iter().collect();
                assert!(alone.is_subset(&pair), "classify({{{}}}) not within pair with {}", s, t);
            }
        }
    }

    #[test]
    fn test_explain() {
        let breakdown = explain(["Noise level", "unknown", "Travel"]);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].axis, DetailAxis::Environment);
        assert_eq!(
            breakdown[0].patterns,
            vec![PatternType::NoiseSensitivity, PatternType::SensoryOverload]
        );
        assert_eq!(breakdown[1].detail, "Travel");
        assert_eq!(axis_of("Travel"), Some(DetailAxis::Event));
        assert_eq!(axis_of("nope"), None);
    }
}
