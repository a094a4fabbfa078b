//! Insight text for discoveries
//!
//! Narrative generation is an external concern (an LLM, a copywriter's
//! templates, a localized string table). The aggregator only needs text and
//! a confidence back. [`TemplateNarrator`] is a rule-based default.

use crate::discovery::{ConfidenceTier, Discovery};
use crate::store::FactorType;

/// Text plus the narrator's confidence in it
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub text: String,
    pub confidence: f64,
}

/// Produces insight text for a discovery
pub trait InsightNarrator: Send + Sync {
    fn narrate(&self, discovery: &Discovery) -> Narrative;
}

/// Rule-based narrator built from the discovery's own fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    fn describe_span(discovery: &Discovery) -> String {
        let days = discovery.timespan_days().round() as i64;
        match days {
            0 => "the same day".to_string(),
            1 => "1 day".to_string(),
            n => format!("{} days", n),
        }
    }

    fn names_of(discovery: &Discovery, factor_type: FactorType) -> Vec<&str> {
        discovery
            .factors
            .iter()
            .filter(|f| f.factor_type == factor_type)
            .map(|f| f.name.as_str())
            .collect()
    }
}

impl InsightNarrator for TemplateNarrator {
    fn narrate(&self, discovery: &Discovery) -> Narrative {
        let (lead, confidence) = match discovery.confidence_tier {
            ConfidenceTier::Emerging => ("Possible pattern", 0.4),
            ConfidenceTier::Developing => ("Developing pattern", 0.65),
            ConfidenceTier::Strong => ("Strong pattern", 0.85),
        };

        let mut text = format!(
            "{}: {} came up {} times over {}",
            lead,
            discovery.pattern_type.display_name(),
            discovery.occurrences,
            Self::describe_span(discovery)
        );

        let context = Self::names_of(discovery, FactorType::Context);
        if !context.is_empty() {
            text.push_str(&format!(", often with {}", context.join(", ")));
        }
        text.push('.');

        let helped = Self::names_of(discovery, FactorType::Activity);
        if !helped.is_empty() {
            text.push_str(&format!(" What helped: {}.", helped.join(", ")));
        }

        Narrative { text, confidence }
    }
}
