//! Pattern Taxonomy
//!
//! The closed catalog of behavioral pattern types the journal understands.
//! Every type belongs to exactly one of nine categories and carries a few
//! flags that tell the entry form which inputs make sense for it:
//!
//! - **has_intensity_scale**: the 1-5 intensity slider applies
//! - **has_duration**: the observation can carry a duration
//! - **placeholder**: hint text for the free-text details field
//!
//! The table is fixed at compile time. The only way to obtain a
//! [`PatternType`] from text is [`PatternType::from_str`], used at the
//! persistence boundary.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Top-level grouping for pattern types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Behavioral,
    Sensory,
    SocialCommunication,
    ExecutiveFunction,
    EnergyCapacity,
    EmotionalRegulation,
    RoutineStructure,
    Physical,
    Contextual,
}

impl PatternCategory {
    /// Get all categories in display order
    pub fn all() -> &'static [PatternCategory] {
        &[
            PatternCategory::Behavioral,
            PatternCategory::Sensory,
            PatternCategory::SocialCommunication,
            PatternCategory::ExecutiveFunction,
            PatternCategory::EnergyCapacity,
            PatternCategory::EmotionalRegulation,
            PatternCategory::RoutineStructure,
            PatternCategory::Physical,
            PatternCategory::Contextual,
        ]
    }

    /// Stable identifier used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Behavioral => "behavioral",
            PatternCategory::Sensory => "sensory",
            PatternCategory::SocialCommunication => "social_communication",
            PatternCategory::ExecutiveFunction => "executive_function",
            PatternCategory::EnergyCapacity => "energy_capacity",
            PatternCategory::EmotionalRegulation => "emotional_regulation",
            PatternCategory::RoutineStructure => "routine_structure",
            PatternCategory::Physical => "physical",
            PatternCategory::Contextual => "contextual",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            PatternCategory::Behavioral => "Behavioral",
            PatternCategory::Sensory => "Sensory",
            PatternCategory::SocialCommunication => "Social/Communication",
            PatternCategory::ExecutiveFunction => "Executive Function",
            PatternCategory::EnergyCapacity => "Energy/Capacity",
            PatternCategory::EmotionalRegulation => "Emotional Regulation",
            PatternCategory::RoutineStructure => "Routine/Structure",
            PatternCategory::Physical => "Physical",
            PatternCategory::Contextual => "Contextual",
        }
    }

    /// Icon name for display
    pub fn icon(&self) -> &'static str {
        match self {
            PatternCategory::Behavioral => "figure.walk",
            PatternCategory::Sensory => "ear",
            PatternCategory::SocialCommunication => "person.2",
            PatternCategory::ExecutiveFunction => "brain.head.profile",
            PatternCategory::EnergyCapacity => "battery.50",
            PatternCategory::EmotionalRegulation => "heart",
            PatternCategory::RoutineStructure => "calendar",
            PatternCategory::Physical => "figure.stand",
            PatternCategory::Contextual => "globe",
        }
    }

    /// Accent color (hex) for display
    pub fn color(&self) -> &'static str {
        match self {
            PatternCategory::Behavioral => "#5B8DEF",
            PatternCategory::Sensory => "#A66CFF",
            PatternCategory::SocialCommunication => "#3BB273",
            PatternCategory::ExecutiveFunction => "#F29E4C",
            PatternCategory::EnergyCapacity => "#E4572E",
            PatternCategory::EmotionalRegulation => "#E84A8A",
            PatternCategory::RoutineStructure => "#17BEBB",
            PatternCategory::Physical => "#76B041",
            PatternCategory::Contextual => "#8D99AE",
        }
    }

    /// Pattern types belonging to this category, in catalog order
    pub fn pattern_types(&self) -> Vec<PatternType> {
        PatternType::all()
            .iter()
            .copied()
            .filter(|t| t.category() == *self)
            .collect()
    }
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PatternCategory {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternCategory::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TaxonomyError::UnknownCategory(s.to_string()))
    }
}

/// Entry-form flags for a pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMetadata {
    pub has_intensity_scale: bool,
    pub has_duration: bool,
    pub placeholder: &'static str,
}

/// Errors parsing taxonomy identifiers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("Unknown pattern type: {0}")]
    UnknownPatternType(String),

    #[error("Unknown pattern category: {0}")]
    UnknownCategory(String),
}

/// Declares the pattern type enum together with its catalog rows so the
/// variant list, canonical strings and metadata cannot drift apart.
macro_rules! pattern_types {
    ($(
        $variant:ident => ($id:literal, $name:literal, $category:ident, $intensity:literal, $duration:literal, $placeholder:literal)
    ),+ $(,)?) => {
        /// A canonical behavioral pattern type
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(rename_all = "camelCase")]
        pub enum PatternType {
            $($variant),+
        }

        impl PatternType {
            /// Get all pattern types in catalog order
            pub fn all() -> &'static [PatternType] {
                &[$(PatternType::$variant),+]
            }

            /// Canonical identifier (lowerCamelCase)
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(PatternType::$variant => $id),+
                }
            }

            /// Human-readable name
            pub fn display_name(&self) -> &'static str {
                match self {
                    $(PatternType::$variant => $name),+
                }
            }

            /// Category this type belongs to
            pub fn category(&self) -> PatternCategory {
                match self {
                    $(PatternType::$variant => PatternCategory::$category),+
                }
            }

            /// Entry-form flags
            pub fn metadata(&self) -> PatternMetadata {
                match self {
                    $(PatternType::$variant => PatternMetadata {
                        has_intensity_scale: $intensity,
                        has_duration: $duration,
                        placeholder: $placeholder,
                    }),+
                }
            }
        }
    };
}

pattern_types! {
    // Behavioral
    Stimming => ("stimming", "Stimming", Behavioral, true, true, "What kind of stimming? Did it help?"),
    Hyperfocus => ("hyperfocus", "Hyperfocus", Behavioral, false, true, "What were you focused on?"),
    Masking => ("masking", "Masking", Behavioral, true, true, "Where were you masking, and for whom?"),
    Impulsivity => ("impulsivity", "Impulsivity", Behavioral, true, false, "What did you act on?"),
    Restlessness => ("restlessness", "Restlessness", Behavioral, true, true, "How did the restlessness show up?"),

    // Sensory
    SensoryOverload => ("sensoryOverload", "Sensory Overload", Sensory, true, true, "Which senses were overwhelmed?"),
    SensorySeeking => ("sensorySeeking", "Sensory Seeking", Sensory, true, false, "What input were you seeking?"),
    NoiseSensitivity => ("noiseSensitivity", "Noise Sensitivity", Sensory, true, true, "What sounds bothered you?"),
    LightSensitivity => ("lightSensitivity", "Light Sensitivity", Sensory, true, true, "What lighting bothered you?"),
    TextureSensitivity => ("textureSensitivity", "Texture Sensitivity", Sensory, true, false, "Which textures or fabrics?"),

    // Social/Communication
    SocialExhaustion => ("socialExhaustion", "Social Exhaustion", SocialCommunication, true, true, "What social activity drained you?"),
    CommunicationDifficulty => ("communicationDifficulty", "Communication Difficulty", SocialCommunication, true, false, "What was hard to say or understand?"),
    RejectionSensitivity => ("rejectionSensitivity", "Rejection Sensitivity", SocialCommunication, true, true, "What felt like rejection?"),
    SocialWithdrawal => ("socialWithdrawal", "Social Withdrawal", SocialCommunication, false, true, "What made you pull back?"),
    Miscommunication => ("miscommunication", "Miscommunication", SocialCommunication, false, false, "What got misunderstood?"),

    // Executive Function
    TaskInitiation => ("taskInitiation", "Task Initiation", ExecutiveFunction, true, false, "Which task was hard to start?"),
    TaskAvoidance => ("taskAvoidance", "Task Avoidance", ExecutiveFunction, true, true, "What are you avoiding?"),
    DecisionFatigue => ("decisionFatigue", "Decision Fatigue", ExecutiveFunction, true, false, "What decisions piled up?"),
    TimeBlindness => ("timeBlindness", "Time Blindness", ExecutiveFunction, false, true, "Where did the time go?"),
    WorkingMemoryLapse => ("workingMemoryLapse", "Working Memory Lapse", ExecutiveFunction, false, false, "What slipped your mind?"),
    TaskSwitchingDifficulty => ("taskSwitchingDifficulty", "Task Switching Difficulty", ExecutiveFunction, true, false, "What were you switching between?"),

    // Energy/Capacity
    BurnoutIndicator => ("burnoutIndicator", "Burnout Indicator", EnergyCapacity, true, false, "What signs of burnout did you notice?"),
    EnergyCrash => ("energyCrash", "Energy Crash", EnergyCapacity, true, true, "When did your energy drop?"),
    LowEnergy => ("lowEnergy", "Low Energy", EnergyCapacity, true, true, "How low was your energy?"),

    // Emotional Regulation
    Meltdown => ("meltdown", "Meltdown", EmotionalRegulation, true, true, "What led up to it?"),
    Shutdown => ("shutdown", "Shutdown", EmotionalRegulation, true, true, "What led up to it?"),
    AnxietySpike => ("anxietySpike", "Anxiety Spike", EmotionalRegulation, true, true, "What set off the anxiety?"),
    EmotionalFlooding => ("emotionalFlooding", "Emotional Flooding", EmotionalRegulation, true, true, "What feelings came up?"),
    Irritability => ("irritability", "Irritability", EmotionalRegulation, true, false, "What was getting to you?"),

    // Routine/Structure
    RoutineDisruption => ("routineDisruption", "Routine Disruption", RoutineStructure, true, false, "What changed in your routine?"),
    TransitionDifficulty => ("transitionDifficulty", "Transition Difficulty", RoutineStructure, true, false, "Which transition was hard?"),
    UnexpectedChange => ("unexpectedChange", "Unexpected Change", RoutineStructure, true, false, "What changed unexpectedly?"),

    // Physical
    SleepDisruption => ("sleepDisruption", "Sleep Disruption", Physical, true, true, "How did you sleep?"),
    Headache => ("headache", "Headache", Physical, true, true, "Where and how bad?"),
    PhysicalTension => ("physicalTension", "Physical Tension", Physical, true, false, "Where do you feel tension?"),
    AppetiteChange => ("appetiteChange", "Appetite Change", Physical, false, false, "What changed about eating?"),
    ChronicPain => ("chronicPain", "Chronic Pain", Physical, true, true, "Where is the pain?"),
    HormonalShift => ("hormonalShift", "Hormonal Shift", Physical, true, false, "Cycle day or other details"),
    MedicationEffect => ("medicationEffect", "Medication Effect", Physical, true, false, "Which medication, and what effect?"),

    // Contextual
    EnvironmentalStressor => ("environmentalStressor", "Environmental Stressor", Contextual, true, false, "What about the environment was stressful?"),
    EnvironmentChange => ("environmentChange", "Environment Change", Contextual, false, false, "Where were you?"),
    DeadlinePressure => ("deadlinePressure", "Deadline Pressure", Contextual, true, false, "Which deadline?"),
    Travel => ("travel", "Travel", Contextual, false, true, "Where did you go?"),
    WeatherSensitivity => ("weatherSensitivity", "Weather Sensitivity", Contextual, true, false, "What was the weather like?"),
}

impl PatternType {
    /// Whether the 1-5 intensity scale applies
    pub fn has_intensity_scale(&self) -> bool {
        self.metadata().has_intensity_scale
    }

    /// Whether the observation can carry a duration
    pub fn has_duration(&self) -> bool {
        self.metadata().has_duration
    }

    /// Placeholder for the free-text details field
    pub fn details_placeholder(&self) -> &'static str {
        self.metadata().placeholder
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = TaxonomyError;

    /// Accepts the canonical form (`decisionFatigue`) and snake_case
    /// (`decision_fatigue`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        PatternType::all()
            .iter()
            .copied()
            .find(|t| t.as_str().to_lowercase() == wanted)
            .ok_or_else(|| TaxonomyError::UnknownPatternType(s.to_string()))
    }
}

impl PartialOrd for PatternType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Pattern types order by their canonical string, which is what display and
/// classifier output are sorted by.
impl Ord for PatternType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}
