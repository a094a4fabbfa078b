//! # Patternlog
//!
//! Pattern correlation and cascade engine for a personal behavior and mood
//! journal.
//!
//! ## Features
//!
//! - **Taxonomy**: A fixed set of pattern types grouped into categories
//! - **Classification**: Deterministic mapping from entry details to pattern types
//! - **Cascades**: Directed, confidence-scored links between observations
//! - **Discoveries**: Repeated observations grouped into tiered insights
//! - **Persistence**: SQLite or in-memory pattern store
//!
//! ## Modules
//!
//! - [`taxonomy`]: Pattern types and categories
//! - [`classifier`]: Detail string classifier
//! - [`store`]: Pattern records and repositories
//! - [`cascade`]: Cascade graph
//! - [`discovery`]: Discovery aggregation
//! - [`engine`]: The engine tying them together
//! - [`config`]: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use patternlog::{JournalObservation, MemoryStore, EngineConfig, PatternEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = PatternEngine::open(MemoryStore::new(), EngineConfig::default()).await?;
//!
//!     let now = chrono::Utc::now().timestamp_millis();
//!     let outcome = engine
//!         .record_entry(
//!             JournalObservation::new("entry-1", now)
//!                 .detail("Too many things to do")
//!                 .trigger("inbox")
//!                 .intensity(4),
//!         )
//!         .await?;
//!     println!("Recorded {} patterns", outcome.patterns.len());
//!
//!     for discovery in engine.discoveries(None).await? {
//!         println!("{}", discovery.insight_text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cascade;
pub mod classifier;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod store;
pub mod taxonomy;

// Re-export top-level types for convenience
pub use taxonomy::{PatternCategory, PatternMetadata, PatternType, TaxonomyError};

pub use classifier::{classify, explain, Classification, DetailAxis};

pub use store::{
    CascadeId, CascadeLinks, CascadeRejection, ExtractedPattern, Factor, FactorType, MemoryStore,
    PatternCascade, PatternFilter, PatternId, PatternRepository, PatternSort, PatternUpdate,
    SqliteStore, StoreError, StoreResult, StoreStats, TimeRange,
};

pub use cascade::{CascadeConfig, CascadeGraph, CascadeScorer, FixedConfidence};

pub use discovery::{
    AggregationConfig, ConfidenceTier, Discovery, DiscoveryAggregator, InsightNarrator,
    Narrative, TemplateNarrator,
};

pub use engine::{
    EngineConfig, EngineError, EngineResult, EntryOutcome, FailedLink, JournalObservation,
    PatternEngine,
};

pub use config::{Config, ConfigError, LoggingConfig};
