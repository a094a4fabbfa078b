//! Pattern Store
//!
//! Persisted pattern observations and cascade edges:
//!
//! - **types**: Record types (ExtractedPattern, PatternCascade, Factor, filters)
//! - **codec**: `|||` list encoding and JSON factor encoding
//! - **repository**: The async persistence contract
//! - **memory**: In-memory implementation
//! - **sqlite**: SQLite implementation
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use patternlog::store::*;
//! use patternlog::taxonomy::PatternType;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open(std::path::Path::new("./data/patterns.db"))?;
//!
//!     let pattern = ExtractedPattern::new(PatternType::SensoryOverload)
//!         .intensity_level(4)
//!         .trigger("loud cafe")
//!         .source_entry("entry-42");
//!     store.create_pattern(&pattern).await?;
//!
//!     let recent = store
//!         .list_patterns(&PatternFilter::new().time_range(TimeRange::last_days(7)), PatternSort::TimestampDesc)
//!         .await?;
//!     println!("{} patterns this week", recent.len());
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod memory;
pub mod repository;
pub mod sqlite;
pub mod types;

pub use codec::{decode_factors, decode_list, encode_factors, encode_list, LIST_DELIMITER};
pub use error::{CascadeRejection, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use repository::PatternRepository;
pub use sqlite::SqliteStore;
pub use types::{
    clamp_confidence, clamp_intensity, CascadeId, CascadeLinks, ExtractedPattern, Factor,
    FactorType, PatternCascade, PatternFilter, PatternId, PatternSort, PatternUpdate, StoreStats,
    TimeRange,
};
