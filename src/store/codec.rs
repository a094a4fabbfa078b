//! Field codecs for persisted patterns
//!
//! Two encodings are used for list-valued columns:
//!
//! - **Delimited lists** (triggers, coping strategies): elements joined with
//!   `|||`. There is no escaping, so an element containing `|||` splits
//!   into several elements on decode. An element ending in `|` merges with
//!   the following separator in the same way.
//! - **Factors**: a JSON array of `{"name": .., "type": ..}` objects.
//!
//! Decoding never fails. Historical rows stay loadable even if a column is
//! malformed; the bad column decodes to an empty list.

use crate::store::types::Factor;

/// Separator for delimited list columns
pub const LIST_DELIMITER: &str = "|||";

/// Join a list of strings for storage
pub fn encode_list(items: &[String]) -> String {
    items.join(LIST_DELIMITER)
}

/// Split a stored list; empty or absent decodes to an empty list
pub fn decode_list(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(s) if !s.is_empty() => s.split(LIST_DELIMITER).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Encode factors as a JSON array
pub fn encode_factors(factors: &[Factor]) -> String {
    // Serializing plain strings and unit enums cannot fail
    serde_json::to_string(factors).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a JSON factor array; malformed input yields an empty list
pub fn decode_factors(raw: Option<&str>) -> Vec<Factor> {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Vec::new(),
    };

    match serde_json::from_str(raw) {
        Ok(factors) => factors,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed contributing factors");
            Vec::new()
        }
    }
}
