//! Identifier helpers.
//!
//! Entities, content models and users are keyed by plain strings (entity ids
//! double as role anchors, so they stay human-readable). Ids that callers do
//! not supply are generated here.

use uuid::Uuid;

/// Generate a fresh, time-ordered identifier (UUIDv7, hyphenated).
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// True when an optional id is absent or only whitespace.
pub fn is_blank(id: Option<&str>) -> bool {
    id.is_none_or(|s| s.trim().is_empty())
}
