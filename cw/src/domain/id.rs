//! Engine-generated identifiers
//!
//! Format: `{PREFIX}-{uuid-v7-hex}`, e.g. `ALT-0192f1c3a4e07b3c8d...`.
//! UUIDv7 sorts by creation time, so IDs order the same way records do.

/// Generate an ID with the given prefix
pub fn generate_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    format!("{}-{}", prefix, uuid.simple())
}
