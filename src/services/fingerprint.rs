//! Stable bug identity across builds.
//!
//! The identity is a deterministic hash of the reporting tool and the bug
//! identifier the tool assigned, so re-parsing a results file (or receiving
//! the same bug in a later build) yields the same identity while other
//! fields such as line numbers may move.

use sha2::{Digest, Sha256};

/// Compute the stable hash of a SCARF bug.
///
/// Inputs: tool name, SCARF `BugInstance` id. The tool name keeps equal
/// ids from different tools apart.
pub fn compute_bug(tool: &str, bug_id: &str) -> String {
    hash(&format!("SCARF:{tool}:{bug_id}"))
}

/// Identity for a bug the tool left without an id.
///
/// Falls back to the fields that describe where and what the bug is.
pub fn compute_anonymous_bug(
    tool: &str,
    source_file: &str,
    type_code: &str,
    message: &str,
) -> String {
    hash(&format!("SCARF-ANON:{tool}:{source_file}:{type_code}:{message}"))
}

/// SHA-256 hash a string and return hex-encoded digest.
fn hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
