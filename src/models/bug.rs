//! Normalized bug model shared by the result decoder and the reporting adapter.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Lowest rank that still counts as high priority when ranks are activated.
const HIGH_PRIORITY_LOWEST_RANK: i32 = 4;
/// Lowest rank that still counts as normal priority when ranks are activated.
const NORMAL_PRIORITY_LOWEST_RANK: i32 = 9;

/// Rank value used when the tool reported no usable rank.
pub const UNRANKED: i32 = -1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Map a SCARF `BugSeverity` code. Anything other than `1` or `2` is low.
    pub fn from_severity_code(code: &str) -> Self {
        match code.trim().parse::<i64>() {
            Ok(1) => Self::High,
            Ok(2) => Self::Normal,
            _ => Self::Low,
        }
    }

    /// Map a FindBugs-style rank, where smaller ranks are more severe.
    pub fn from_rank(rank: i32) -> Self {
        match rank {
            r if r < 1 => Self::Low,
            r if r <= HIGH_PRIORITY_LOWEST_RANK => Self::High,
            r if r <= NORMAL_PRIORITY_LOWEST_RANK => Self::Normal,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Normal => write!(f, "NORMAL"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Parse a SCARF `BugRank`, falling back to [`UNRANKED`].
pub fn parse_rank(raw: &str) -> i32 {
    raw.trim().parse().unwrap_or(UNRANKED)
}

/// One bug reported by an assessment.
///
/// Identity is the stable hash alone: two records with the same hash are the
/// same bug, whatever their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugRecord {
    pub stable_hash: String,
    pub priority: Priority,
    pub rank: i32,
    pub message: String,
    pub category: String,
    pub type_code: String,
    pub source_file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub tool_origin: String,
    pub cwe_ids: Vec<String>,
    pub tooltip: String,
}

impl PartialEq for BugRecord {
    fn eq(&self, other: &Self) -> bool {
        self.stable_hash == other.stable_hash
    }
}

impl Eq for BugRecord {}

impl Hash for BugRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stable_hash.hash(state);
    }
}
