//! Build outcome handed to reporting, plus cross-build comparison.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::assessment::{AssessmentRequest, AssessmentRun};
use crate::models::bug::{BugRecord, Priority};
use crate::parsers::bugs::BugConverter;
use crate::parsers::ScarfResults;

/// Bugs decoded from one persisted result document.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub tool: Option<String>,
    pub bugs: Vec<BugRecord>,
    /// Set when the document could not be decoded; `bugs` is then empty.
    pub parse_error: Option<String>,
}

impl FileReport {
    /// Parse one result file. A malformed document is recorded, not raised.
    pub fn parse(path: &Path, converter: &BugConverter) -> Self {
        let origin = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match ScarfResults::from_path(path) {
            Ok(results) => Self {
                file: path.to_path_buf(),
                tool: results.tool.clone(),
                bugs: converter.convert(&results, &origin),
                parse_error: None,
            },
            Err(e) => {
                tracing::error!(
                    file = %path.display(),
                    error = %e,
                    "Failed to parse SCARF results"
                );
                Self {
                    file: path.to_path_buf(),
                    tool: None,
                    bugs: Vec::new(),
                    parse_error: Some(e.to_string()),
                }
            }
        }
    }
}

/// A completed run and what its result document contained.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub run: AssessmentRun,
    #[serde(flatten)]
    pub results: FileReport,
}

/// Everything one build step produced.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub upload_version: String,
    pub package_version_id: String,
    pub reports: Vec<AssessmentReport>,
}

impl BuildOutcome {
    pub fn bugs(&self) -> impl Iterator<Item = &BugRecord> {
        self.reports.iter().flat_map(|r| r.results.bugs.iter())
    }

    /// Bugs keyed by the request that produced them. Repeated requests
    /// share one entry.
    pub fn bugs_by_request(&self) -> HashMap<AssessmentRequest, Vec<BugRecord>> {
        let mut map: HashMap<AssessmentRequest, Vec<BugRecord>> = HashMap::new();
        for report in &self.reports {
            map.entry(report.run.request.clone())
                .or_default()
                .extend(report.results.bugs.iter().cloned());
        }
        map
    }

    /// Files whose documents failed to decode, with the reason.
    pub fn parse_errors(&self) -> Vec<(&Path, &str)> {
        self.reports
            .iter()
            .filter_map(|r| {
                r.results
                    .parse_error
                    .as_deref()
                    .map(|e| (r.results.file.as_path(), e))
            })
            .collect()
    }

    pub fn summary(&self) -> PrioritySummary {
        PrioritySummary::of(self.bugs())
    }
}

/// Bug counts per priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrioritySummary {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl PrioritySummary {
    pub fn of<'a>(bugs: impl IntoIterator<Item = &'a BugRecord>) -> Self {
        let mut summary = Self::default();
        for bug in bugs {
            match bug.priority {
                Priority::High => summary.high += 1,
                Priority::Normal => summary.normal += 1,
                Priority::Low => summary.low += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.high + self.normal + self.low
    }
}

/// How the current build's bugs relate to the previous build's.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BugDelta {
    pub new: Vec<BugRecord>,
    pub fixed: Vec<BugRecord>,
    pub unchanged: Vec<BugRecord>,
}

/// Compare two builds by stable-hash identity.
///
/// Output keeps input order; a hash repeated within one build counts once.
pub fn compare_with_previous(current: &[BugRecord], previous: &[BugRecord]) -> BugDelta {
    let previous_set: HashSet<&BugRecord> = previous.iter().collect();
    let current_set: HashSet<&BugRecord> = current.iter().collect();

    let mut delta = BugDelta::default();
    let mut seen = HashSet::new();
    for bug in current {
        if !seen.insert(bug) {
            continue;
        }
        if previous_set.contains(bug) {
            delta.unchanged.push(bug.clone());
        } else {
            delta.new.push(bug.clone());
        }
    }

    let mut seen = HashSet::new();
    for bug in previous {
        if seen.insert(bug) && !current_set.contains(bug) {
            delta.fixed.push(bug.clone());
        }
    }
    delta
}

/// Consumer of build outcomes, such as a CI annotation publisher.
pub trait ReportSink {
    fn publish(&self, outcome: &BuildOutcome);
}

/// Writes the outcome summary to the log.
#[derive(Debug, Default)]
pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn publish(&self, outcome: &BuildOutcome) {
        let summary = outcome.summary();
        tracing::info!(
            upload_version = %outcome.upload_version,
            assessments = outcome.reports.len(),
            high = summary.high,
            normal = summary.normal,
            low = summary.low,
            "SWAMP assessment results"
        );
        for report in &outcome.reports {
            let file_summary = PrioritySummary::of(&report.results.bugs);
            tracing::info!(
                tool = %report.run.tool_name,
                platform = %report.run.platform_name,
                file = %report.results.file.display(),
                bugs = file_summary.total(),
                "Assessment report"
            );
        }
        for (file, error) in outcome.parse_errors() {
            tracing::warn!(file = %file.display(), error, "Result file could not be read");
        }
    }
}
