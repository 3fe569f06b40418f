//! Raw SCARF payloads as they appear in an assessment results document.
//!
//! Fields keep the tool's own strings; interpretation (severity, rank,
//! identity) happens when converting to [`crate::models::bug::BugRecord`].

use serde::Serialize;

/// Contents of the `AnalyzerReport` root element.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitialInfo {
    pub tool_name: String,
    pub tool_version: String,
    pub assessment_uuid: String,
}

impl InitialInfo {
    /// Tool identity in `"<name> <version>"` form.
    pub fn tool_identity(&self) -> String {
        format!("{} {}", self.tool_name, self.tool_version)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub id: Option<u32>,
    pub primary: bool,
    pub source_file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Method {
    pub id: Option<u32>,
    pub primary: bool,
    pub name: String,
}

/// One `BugInstance` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BugInstance {
    pub id: String,
    pub class_name: String,
    pub methods: Vec<Method>,
    pub locations: Vec<Location>,
    pub message: String,
    pub group: String,
    pub code: String,
    pub rank: String,
    pub severity: String,
    pub resolution_suggestion: String,
    pub cwe_ids: Vec<String>,
    pub build_id: String,
    pub report_file: String,
}

impl BugInstance {
    /// First location flagged as primary, if any.
    pub fn primary_location(&self) -> Option<&Location> {
        self.locations.iter().find(|l| l.primary)
    }
}

/// One `Metric` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metric {
    pub id: String,
    pub source_file: String,
    pub class_name: String,
    pub method: String,
    pub metric_type: String,
    pub value: String,
}

/// One `MetricSummary` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric_type: String,
    pub count: String,
    pub sum: String,
    pub sum_of_squares: String,
    pub average: String,
    pub standard_deviation: String,
    pub max: String,
    pub min: String,
}

/// One `BugCategory` entry of the `BugSummary` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BugSummary {
    pub group: String,
    pub code: String,
    pub count: u64,
    pub bytes: u64,
}
