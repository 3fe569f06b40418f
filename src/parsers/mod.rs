//! SCARF assessment-result decoding.
//!
//! `scarf` streams a results document into [`ScarfHandler`] callbacks;
//! [`ScarfResults`] is the handler that simply accumulates them, and `bugs`
//! turns the raw bug instances into normalized [`crate::models::bug::BugRecord`]s.

pub mod bugs;
pub mod scarf;

use std::io::BufRead;
use std::path::Path;

use serde::Serialize;

use crate::errors::ScarfError;
use crate::models::scarf::{BugInstance, BugSummary, InitialInfo, Metric, MetricSummary};

/// Push-style receiver for SCARF payloads, called in document order.
pub trait ScarfHandler {
    fn initial_info(&mut self, _info: InitialInfo) {}

    fn bug(&mut self, _bug: BugInstance) {}

    fn metric(&mut self, _metric: Metric) {}

    fn metric_summary(&mut self, _summary: MetricSummary) {}

    fn bug_summary(&mut self, _summary: BugSummary) {}
}

/// Everything one SCARF document reported, in document order with duplicates kept.
#[derive(Debug, Default, Serialize)]
pub struct ScarfResults {
    /// `"<tool name> <tool version>"`, once the root element has been read.
    pub tool: Option<String>,
    /// Bare tool name, stable across tool upgrades.
    pub tool_name: String,
    /// SCARF does not carry the platform yet.
    pub platform: Option<String>,
    pub bugs: Vec<BugInstance>,
    pub metrics: Vec<Metric>,
    pub metric_summaries: Vec<MetricSummary>,
    pub bug_summaries: Vec<BugSummary>,
}

impl ScarfResults {
    pub fn from_reader<R: BufRead>(source: R) -> Result<Self, ScarfError> {
        let mut results = Self::default();
        scarf::read(source, &mut results)?;
        Ok(results)
    }

    pub fn from_path(path: &Path) -> Result<Self, ScarfError> {
        let mut results = Self::default();
        scarf::read_file(path, &mut results)?;
        Ok(results)
    }
}

impl ScarfHandler for ScarfResults {
    fn initial_info(&mut self, info: InitialInfo) {
        self.tool = Some(info.tool_identity());
        self.tool_name = info.tool_name;
    }

    fn bug(&mut self, bug: BugInstance) {
        self.bugs.push(bug);
    }

    fn metric(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    fn metric_summary(&mut self, summary: MetricSummary) {
        self.metric_summaries.push(summary);
    }

    fn bug_summary(&mut self, summary: BugSummary) {
        self.bug_summaries.push(summary);
    }
}
