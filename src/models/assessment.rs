//! Assessment selections, expanded requests and the remote run records
//! observed while polling.

use serde::{Deserialize, Serialize};

/// Wire value the service uses for "no result yet".
const PENDING_SENTINEL: &str = "null";

/// A tool known to the service, with the package languages it accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub id: String,
    pub name: String,
    pub languages: Vec<String>,
}

impl ToolInfo {
    pub fn supports(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
    }
}

/// A configured (tools, platform) pair. `tools` may hold several
/// comma-separated tool ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSelection {
    pub tools: String,
    pub platform: String,
}

impl AssessmentSelection {
    pub fn new(tools: &str, platform: &str) -> Self {
        Self {
            tools: tools.to_string(),
            platform: platform.to_string(),
        }
    }

    /// Selection of every catalogue tool applicable to `language`.
    pub fn all_tools(catalogue: &[ToolInfo], language: &str, platform: &str) -> Self {
        let ids: Vec<&str> = catalogue
            .iter()
            .filter(|t| t.supports(language))
            .map(|t| t.id.as_str())
            .collect();
        Self::new(&ids.join(","), platform)
    }

    /// One request per listed tool, in listed order.
    pub fn expand(&self) -> Vec<AssessmentRequest> {
        self.tools
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|tool| AssessmentRequest {
                tool_id: tool.to_string(),
                platform_id: self.platform.clone(),
            })
            .collect()
    }
}

/// Expand every selection, preserving order and duplicates.
pub fn expand_all(selections: &[AssessmentSelection]) -> Vec<AssessmentRequest> {
    selections.iter().flat_map(AssessmentSelection::expand).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub tool_id: String,
    pub platform_id: String,
}

/// Handle returned by the service when a run is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
}

/// Whether a run has produced a result document yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultState {
    Pending,
    Ready(String),
}

impl ResultState {
    /// Interpret the result identifier as sent on the wire.
    pub fn from_wire(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(PENDING_SENTINEL) {
            Self::Pending
        } else {
            Self::Ready(trimmed.to_string())
        }
    }
}

/// One entry of the project's assessment record listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub run_id: String,
    pub result: ResultState,
    pub status: String,
}

/// Coarse classification of the free-form status strings the service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Queued,
    Running,
    Finished,
    Failed,
    Other,
}

impl RunPhase {
    pub fn classify(status: &str) -> Self {
        let status = status.to_ascii_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| status.contains(w));
        if mentions(&["error", "fail", "terminated"]) {
            Self::Failed
        } else if mentions(&["finished", "complete", "success"]) {
            Self::Finished
        } else if mentions(&["wait", "schedul", "queue"]) {
            Self::Queued
        } else if mentions(&["run", "assess", "build", "start", "shutdown"]) {
            Self::Running
        } else {
            Self::Other
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Queued => "waiting to start",
            Self::Running => "in progress",
            Self::Finished => "finished",
            Self::Failed => "finished with errors",
            Self::Other => "in an unrecognised state",
        }
    }
}

/// Local progress of one submitted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunState {
    Submitted,
    Running { status: String },
    ResultReady { result_id: String, status: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ResultReady { .. })
    }
}

/// A request that the service accepted, together with its display names.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRun {
    pub request: AssessmentRequest,
    pub run_id: String,
    pub tool_name: String,
    pub platform_name: String,
    pub state: RunState,
}
