//! Unified error handling for the submission, orchestration and decoding paths.

use std::time::Duration;

/// Document-level failure while decoding a SCARF results file.
#[derive(Debug, thiserror::Error)]
pub enum ScarfError {
    #[error("XML syntax error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Invalid UTF-8 in document: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Malformed SCARF document: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate error type, one variant per failure class of a build step.
#[derive(Debug, thiserror::Error)]
pub enum SwampError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Project {0} does not exist")]
    ProjectNotFound(String),

    #[error("Could not upload package: {0}")]
    Upload(String),

    #[error("Not allowed to run tools: {}", .0.join(", "))]
    PermissionDenied(Vec<String>),

    #[error("Assessment failed to start: {0}")]
    Submission(String),

    #[error("AssessmentRun {0} not found")]
    RunNotFound(String),

    #[error("AssessmentRun {0} reported by more than one record")]
    DuplicateRun(String),

    #[error("SWAMP request failed: {0}")]
    Transport(String),

    #[error("Waiting for status interrupted")]
    Cancelled,

    #[error("Assessments still pending after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Scarf(#[from] ScarfError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl SwampError {
    /// Whether this error aborts the whole batch.
    ///
    /// A failed submission only loses its own run; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Submission(_))
    }

    /// Check if this error was raised before any network call.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_lists_every_tool() {
        let err = SwampError::PermissionDenied(vec![
            "Parasoft C/C++test".into(),
            "GrammaTech".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Not allowed to run tools: Parasoft C/C++test, GrammaTech"
        );
    }

    #[test]
    fn only_submission_errors_are_recoverable() {
        assert!(!SwampError::Submission("quota".into()).is_fatal());
        assert!(SwampError::RunNotFound("r1".into()).is_fatal());
        assert!(SwampError::Cancelled.is_fatal());
        assert!(SwampError::PermissionDenied(vec![]).is_fatal());
    }

    #[test]
    fn config_error_display() {
        let err = SwampError::Config("SWAMP_USERNAME is not set".to_string());
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "Configuration error: SWAMP_USERNAME is not set"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SwampError = io.into();
        assert!(matches!(err, SwampError::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn scarf_error_is_transparent() {
        let err: SwampError = ScarfError::Malformed("missing AnalyzerReport".into()).into();
        assert_eq!(
            err.to_string(),
            "Malformed SCARF document: missing AnalyzerReport"
        );
    }
}
