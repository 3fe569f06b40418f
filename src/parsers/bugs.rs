//! Conversion of raw SCARF bug instances into normalized bug records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use regex::Regex;

use crate::errors::SwampError;
use crate::models::bug::{parse_rank, BugRecord, Priority, UNRANKED};
use crate::models::scarf::{BugInstance, Location};
use crate::parsers::ScarfResults;
use crate::services::fingerprint;

/// Turns [`BugInstance`]s into [`BugRecord`]s.
#[derive(Debug, Default)]
pub struct BugConverter {
    rank_activated: bool,
    source_root: Option<PathBuf>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl BugConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the priority from the bug rank instead of the severity code
    /// whenever the tool supplied a rank.
    pub fn with_rank_activated(mut self, activated: bool) -> Self {
        self.rank_activated = activated;
        self
    }

    /// Directory prefixed to every non-empty source file.
    pub fn with_source_root(mut self, root: Option<PathBuf>) -> Self {
        self.source_root = root;
        self
    }

    /// Comma-separated file patterns; only matching bugs are kept.
    pub fn with_include_patterns(mut self, patterns: &str) -> Result<Self, SwampError> {
        self.include = compile_patterns(patterns)?;
        Ok(self)
    }

    /// Comma-separated file patterns; matching bugs are dropped.
    pub fn with_exclude_patterns(mut self, patterns: &str) -> Result<Self, SwampError> {
        self.exclude = compile_patterns(patterns)?;
        Ok(self)
    }

    /// Convert every bug of a decoded document, in document order.
    ///
    /// `origin` names the results file and stands in for the tool when the
    /// document did not identify one.
    pub fn convert(&self, results: &ScarfResults, origin: &str) -> Vec<BugRecord> {
        let tool_origin = results.tool.clone().unwrap_or_else(|| origin.to_string());
        let tool_name = if results.tool_name.is_empty() {
            origin
        } else {
            results.tool_name.as_str()
        };

        results
            .bugs
            .iter()
            .filter_map(|bug| self.convert_bug(bug, tool_name, &tool_origin))
            .collect()
    }

    fn convert_bug(
        &self,
        bug: &BugInstance,
        tool_name: &str,
        tool_origin: &str,
    ) -> Option<BugRecord> {
        let empty = Location::default();
        let location = bug.primary_location().unwrap_or(&empty);

        if !self.is_wanted(&location.source_file) {
            return None;
        }

        let rank = parse_rank(&bug.rank);
        let priority = if self.rank_activated && rank != UNRANKED {
            Priority::from_rank(rank)
        } else {
            Priority::from_severity_code(&bug.severity)
        };

        let stable_hash = if bug.id.is_empty() {
            fingerprint::compute_anonymous_bug(
                tool_name,
                &location.source_file,
                &bug.code,
                &bug.message,
            )
        } else {
            fingerprint::compute_bug(tool_name, &bug.id)
        };

        let source_file = match (&self.source_root, location.source_file.is_empty()) {
            (Some(root), false) => root.join(&location.source_file).to_string_lossy().into_owned(),
            _ => location.source_file.clone(),
        };

        Some(BugRecord {
            stable_hash,
            priority,
            rank,
            message: bug.message.clone(),
            category: bug.group.clone(),
            type_code: bug.code.clone(),
            source_file,
            start_line: location.start_line,
            end_line: location.end_line,
            tool_origin: tool_origin.to_string(),
            cwe_ids: bug.cwe_ids.clone(),
            tooltip: bug.resolution_suggestion.clone(),
        })
    }

    fn is_wanted(&self, source_file: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.is_match(source_file)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.is_match(source_file))
    }
}

/// Translate `a/**/b*, c*` style patterns into anchored regexes.
fn compile_patterns(patterns: &str) -> Result<Vec<Regex>, SwampError> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let translated = p.replace("**", "*").replace('*', ".*");
            Regex::new(&format!("^(?:{translated})$"))
                .map_err(|e| SwampError::Config(format!("invalid file pattern {p:?}: {e}")))
        })
        .collect()
}

/// Index bugs by source file, keeping each file's bugs in input order.
///
/// Every entry owns its own list.
pub fn group_by_file(bugs: &[BugRecord]) -> BTreeMap<String, Vec<BugRecord>> {
    let mut index: BTreeMap<String, Vec<BugRecord>> = BTreeMap::new();
    for bug in bugs {
        index
            .entry(bug.source_file.clone())
            .or_default()
            .push(bug.clone());
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<AnalyzerReport tool_name="findbugs" tool_version="3.0.1">
  <BugInstance id="10">
    <BugLocations>
      <Location id="1" primary="true">
        <SourceFile>src/main/Db.java</SourceFile>
        <StartLine>42</StartLine><EndLine>44</EndLine>
      </Location>
    </BugLocations>
    <BugMessage>SQL injection</BugMessage>
    <BugGroup>SECURITY</BugGroup>
    <BugCode>SQL_INJECTION</BugCode>
    <BugRank>3</BugRank>
    <BugSeverity>1</BugSeverity>
    <ResolutionSuggestion>Use prepared statements</ResolutionSuggestion>
  </BugInstance>
  <BugInstance id="11">
    <BugMessage>No location at all</BugMessage>
    <BugRank>not-a-rank</BugRank>
    <BugSeverity>2</BugSeverity>
  </BugInstance>
  <BugInstance id="12">
    <BugLocations>
      <Location id="1" primary="true">
        <SourceFile>src/test/DbTest.java</SourceFile>
        <StartLine>7</StartLine><EndLine>7</EndLine>
      </Location>
    </BugLocations>
    <BugRank>15</BugRank>
    <BugSeverity>x</BugSeverity>
  </BugInstance>
  <BugInstance id="13">
    <BugLocations>
      <Location id="1" primary="true">
        <SourceFile>src/main/Db.java</SourceFile>
        <StartLine>90</StartLine><EndLine>91</EndLine>
      </Location>
    </BugLocations>
    <BugSeverity>3</BugSeverity>
  </BugInstance>
</AnalyzerReport>"#;

    fn parse() -> ScarfResults {
        ScarfResults::from_reader(REPORT.as_bytes()).unwrap()
    }

    #[test]
    fn converts_fields_from_primary_location() {
        let bugs = BugConverter::new().convert(&parse(), "Assessment-demo.xml");
        assert_eq!(bugs.len(), 4);
        let first = &bugs[0];
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.rank, 3);
        assert_eq!(first.source_file, "src/main/Db.java");
        assert_eq!((first.start_line, first.end_line), (42, 44));
        assert_eq!(first.category, "SECURITY");
        assert_eq!(first.type_code, "SQL_INJECTION");
        assert_eq!(first.tool_origin, "findbugs 3.0.1");
        assert_eq!(first.tooltip, "Use prepared statements");
    }

    #[test]
    fn bug_without_location_gets_empty_location() {
        let bugs = BugConverter::new().convert(&parse(), "a.xml");
        let bug = &bugs[1];
        assert_eq!(bug.source_file, "");
        assert_eq!((bug.start_line, bug.end_line), (0, 0));
        assert_eq!(bug.priority, Priority::Normal);
        assert_eq!(bug.rank, UNRANKED);
    }

    #[test]
    fn malformed_severity_degrades_to_low() {
        let bugs = BugConverter::new().convert(&parse(), "a.xml");
        assert_eq!(bugs[2].priority, Priority::Low);
        assert_eq!(bugs[2].rank, 15);
    }

    #[test]
    fn rank_activation_overrides_severity_when_ranked() {
        let bugs = BugConverter::new()
            .with_rank_activated(true)
            .convert(&parse(), "a.xml");
        assert_eq!(bugs[0].priority, Priority::High);
        assert_eq!(bugs[1].priority, Priority::Normal); // unranked: severity 2
        assert_eq!(bugs[2].priority, Priority::Low); // rank 15
    }

    #[test]
    fn reparsing_yields_equal_records() {
        let first = BugConverter::new().convert(&parse(), "a.xml");
        let second = BugConverter::new().convert(&parse(), "a.xml");
        assert_eq!(first, second);
        assert_eq!(first[0].stable_hash, second[0].stable_hash);
        assert_ne!(first[0].stable_hash, first[1].stable_hash);
    }

    #[test]
    fn source_root_prefixes_known_files_only() {
        let bugs = BugConverter::new()
            .with_source_root(Some(PathBuf::from("/ws")))
            .convert(&parse(), "a.xml");
        assert_eq!(bugs[0].source_file, "/ws/src/main/Db.java");
        assert_eq!(bugs[1].source_file, "");
    }

    #[test]
    fn include_and_exclude_patterns_filter_by_file() {
        let converter = BugConverter::new()
            .with_include_patterns("src/**/*.java")
            .unwrap()
            .with_exclude_patterns(" **/test/** ")
            .unwrap();
        let bugs = converter.convert(&parse(), "a.xml");
        let files: Vec<&str> = bugs.iter().map(|b| b.source_file.as_str()).collect();
        assert_eq!(files, vec!["src/main/Db.java", "src/main/Db.java"]);
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = BugConverter::new().with_include_patterns("src/(*").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn group_by_file_keeps_order_and_separate_lists() {
        let bugs = BugConverter::new().convert(&parse(), "a.xml");
        let index = group_by_file(&bugs);
        assert_eq!(index.len(), 3);

        let db = &index["src/main/Db.java"];
        assert_eq!(db.len(), 2);
        assert_eq!(db[0].start_line, 42);
        assert_eq!(db[1].start_line, 90);
        assert_eq!(index[""].len(), 1);
        assert_eq!(index["src/test/DbTest.java"].len(), 1);
    }
}
