use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use swamp_assess::config;
use swamp_assess::models::bug::BugRecord;
use swamp_assess::parsers::bugs::BugConverter;
use swamp_assess::services::naming::collect_result_files;
use swamp_assess::services::report::{
    compare_with_previous, BugDelta, FileReport, PrioritySummary,
};

#[derive(Serialize)]
struct Summary {
    package: String,
    version: String,
    totals: PrioritySummary,
    files: Vec<FileSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta: Option<DeltaSummary>,
}

#[derive(Serialize)]
struct FileSummary {
    file: String,
    tool: Option<String>,
    bugs: PrioritySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct DeltaSummary {
    previous_version: String,
    new: usize,
    fixed: usize,
    unchanged: usize,
}

impl DeltaSummary {
    fn new(previous_version: &str, delta: &BugDelta) -> Self {
        Self {
            previous_version: previous_version.to_string(),
            new: delta.new.len(),
            fixed: delta.fixed.len(),
            unchanged: delta.unchanged.len(),
        }
    }
}

fn parse_version(
    dir: &Path,
    package: &str,
    version: &str,
    converter: &BugConverter,
) -> anyhow::Result<Vec<FileReport>> {
    let files = collect_result_files(dir, package, version)
        .with_context(|| format!("Failed to list result files in {}", dir.display()))?;
    tracing::info!(package, version, files = files.len(), "Collecting SWAMP analysis files");
    Ok(files.iter().map(|f| FileReport::parse(f, converter)).collect())
}

fn all_bugs(reports: &[FileReport]) -> Vec<BugRecord> {
    reports.iter().flat_map(|r| r.bugs.iter().cloned()).collect()
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    swamp_assess::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (package, version, previous) = match args.as_slice() {
        [package, version] => (package.as_str(), version.as_str(), None),
        [package, version, previous] => {
            (package.as_str(), version.as_str(), Some(previous.as_str()))
        }
        _ => bail!("usage: swamp-report <package> <version> [<previous-version>]"),
    };

    let output_dir = config::output_dir_from_env();
    let converter = config::ParserSettings::from_env()
        .converter()
        .context("Invalid SWAMP parser settings")?;

    let reports = parse_version(&output_dir, package, version, &converter)?;
    let current = all_bugs(&reports);

    let delta = match previous {
        Some(previous_version) => {
            let earlier =
                all_bugs(&parse_version(&output_dir, package, previous_version, &converter)?);
            let delta = compare_with_previous(&current, &earlier);
            Some(DeltaSummary::new(previous_version, &delta))
        }
        None => None,
    };

    let summary = Summary {
        package: package.to_string(),
        version: version.to_string(),
        totals: PrioritySummary::of(&current),
        files: reports
            .iter()
            .map(|r| FileSummary {
                file: r.file.display().to_string(),
                tool: r.tool.clone(),
                bugs: PrioritySummary::of(&r.bugs),
                error: r.parse_error.clone(),
            })
            .collect(),
        delta,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
