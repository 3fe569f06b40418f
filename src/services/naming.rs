//! File names for persisted assessment results.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

const RESULT_PREFIX: &str = "Assessment-";
const RESULT_EXTENSION: &str = ".xml";

/// `Assessment-<package>-<version>-<platform>-<tool>.xml`, with hyphens in
/// the tool name turned into underscores, spaces into underscores and any
/// remaining `/` into `-`.
pub fn result_file_name(package: &str, upload_version: &str, platform: &str, tool: &str) -> String {
    let stem = format!(
        "{RESULT_PREFIX}{package}-{upload_version}-{platform}-{}",
        tool.replace('-', "_")
    );
    format!("{}{RESULT_EXTENSION}", stem.replace(' ', "_").replace('/', "-"))
}

/// Hands out result paths inside one output directory, never reusing a name
/// from this batch or one already on disk.
#[derive(Debug)]
pub struct ResultNamer {
    dir: PathBuf,
    taken: HashSet<String>,
}

impl ResultNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            taken: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve `name`, or `name (n).xml` for the smallest free `n`.
    pub fn reserve(&mut self, name: &str) -> PathBuf {
        let stem = name.strip_suffix(RESULT_EXTENSION).unwrap_or(name);
        let mut candidate = name.to_string();
        let mut n = 1;
        while self.taken.contains(&candidate) || self.dir.join(&candidate).exists() {
            candidate = format!("{stem}({n}){RESULT_EXTENSION}");
            n += 1;
        }
        if candidate != name {
            tracing::warn!(requested = name, used = %candidate, "Result file name already in use");
        }
        let path = self.dir.join(&candidate);
        self.taken.insert(candidate);
        path
    }
}

/// Result files of earlier runs for one package version, sorted by name.
pub fn collect_result_files(
    dir: &Path,
    package: &str,
    version: &str,
) -> std::io::Result<Vec<PathBuf>> {
    let prefix = format!("{RESULT_PREFIX}{package}-{version}");
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix)
            && name.ends_with(RESULT_EXTENSION)
            && entry.file_type()?.is_file()
        {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
