//! Package metadata supplied by the build and the submission descriptor
//! produced from it.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Package description as configured for the build step. Empty strings mean
/// "not set".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    /// Version template; may contain `$build`, `$date`, `$git` and `$svn`.
    pub version: String,
    pub package_dir: String,
    pub language: String,
    pub language_version: String,
    pub build_system: String,
    pub build_directory: String,
    pub build_file: String,
    pub build_target: String,
    pub build_command: String,
    pub build_options: String,
    pub config_command: String,
    pub config_options: String,
    pub config_directory: String,
    pub clean_command: String,
}

/// Facts about the running build that feed macro substitution and file
/// placement.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub build_id: String,
    pub workspace: PathBuf,
    /// Build-local directory for the archive and config file.
    pub build_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub started_at: DateTime<Local>,
    /// Whether the build already failed before this step ran.
    pub build_failed: bool,
}

impl BuildContext {
    pub fn new(build_id: &str, workspace: PathBuf, build_dir: PathBuf) -> Self {
        Self {
            build_id: build_id.to_string(),
            workspace,
            build_dir,
            env: HashMap::new(),
            started_at: Local::now(),
            build_failed: false,
        }
    }
}

/// Everything the upload call needs. Built once per build.
#[derive(Debug, Clone, Serialize)]
pub struct PackageSubmission {
    pub name: String,
    pub version: String,
    pub package_dir: String,
    pub language: String,
    pub language_version: String,
    pub build_system: String,
    pub build_directory: String,
    pub build_file: String,
    pub build_target: String,
    pub build_command: String,
    pub build_options: String,
    pub config_command: String,
    pub config_options: String,
    pub config_directory: String,
    pub clean_command: String,
    pub archive_path: PathBuf,
    pub config_path: PathBuf,
    pub md5: String,
    pub sha512: String,
}

impl PackageSubmission {
    /// Render the `package.conf` contents, one `key=value` per line.
    pub fn render_config(&self) -> String {
        let archive_name = self
            .archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let package_dir = if self.package_dir.is_empty() {
            "."
        } else {
            self.package_dir.as_str()
        };

        let mut lines = vec![
            format!("package-short-name={}", self.name),
            format!("package-version={}", self.version),
            format!("package-archive={archive_name}"),
            format!("package-archive-md5={}", self.md5),
            format!("package-archive-sha512={}", self.sha512),
            format!("package-language={}", self.language),
        ];

        let optional = [
            ("package-language-version", &self.language_version),
        ];
        push_present(&mut lines, &optional);
        lines.push(format!("package-dir={package_dir}"));
        lines.push(format!("build-sys={}", self.build_system));

        let optional = [
            ("build-dir", &self.build_directory),
            ("build-file", &self.build_file),
            ("build-target", &self.build_target),
            ("build-opt", &self.build_options),
            ("build-cmd", &self.build_command),
            ("config-cmd", &self.config_command),
            ("config-opt", &self.config_options),
            ("config-dir", &self.config_directory),
        ];
        push_present(&mut lines, &optional);

        let mut rendered = lines.join("\n");
        rendered.push('\n');
        rendered
    }
}

fn push_present(lines: &mut Vec<String>, fields: &[(&str, &String)]) {
    for (key, value) in fields {
        if !value.is_empty() {
            lines.push(format!("{key}={value}"));
        }
    }
}
