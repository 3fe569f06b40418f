//! Package submission: version macros, build verification, archive,
//! checksums and the `package.conf` descriptor.

use std::path::{Path, PathBuf};

use crate::errors::SwampError;
use crate::models::package::{BuildContext, PackageMetadata, PackageSubmission};
use crate::services::archive::{self, Checksums};

pub const CONFIG_FILE_NAME: &str = "package.conf";

const DATE_FORMAT: &str = "%Y/%m/%d-%H:%M:%S";

pub const VALID_LANGUAGES: &[&str] = &[
    "C", "C++", "CSS", "HTML", "Java", "JavaScript", "PHP", "Perl", "Python", "Python-2",
    "Python-3", "Ruby",
];

pub const VALID_BUILD_SYSTEMS: &[&str] = &[
    "android+ant", "android+ant+ivy", "android+gradle", "android+maven", "ant", "ant+ivy",
    "cmake+make", "configure+make", "gradle", "java-bytecode", "make", "maven", "no-build",
    "none", "other", "python-distutils",
];

const C_BUILD_SYSTEMS: &[&str] = &["cmake+make", "configure+make", "make", "no-build", "other"];
const JAVA_BUILD_SYSTEMS: &[&str] = &[
    "ant", "ant+ivy", "gradle", "maven", "no-build", "android+ant", "android+gradle",
    "android+maven",
];
const PYTHON_BUILD_SYSTEMS: &[&str] = &["python-distutils", "no-build", "other"];
const RUBY_BUILD_SYSTEMS: &[&str] = &[
    "bundler", "bundler+rake", "bundler+other", "rake", "no-build", "other", "rubygem",
];

/// Build systems accepted for a language, when it has its own list.
pub fn build_systems_for(language: &str) -> Option<&'static [&'static str]> {
    match language {
        "C" | "C++" => Some(C_BUILD_SYSTEMS),
        "Java" => Some(JAVA_BUILD_SYSTEMS),
        "Python-2" | "Python-3" => Some(PYTHON_BUILD_SYSTEMS),
        "Ruby" => Some(RUBY_BUILD_SYSTEMS),
        _ => None,
    }
}

/// Candidate build files for a build system, in lookup order.
pub fn default_build_files(build_system: &str) -> Option<&'static [&'static str]> {
    match build_system {
        "ant" | "ivy" => Some(&["build.xml"]),
        "maven" => Some(&["pom.xml"]),
        "make" => Some(&["GNUmakefile", "makefile", "Makefile"]),
        "gradle" => Some(&["build.gradle"]),
        "rake" => Some(&["Rakefile", "rakefile"]),
        "bundler" => Some(&["Gemfile", "gemfile"]),
        _ => None,
    }
}

/// Clean command used when none was configured.
pub fn default_clean_command(build_system: &str) -> String {
    if build_system == "maven" {
        "mvn clean".to_string()
    } else {
        format!("{build_system} clean")
    }
}

/// Reject languages and build systems the service does not accept.
pub fn validate(metadata: &PackageMetadata) -> Result<(), SwampError> {
    if metadata.name.trim().is_empty() {
        return Err(SwampError::Config("package name is empty".into()));
    }
    if !VALID_LANGUAGES.contains(&metadata.language.as_str()) {
        return Err(SwampError::Config(format!(
            "unsupported package language {:?}",
            metadata.language
        )));
    }
    let allowed = build_systems_for(&metadata.language).unwrap_or(VALID_BUILD_SYSTEMS);
    if !allowed.contains(&metadata.build_system.as_str()) {
        return Err(SwampError::Config(format!(
            "build system {:?} is not valid for {}",
            metadata.build_system, metadata.language
        )));
    }
    Ok(())
}

/// Check that the build file the build system needs is present.
///
/// An explicit build file must exist. Otherwise one of the build system's
/// default files must exist; build systems without defaults pass with a
/// warning.
pub fn verify_build_file(metadata: &PackageMetadata, workspace: &Path) -> Result<(), SwampError> {
    let build_dir = if metadata.build_directory.is_empty() {
        workspace.to_path_buf()
    } else {
        workspace.join(&metadata.build_directory)
    };

    if !metadata.build_file.is_empty() {
        let path = build_dir.join(&metadata.build_file);
        if !path.exists() {
            return Err(SwampError::Config(format!(
                "build file {} not found",
                path.display()
            )));
        }
        return Ok(());
    }

    let Some(candidates) = default_build_files(&metadata.build_system) else {
        tracing::warn!(build_system = %metadata.build_system, "Could not verify build file");
        return Ok(());
    };

    if candidates.iter().any(|name| build_dir.join(name).exists()) {
        Ok(())
    } else {
        Err(SwampError::Config(format!(
            "build file {} not found at {}",
            candidates.join(","),
            build_dir.display()
        )))
    }
}

/// Apply `$build`, `$date`, `$git` and `$svn` to a version template and make
/// the result safe for file names.
///
/// A missing VCS variable removes its macro with a warning.
pub fn substitute_version(template: &str, ctx: &BuildContext) -> String {
    let mut version = template.replace("$build", &ctx.build_id);
    if version.contains("$date") {
        version = version.replace("$date", &ctx.started_at.format(DATE_FORMAT).to_string());
    }

    let revisions = [
        ("$git", "GIT_COMMIT", "Git commit"),
        ("$svn", "SVN_REVISION", "Subversion revision"),
    ];
    for (token, var, label) in revisions {
        if !version.contains(token) {
            continue;
        }
        match ctx.env.get(var) {
            Some(value) => version = version.replace(token, value),
            None => {
                tracing::warn!(
                    variable = var,
                    "{label} not available. Replacing with blank string."
                );
                version = version.replace(token, "");
            }
        }
    }

    sanitize(&version)
}

/// Replace path-hostile characters with `-`.
pub fn sanitize(value: &str) -> String {
    value.replace(['/', '\\', ':'], "-")
}

/// Builds the [`PackageSubmission`] for one build.
pub struct PackageSubmissionBuilder<'a> {
    metadata: &'a PackageMetadata,
}

impl<'a> PackageSubmissionBuilder<'a> {
    pub fn new(metadata: &'a PackageMetadata) -> Self {
        Self { metadata }
    }

    /// Archive the package, checksum it and write `package.conf`.
    ///
    /// Both files land in the build-local directory and are left for the
    /// caller to clean up.
    pub async fn build(&self, ctx: &BuildContext) -> Result<PackageSubmission, SwampError> {
        let meta = self.metadata;
        let version = substitute_version(&meta.version, ctx);

        tokio::fs::create_dir_all(&ctx.build_dir).await?;
        let archive_path = ctx
            .build_dir
            .join(sanitize(&format!("{}-{version}.zip", meta.name)));
        let package_path = if meta.package_dir.is_empty() {
            ctx.workspace.clone()
        } else {
            ctx.workspace.join(&meta.package_dir)
        };

        let checksums = {
            let archive_path = archive_path.clone();
            tokio::task::spawn_blocking(move || -> Result<Checksums, SwampError> {
                let stored = archive::zip_directory(&package_path, &archive_path)?;
                tracing::debug!(
                    files = stored,
                    archive = %archive_path.display(),
                    "Archive created"
                );
                Ok(Checksums::of_file(&archive_path)?)
            })
            .await
            .map_err(|e| SwampError::Io(std::io::Error::other(e)))??
        };
        tracing::debug!(md5 = %checksums.md5, sha512 = %checksums.sha512, "Archive checksums");

        let clean_command = if meta.clean_command.is_empty() {
            default_clean_command(&meta.build_system)
        } else {
            meta.clean_command.clone()
        };

        let submission = PackageSubmission {
            name: meta.name.clone(),
            version,
            package_dir: meta.package_dir.clone(),
            language: meta.language.clone(),
            language_version: meta.language_version.clone(),
            build_system: meta.build_system.clone(),
            build_directory: meta.build_directory.clone(),
            build_file: meta.build_file.clone(),
            build_target: meta.build_target.clone(),
            build_command: meta.build_command.clone(),
            build_options: meta.build_options.clone(),
            config_command: meta.config_command.clone(),
            config_options: meta.config_options.clone(),
            config_directory: meta.config_directory.clone(),
            clean_command,
            archive_path,
            config_path: config_path(&ctx.build_dir),
            md5: checksums.md5,
            sha512: checksums.sha512,
        };

        tokio::fs::write(&submission.config_path, submission.render_config()).await?;
        tracing::debug!(path = %submission.config_path.display(), "Config file written");
        Ok(submission)
    }
}

fn config_path(build_dir: &Path) -> PathBuf {
    build_dir.join(CONFIG_FILE_NAME)
}
