use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::SwampError;
use crate::parsers::bugs::BugConverter;

const DEFAULT_HOST_URL: &str = "https://www.mir-swamp.org";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_OUTPUT_DIR: &str = "swamp-results";

/// Login credentials for the SWAMP service.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Assessment client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct SwampConfig {
    pub credentials: Credentials,
    pub host_url: String,
    pub poll_interval: Duration,
    /// Upper bound on the whole polling phase; `None` waits indefinitely.
    pub poll_timeout: Option<Duration>,
    pub output_dir: PathBuf,
    pub run_on_fail: bool,
    pub keep_session: bool,
    pub parser: ParserSettings,
}

/// How result documents are turned into bug records.
#[derive(Debug, Clone, Default)]
pub struct ParserSettings {
    /// Derive priority from the bug rank when the tool reports one.
    pub rank_activated: bool,
    /// Comma-separated file patterns; empty keeps every file.
    pub include_patterns: String,
    /// Comma-separated file patterns to drop.
    pub exclude_patterns: String,
    pub source_root: Option<PathBuf>,
}

impl ParserSettings {
    /// Read the parser settings alone. Needs no credentials.
    pub fn from_env() -> Self {
        Self {
            rank_activated: flag("SWAMP_RANK_ACTIVATED"),
            include_patterns: env::var("SWAMP_INCLUDE_PATTERNS").unwrap_or_default(),
            exclude_patterns: env::var("SWAMP_EXCLUDE_PATTERNS").unwrap_or_default(),
            source_root: env::var("SWAMP_SOURCE_ROOT").ok().map(PathBuf::from),
        }
    }

    /// Build the converter; an invalid pattern is a configuration error.
    pub fn converter(&self) -> Result<BugConverter, SwampError> {
        BugConverter::new()
            .with_rank_activated(self.rank_activated)
            .with_source_root(self.source_root.clone())
            .with_include_patterns(&self.include_patterns)?
            .with_exclude_patterns(&self.exclude_patterns)
    }
}

impl SwampConfig {
    pub fn from_env() -> Result<Self, SwampError> {
        let timeout_secs: u64 = env::var("SWAMP_POLL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);

        let parser = ParserSettings::from_env();
        parser.converter()?;

        Ok(Self {
            credentials: Credentials {
                username: required("SWAMP_USERNAME")?,
                password: required("SWAMP_PASSWORD")?,
            },
            host_url: env::var("SWAMP_HOST_URL")
                .unwrap_or_else(|_| DEFAULT_HOST_URL.to_string()),
            poll_interval: Duration::from_secs(
                env::var("SWAMP_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_SECS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            poll_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            output_dir: output_dir_from_env(),
            run_on_fail: flag("SWAMP_RUN_ON_FAIL"),
            keep_session: flag("SWAMP_KEEP_SESSION"),
            parser,
        })
    }

    /// Configuration with defaults for everything except the credentials.
    pub fn with_credentials(username: &str, password: &str) -> Self {
        Self {
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_string(),
            },
            host_url: DEFAULT_HOST_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_timeout: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            run_on_fail: false,
            keep_session: false,
            parser: ParserSettings::default(),
        }
    }
}

/// Directory holding result files. Needs no credentials.
pub fn output_dir_from_env() -> PathBuf {
    env::var("SWAMP_OUTPUT_DIR")
        .unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string())
        .into()
}

fn required(key: &str) -> Result<String, SwampError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SwampError::Config(format!("{key} is not set"))),
    }
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment is process-global; keep every env-mutating assertion in one test.
    #[test]
    fn from_env_reads_values_and_defaults() {
        env::remove_var("SWAMP_USERNAME");
        env::set_var("SWAMP_PASSWORD", "secret");
        let err = SwampConfig::from_env().unwrap_err();
        assert!(err.is_config());

        env::set_var("SWAMP_USERNAME", "ci-bot");
        env::set_var("SWAMP_POLL_INTERVAL_SECS", "not-a-number");
        env::set_var("SWAMP_POLL_TIMEOUT_SECS", "600");
        env::set_var("SWAMP_RUN_ON_FAIL", "true");
        env::remove_var("SWAMP_HOST_URL");
        env::remove_var("SWAMP_KEEP_SESSION");

        let config = SwampConfig::from_env().unwrap();
        assert_eq!(config.credentials.username, "ci-bot");
        assert_eq!(config.host_url, DEFAULT_HOST_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.poll_timeout, Some(Duration::from_secs(600)));
        assert!(config.run_on_fail);
        assert!(!config.keep_session);

        env::set_var("SWAMP_POLL_TIMEOUT_SECS", "0");
        let config = SwampConfig::from_env().unwrap();
        assert_eq!(config.poll_timeout, None);
        assert!(!config.parser.rank_activated);

        env::set_var("SWAMP_RANK_ACTIVATED", "yes");
        env::set_var("SWAMP_INCLUDE_PATTERNS", "src/**/*.java");
        env::set_var("SWAMP_EXCLUDE_PATTERNS", "**/test/**");
        let config = SwampConfig::from_env().unwrap();
        assert!(config.parser.rank_activated);
        assert_eq!(config.parser.include_patterns, "src/**/*.java");
        assert!(config.parser.converter().is_ok());

        env::set_var("SWAMP_EXCLUDE_PATTERNS", "src/(*");
        assert!(SwampConfig::from_env().unwrap_err().is_config());
        env::remove_var("SWAMP_EXCLUDE_PATTERNS");
        env::remove_var("SWAMP_INCLUDE_PATTERNS");
        env::remove_var("SWAMP_RANK_ACTIVATED");
    }

    #[test]
    fn debug_output_hides_password() {
        let config = SwampConfig::with_credentials("ci-bot", "hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("ci-bot"));
        assert!(!rendered.contains("hunter2"));
    }
}
