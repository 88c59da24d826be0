//! Configuration for floop, read from `floop.toml` in the project directory.
//!
//! Settings are layered file → environment → CLI. Every key is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! path = "storage/feedback"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//! route_prefix = "_feedback"
//! cors = false
//!
//! [submission]
//! default_type = "feedback"
//! screenshot_max_size = 5242880
//! max_message_length = 5000
//!
//! [watch]
//! interval = 5
//! timeout = 300
//! retries = 2
//! tools = "Bash,Read,Edit,Write,Glob,Grep"
//! model = "sonnet"
//! claude_cmd = "claude"
//! ```
//!
//! Environment overrides: `FLOOP_STORAGE_PATH`, `CLAUDE_CMD`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::WorkOrderType;

pub const CONFIG_FILE: &str = "floop.toml";
pub const STORAGE_PATH_ENV: &str = "FLOOP_STORAGE_PATH";
pub const CLAUDE_CMD_ENV: &str = "CLAUDE_CMD";

/// Where work orders live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Storage root, relative to the project directory unless absolute.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "storage/feedback".to_string()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// HTTP API settings for `floop serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path segment the API is mounted under.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    /// Allow cross-origin requests (for widgets served from another port).
    #[serde(default)]
    pub cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3142
}

fn default_route_prefix() -> String {
    "_feedback".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            route_prefix: default_route_prefix(),
            cors: false,
        }
    }
}

/// Limits applied to incoming submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSection {
    /// Type used when a submission omits `type`.
    #[serde(default = "default_type")]
    pub default_type: String,
    /// Maximum length of the screenshot data URL, in bytes.
    #[serde(default = "default_screenshot_max_size")]
    pub screenshot_max_size: usize,
    /// Maximum message length, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_type() -> String {
    "feedback".to_string()
}

fn default_screenshot_max_size() -> usize {
    5 * 1024 * 1024
}

fn default_max_message_length() -> usize {
    5000
}

impl Default for SubmissionSection {
    fn default() -> Self {
        Self {
            default_type: default_type(),
            screenshot_max_size: default_screenshot_max_size(),
            max_message_length: default_max_message_length(),
        }
    }
}

/// Agent watcher settings for `floop watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSection {
    /// Seconds between polls of `pending/`.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Seconds before an agent run is killed.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Extra attempts after a failed agent run.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Comma-separated `--allowedTools` value.
    #[serde(default = "default_tools")]
    pub tools: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_cmd: Option<String>,
}

fn default_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> u32 {
    2
}

fn default_tools() -> String {
    "Bash,Read,Edit,Write,Glob,Grep".to_string()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            timeout: default_timeout(),
            retries: default_retries(),
            tools: default_tools(),
            model: None,
            claude_cmd: None,
        }
    }
}

/// The complete floop.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FloopToml {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub submission: SubmissionSection,
    #[serde(default)]
    pub watch: WatchSection,
}

impl FloopToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse floop.toml")
    }

    /// Load `floop.toml` from `project_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize floop.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.submission.default_type.parse::<WorkOrderType>().is_err() {
            warnings.push(format!(
                "Unknown default_type '{}': falling back to 'feedback'",
                self.submission.default_type
            ));
        }
        if self.server.route_prefix.trim_matches('/').is_empty() {
            warnings.push("Empty route_prefix: API will be mounted at '/'".to_string());
        }
        if self.watch.interval == 0 {
            warnings.push("watch.interval is 0: the watcher will poll continuously".to_string());
        }
        if self.watch.timeout == 0 {
            warnings.push("watch.timeout is 0: every agent run will time out".to_string());
        }
        if self.watch.tools.trim().is_empty() {
            warnings.push("watch.tools is empty: the agent will have no tools".to_string());
        }

        warnings
    }
}

/// Values supplied on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub storage_path: Option<PathBuf>,
}

/// Effective configuration combining `floop.toml`, environment and CLI.
#[derive(Debug, Clone)]
pub struct FloopConfig {
    pub project_dir: PathBuf,
    pub toml: FloopToml,
    storage_path: PathBuf,
    claude_cmd: String,
}

impl FloopConfig {
    /// Resolve configuration for `project_dir` using the process environment.
    pub fn load(project_dir: PathBuf, cli: CliOverrides) -> Result<Self> {
        let toml = FloopToml::load_or_default(&project_dir)?;
        Ok(Self::from_parts(project_dir, toml, cli, |key| {
            std::env::var(key).ok()
        }))
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn from_parts(
        project_dir: PathBuf,
        toml: FloopToml,
        cli: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let storage = cli
            .storage_path
            .or_else(|| env(STORAGE_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(&toml.storage.path));
        let storage_path = if storage.is_absolute() {
            storage
        } else {
            project_dir.join(storage)
        };

        let claude_cmd = env(CLAUDE_CMD_ENV)
            .or_else(|| toml.watch.claude_cmd.clone())
            .unwrap_or_else(|| "claude".to_string());

        Self {
            project_dir,
            toml,
            storage_path,
            claude_cmd,
        }
    }

    /// Storage root (CLI → env → file → default), absolute.
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Agent command (env → file → `claude`).
    pub fn claude_cmd(&self) -> &str {
        &self.claude_cmd
    }

    /// `route_prefix` normalised to `/segment` (or empty for root).
    pub fn route_prefix(&self) -> String {
        let trimmed = self.toml.server.route_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    pub fn default_type(&self) -> WorkOrderType {
        WorkOrderType::parse_lenient(&self.toml.submission.default_type)
    }

    pub fn config_file(&self) -> PathBuf {
        self.project_dir.join(CONFIG_FILE)
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
