// ABOUTME: Configuration types and parsing for horsestrap.yml.
// ABOUTME: Handles YAML parsing, discovery, validation, and project-relative paths.

mod deserialize;
mod env_file;
mod env_value;
mod health;
mod init;

pub use env_file::DotEnv;
pub use env_value::EnvValue;
pub use health::{HealthConfig, HttpProbeConfig, ProbeBudget, default_accepted_statuses};
pub use init::init_config;

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::types::ServiceName;
use deserialize::{deserialize_service_name, deserialize_services};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "horsestrap.yml";
pub const CONFIG_FILENAME_ALT: &str = "horsestrap.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".horsestrap/config.yml";

/// Per-project state directory holding the lock file and hooks.
pub const STATE_DIR: &str = ".horsestrap";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,

    #[serde(default)]
    pub compose_project: Option<String>,

    /// Service whose running image identity decides `image_changed`.
    #[serde(deserialize_with = "deserialize_service_name")]
    pub primary_service: ServiceName,

    /// Services recreated on update. Never includes the database.
    #[serde(deserialize_with = "deserialize_services")]
    pub app_services: NonEmpty<ServiceName>,

    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Project-relative files copied into every snapshot.
    #[serde(default)]
    pub config_files: Vec<PathBuf>,

    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    #[serde(default)]
    pub backups: BackupsConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default = "health::default_rollback_probe")]
    pub rollback_probe: ProbeBudget,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Explicit container runtime and socket; detected when unset.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Directory all relative paths resolve against. Set by discovery.
    #[serde(skip)]
    pub project_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(deserialize_with = "deserialize_service_name")]
    pub service: ServiceName,
    pub user: EnvValue,
    pub name: EnvValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupsConfig {
    #[serde(default = "default_backups_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_retain")]
    pub retain: usize,
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            dir: default_backups_dir(),
            retain: default_retain(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_stale_after", with = "humantime_serde")]
    pub stale_after: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_backups_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_retain() -> usize {
    5
}

fn default_stale_after() -> Duration {
    Duration::from_secs(3600)
}

fn default_command_timeout() -> Duration {
    crate::runtime::DEFAULT_COMMAND_TIMEOUT
}

impl Config {
    /// Parse and validate. Paths resolve against the current directory.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; the project directory is the one the file lives in.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.project_dir = project_dir_for(path);
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                let mut config = Self::load(path)?;
                config.project_dir = dir.to_path_buf();
                return Ok(config);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_app_service(&self.primary_service) {
            return Err(Error::InvalidConfig(format!(
                "primary_service '{}' is not listed in app_services",
                self.primary_service
            )));
        }

        if let Some(ref db) = self.database {
            if self.is_app_service(&db.service) {
                return Err(Error::InvalidConfig(format!(
                    "database service '{}' must not be listed in app_services",
                    db.service
                )));
            }
        }

        if self.backups.retain == 0 {
            return Err(Error::InvalidConfig(
                "backups.retain must be at least 1".to_string(),
            ));
        }

        let mut budgets = vec![
            ("health.services", self.health.services),
            ("rollback_probe", self.rollback_probe),
        ];
        if let Some(ref http) = self.health.http {
            budgets.push(("health.http.budget", http.budget));
            if !http.url.starts_with("http://") {
                return Err(Error::InvalidConfig(format!(
                    "health.http.url must be an http:// URL, got '{}'",
                    http.url
                )));
            }
            if http.accepted_statuses.is_empty() {
                return Err(Error::InvalidConfig(
                    "health.http.accepted_statuses cannot be empty".to_string(),
                ));
            }
        }
        for (name, budget) in budgets {
            if budget.max_attempts == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{}.max_attempts must be at least 1",
                    name
                )));
            }
        }

        for file in &self.config_files {
            let escapes = file.is_absolute()
                || file
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
            if escapes {
                return Err(Error::InvalidConfig(format!(
                    "config file '{}' must be relative to the project directory",
                    file.display()
                )));
            }
        }

        Ok(())
    }

    pub fn is_app_service(&self, service: &ServiceName) -> bool {
        self.app_services.iter().any(|s| s == service)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn compose_file_path(&self) -> PathBuf {
        self.resolve_path(&self.compose_file)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.resolve_path(&self.backups.dir)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_dir.join(STATE_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("deploy.lock")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.state_dir().join("hooks")
    }

    /// Compose project name: configured, or derived from the project directory
    /// the way compose does.
    pub fn compose_project_name(&self) -> String {
        if let Some(ref name) = self.compose_project {
            return name.clone();
        }

        let dir = self
            .project_dir
            .canonicalize()
            .unwrap_or_else(|_| self.project_dir.clone());
        let derived: String = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();

        if derived.is_empty() {
            "horsestrap".to_string()
        } else {
            derived
        }
    }

    /// Key/value environment from the project's env file.
    pub fn dotenv(&self) -> Result<DotEnv> {
        DotEnv::load(&self.resolve_path(&self.env_file))
    }
}

/// `.horsestrap/config.yml` belongs to the directory above `.horsestrap`.
fn project_dir_for(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or_else(|| Path::new(""));
    let dir = if parent.file_name().is_some_and(|n| n == STATE_DIR) {
        parent.parent().unwrap_or_else(|| Path::new(""))
    } else {
        parent
    };
    if dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        dir.to_path_buf()
    }
}
