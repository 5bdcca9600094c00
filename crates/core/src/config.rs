use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::job::JobTimeouts;
use crate::replay::UnreachablePolicy;

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_DATA_DIR: &str = "AUDIOVAULT_DATA_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub server: ServerConfig,
    pub conversion: ConversionConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of converted artifacts, one folder per title.
    pub media_dir: PathBuf,
    /// Static site served for every route the server does not own.
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Base URL used to probe artifact availability. Derived from the bound
    /// address when unset.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConversionConfig {
    pub fetch_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReplayConfig {
    pub unreachable_policy: UnreachablePolicy,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("public/media"),
            public_dir: PathBuf::from("public"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            public_base_url: None,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        let timeouts = JobTimeouts::default();
        Self {
            fetch_timeout_secs: timeouts.fetch.as_secs(),
            transcode_timeout_secs: timeouts.transcode.as_secs(),
        }
    }
}

impl ConversionConfig {
    pub fn timeouts(&self) -> JobTimeouts {
        JobTimeouts {
            fetch: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            transcode: Duration::from_secs(self.transcode_timeout_secs.max(1)),
        }
    }
}

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config TOML: {}", path.display()))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .context("config path does not have a parent directory")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {}", parent.display()))?;

        let encoded = toml::to_string_pretty(self).context("failed to serialize config TOML")?;
        fs::write(path, encoded)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Absolute media and public directories, relative entries resolved
    /// against `base`.
    pub fn resolved_paths(&self, base: &Path) -> PathsConfig {
        PathsConfig {
            media_dir: resolve_relative_to(base, &self.paths.media_dir),
            public_dir: resolve_relative_to(base, &self.paths.public_dir),
        }
    }
}

/// Resolve the data directory with 3-tier priority:
/// 1. CLI override if provided
/// 2. AUDIOVAULT_DATA_DIR environment variable
/// 3. Default: ./data
pub fn data_dir(cli_override: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_override {
        return path.to_path_buf();
    }

    if let Some(env_dir) = env::var_os(ENV_DATA_DIR) {
        return PathBuf::from(env_dir);
    }

    PathBuf::from("data")
}

/// Returns the path to config.toml within the given data directory.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/// Initialize the data directory structure on first run:
/// - Creates data_dir if missing
/// - Writes default config.toml only if file doesn't exist
pub fn initialize_data_dir(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    }

    let cfg_path = config_path(data_dir);
    if !cfg_path.exists() {
        AppConfig::default().save_to_path(&cfg_path)?;
    }

    Ok(())
}

/// Resolve a path relative to a base directory.
/// Returns the path as-is if absolute, otherwise joins it to base.
pub fn resolve_relative_to(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Base for relative config paths: the working directory, else the
/// executable's directory, else `.`.
pub fn working_base_dir() -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => cwd,
        Err(cwd_err) => {
            warn!(
                error = %cwd_err,
                "Failed to resolve current directory; falling back to executable directory"
            );
            env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }
}
