//! Layered configuration: defaults, then TOML file, then `CMDQUEUE_*` env

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cmdqueue_infra_system::RemoteTarget;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "~/.cmdqueue/config.toml";
const DEFAULT_STORE_PATH: &str = "~/.cmdqueue/command_queues.json";
const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "LANG", "TERM"];
const ENV_PREFIX: &str = "CMDQUEUE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// How new queue ids are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStyle {
    /// `q1`, `q2`, ...
    Sequential,
    Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub env_allowlist: Vec<String>,
    #[serde(default)]
    pub remote: Option<RemoteTarget>,
}

impl ExecutorSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store_path: PathBuf,
    pub log_format: LogFormat,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    pub id_style: IdStyle,
    pub executor: ExecutorSettings,
}

impl Settings {
    /// Load from `config_file` (must exist) or the default path (optional),
    /// overridden by the process environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let (path, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (expand(Path::new(DEFAULT_CONFIG_PATH)), false),
        };
        Self::build(Some((&path, required)), env_source())
    }

    fn build(file: Option<(&Path, bool)>, env: Environment) -> Result<Self> {
        let mut builder = defaults()?;
        if let Some((path, required)) = file {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        let settings: Settings = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        Ok(settings.expanded())
    }

    fn expanded(mut self) -> Self {
        self.store_path = expand(&self.store_path);
        self.log_dir = self.log_dir.map(|dir| expand(&dir));
        if let Some(remote) = self.executor.remote.as_mut() {
            remote.identity_file = remote.identity_file.take().map(|key| expand(&key));
        }
        self
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("store_path", DEFAULT_STORE_PATH)?
        .set_default("log_format", "pretty")?
        .set_default("id_style", "sequential")?
        .set_default("executor.env_allowlist", DEFAULT_ENV_ALLOWLIST.to_vec())?)
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("executor.env_allowlist")
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
