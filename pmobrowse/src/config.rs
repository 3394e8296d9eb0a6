//! Configuration of the browser.
//!
//! The embedded `pmobrowse.yaml` gives every default. It is merged with
//! `config.yaml` from the configuration directory, then with
//! `PMOBROWSE_CONFIG__SECTION__KEY=value` environment variables. The directory
//! is searched in this order:
//! 1. the `directory` argument if not empty
//! 2. the `PMOBROWSE_CONFIG` environment variable
//! 3. `.pmobrowse` in the current directory
//! 4. `.pmobrowse` in the user's home directory

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("pmobrowse.yaml");
const CONFIG_FILE: &str = "config.yaml";
const DIR_NAME: &str = ".pmobrowse";
const ENV_CONFIG_DIR: &str = "PMOBROWSE_CONFIG";
const ENV_PREFIX: &str = "PMOBROWSE_CONFIG__";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BrowseConfig {
    /// Device type listed at the root level
    pub media_server_urn: String,
    pub fetch: FetchConfig,
    pub discovery: DiscoveryConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    pub worker_threads: usize,
    pub http_timeout_secs: u64,
    /// `RequestedCount` of each Browse call; 0 asks for everything at once
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub search_targets: Vec<String>,
    pub mx: u32,
    pub search_interval_secs: u64,
    pub description_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggerConfig {
    pub min_level: String,
}

impl FetchConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl DiscoveryConfig {
    pub fn description_timeout(&self) -> Duration {
        Duration::from_secs(self.description_timeout_secs)
    }
}

impl Default for BrowseConfig {
    fn default() -> Self {
        // Le YAML embarqué est vérifié par les tests
        Self::from_yaml("").unwrap_or_else(|_| Self {
            media_server_urn: crate::device::MEDIA_SERVER_URN.to_string(),
            fetch: FetchConfig {
                worker_threads: 4,
                http_timeout_secs: 10,
                page_size: 0,
            },
            discovery: DiscoveryConfig {
                search_targets: vec![crate::device::MEDIA_SERVER_URN.to_string()],
                mx: 3,
                search_interval_secs: 60,
                description_timeout_secs: 5,
            },
            logger: LoggerConfig {
                min_level: "info".to_string(),
            },
        })
    }
}

impl BrowseConfig {
    /// Loads the configuration; see the module documentation for the lookup.
    pub fn load(directory: &str) -> Result<Self> {
        let config_dir = find_config_dir(directory);
        let path = config_dir.join(CONFIG_FILE);
        info!(config_file = %path.display(), "Using config file");

        let external = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file not found, using default embedded config");
                String::new()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Cannot read {}", path.display()));
            }
        };

        Self::build(&external, env::vars())
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Defaults merged with `yaml`, without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::build(yaml, std::iter::empty())
    }

    fn build(yaml: &str, vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);
        if !yaml.trim().is_empty() {
            let external = lower_keys_value(serde_yaml::from_str(yaml)?);
            merge_yaml(&mut value, &external);
        }
        apply_env_overrides(&mut value, vars);

        let config: BrowseConfig = serde_yaml::from_value(value)?;
        if config.fetch.worker_threads == 0 {
            return Err(anyhow!("fetch.worker_threads must be at least 1"));
        }
        Ok(config)
    }
}

fn find_config_dir(directory: &str) -> PathBuf {
    if !directory.is_empty() {
        return PathBuf::from(directory);
    }

    if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
        info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
        return PathBuf::from(env_path);
    }

    if Path::new(DIR_NAME).exists() {
        return PathBuf::from(DIR_NAME);
    }

    if let Some(home) = home_dir() {
        let home_config = home.join(DIR_NAME);
        if home_config.exists() {
            return home_config;
        }
    }

    PathBuf::from(DIR_NAME)
}

fn apply_env_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path: Vec<String> = path.split("__").map(str::to_lowercase).collect();
        set_value(config, &key_path, convert_env_value(&value));
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn set_value(data: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = data;
    for key in parents {
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = current else {
            return;
        };
        current = map
            .entry(Value::String(key.clone()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }

    if let Value::Mapping(map) = current {
        map.insert(Value::String(last.clone()), value);
    }
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lower_keys_value(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges `external` into `default`: mappings recursively, anything else replaced.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
