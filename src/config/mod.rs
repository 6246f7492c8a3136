//! Configuration Management
//!
//! # Configuration Locations
//! - Local: `.sqldesk/config.json` (per-project)
//! - Global: `~/.config/sqldesk/config.json` (per-user, via `dirs::config_dir`)
//!
//! # Resolution Precedence
//! 1. Command-line flags (highest priority)
//! 2. Environment variables (`SQLDESK_DB`, `SQLDESK_BIND`)
//! 3. Local config file
//! 4. Global config file
//! 5. Built-in defaults
//!
//! Config files are partial: any field may be omitted. A missing file is the
//! same as an empty one; a malformed file is an error.
//!
//! The assistant API key never lives in a config file. Only the *name* of the
//! environment variable holding it is configured.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::assistant::Temperatures;
use crate::error::{DeskError, Result};

/// Database file used when nothing else is configured
pub const DEFAULT_DATABASE: &str = "data/local.db";
/// Listen address used when nothing else is configured
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
/// OpenAI-compatible API root
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Completion model
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Environment variable read for the assistant API key
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the database path
pub const ENV_DATABASE: &str = "SQLDESK_DB";
/// Environment variable overriding the bind address
pub const ENV_BIND: &str = "SQLDESK_BIND";

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeskConfig {
    /// `SQLite` database file
    pub database: PathBuf,

    /// HTTP listen address
    pub bind: SocketAddr,

    /// Create and fill the sample tables on startup
    pub seed: bool,

    /// Assistant provider settings
    pub assistant: AssistantConfig,
}

/// Assistant provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    pub model: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// Sampling temperature per assistant operation
    pub temperatures: Temperatures,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperatures: Temperatures::default(),
        }
    }
}

impl AssistantConfig {
    /// Read the API key from the configured environment variable; blank counts as unset
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|key| !key.trim().is_empty())
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            seed: true,
            assistant: AssistantConfig::default(),
        }
    }
}

/// One config source; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    /// Database file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Listen address, parsed when the layers are resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Whether to seed the sample tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<bool>,

    /// Assistant overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<AssistantLayer>,
}

/// Partial assistant settings within a [`ConfigLayer`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantLayer {
    /// API root override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API key variable name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Temperature overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperatures: Option<Temperatures>,
}

impl ConfigLayer {
    /// Layer built from `SQLDESK_DB` / `SQLDESK_BIND`
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            database: var(ENV_DATABASE).map(PathBuf::from),
            bind: var(ENV_BIND),
            ..Self::default()
        }
    }

    /// Overwrite every field of `self` that `higher` sets
    fn merge(&mut self, higher: Self) {
        if higher.database.is_some() {
            self.database = higher.database;
        }
        if higher.bind.is_some() {
            self.bind = higher.bind;
        }
        if higher.seed.is_some() {
            self.seed = higher.seed;
        }
        if let Some(upper) = higher.assistant {
            let lower = self.assistant.get_or_insert_with(AssistantLayer::default);
            if upper.api_base.is_some() {
                lower.api_base = upper.api_base;
            }
            if upper.model.is_some() {
                lower.model = upper.model;
            }
            if upper.api_key_env.is_some() {
                lower.api_key_env = upper.api_key_env;
            }
            if upper.temperatures.is_some() {
                lower.temperatures = upper.temperatures;
            }
        }
    }

    /// Fill the gaps with defaults and validate
    fn finish(self) -> Result<DeskConfig> {
        let defaults = DeskConfig::default();

        let bind = match self.bind {
            Some(raw) => raw
                .trim()
                .parse::<SocketAddr>()
                .map_err(|e| DeskError::config(format!("Invalid bind address '{raw}': {e}")))?,
            None => defaults.bind,
        };

        let assistant = self.assistant.unwrap_or_default();
        let assistant = AssistantConfig {
            api_base: assistant.api_base.unwrap_or(defaults.assistant.api_base),
            model: assistant.model.unwrap_or(defaults.assistant.model),
            api_key_env: assistant.api_key_env.unwrap_or(defaults.assistant.api_key_env),
            temperatures: assistant.temperatures.unwrap_or(defaults.assistant.temperatures),
        };

        Ok(DeskConfig {
            database: self.database.unwrap_or(defaults.database),
            bind,
            seed: self.seed.unwrap_or(defaults.seed),
            assistant,
        })
    }
}

/// Get path to local config file (`.sqldesk/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()
        .map_err(|e| DeskError::config(format!("Could not determine current directory: {e}")))?;

    Ok(current_dir.join(".sqldesk").join("config.json"))
}

/// Get path to global config file (`~/.config/sqldesk/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| DeskError::config("Could not determine user config directory"))?;

    Ok(config_dir.join("sqldesk").join("config.json"))
}

/// Load one config file; a missing file is an empty layer
pub fn load_layer(path: &Path) -> Result<ConfigLayer> {
    if !path.exists() {
        return Ok(ConfigLayer::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| DeskError::config(format!("Could not read config file {}: {e}", path.display())))?;

    serde_json::from_str(&contents)
        .map_err(|e| DeskError::config(format!("Invalid config file {}: {e}", path.display())))
}

/// Merge the sources lowest-first and resolve defaults
///
/// File paths are optional so callers (and tests) can skip a location.
pub fn resolve(
    global: Option<&Path>,
    local: Option<&Path>,
    env: ConfigLayer,
    flags: ConfigLayer,
) -> Result<DeskConfig> {
    let mut merged = ConfigLayer::default();
    if let Some(path) = global {
        merged.merge(load_layer(path)?);
    }
    if let Some(path) = local {
        merged.merge(load_layer(path)?);
    }
    merged.merge(env);
    merged.merge(flags);
    merged.finish()
}

/// Resolve configuration from the standard locations, the process environment and `flags`
pub fn load(flags: ConfigLayer) -> Result<DeskConfig> {
    // No user config dir (e.g. minimal containers) just means no global file
    let global = global_config_path().ok();
    let local = local_config_path()?;
    resolve(global.as_deref(), Some(&local), ConfigLayer::from_env(), flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = resolve(None, None, ConfigLayer::default(), ConfigLayer::default()).unwrap();
        assert_eq!(config, DeskConfig::default());
        assert_eq!(config.database, PathBuf::from("data/local.db"));
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.assistant.model, "gpt-4o");
        assert_eq!(config.assistant.api_key_env, "OPENAI_API_KEY");
        assert!(config.seed);
    }

    #[test]
    fn test_missing_files_are_empty_layers() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let config = resolve(Some(&missing), Some(&missing), ConfigLayer::default(), ConfigLayer::default()).unwrap();
        assert_eq!(config, DeskConfig::default());
    }

    #[test]
    fn test_local_overrides_global() {
        let dir = tempfile::tempdir().unwrap();
        let global = write(
            dir.path(),
            "global.json",
            r#"{"database": "/srv/global.db", "bind": "0.0.0.0:8080", "assistant": {"model": "gpt-4o-mini"}}"#,
        );
        let local = write(dir.path(), "local.json", r#"{"database": "project.db", "seed": false}"#);

        let config = resolve(Some(&global), Some(&local), ConfigLayer::default(), ConfigLayer::default()).unwrap();
        assert_eq!(config.database, PathBuf::from("project.db"));
        assert_eq!(config.bind.to_string(), "0.0.0.0:8080");
        assert!(!config.seed);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(config.assistant.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_env_then_flags_win() {
        let dir = tempfile::tempdir().unwrap();
        let local = write(dir.path(), "local.json", r#"{"database": "file.db", "bind": "127.0.0.1:7000"}"#);

        let env = ConfigLayer {
            database: Some(PathBuf::from("env.db")),
            bind: Some("127.0.0.1:7001".into()),
            ..ConfigLayer::default()
        };
        let flags = ConfigLayer { database: Some(PathBuf::from("flag.db")), ..ConfigLayer::default() };

        let config = resolve(None, Some(&local), env, flags).unwrap();
        assert_eq!(config.database, PathBuf::from("flag.db"));
        assert_eq!(config.bind.to_string(), "127.0.0.1:7001");
    }

    #[test]
    fn test_temperature_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let local = write(dir.path(), "local.json", r#"{"assistant": {"temperatures": {"optimize": 0.0}}}"#);

        let config = resolve(None, Some(&local), ConfigLayer::default(), ConfigLayer::default()).unwrap();
        let temps = config.assistant.temperatures;
        assert!((temps.optimize - 0.0).abs() < f32::EPSILON);
        assert!((temps.generate - 0.3).abs() < f32::EPSILON);
        assert!((temps.explain - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let local = write(dir.path(), "local.json", "{ not json");

        let err = resolve(None, Some(&local), ConfigLayer::default(), ConfigLayer::default()).unwrap_err();
        assert!(matches!(err, DeskError::Config(_)));
        assert!(err.message().contains("local.json"));
    }

    #[test]
    fn test_invalid_bind_is_config_error() {
        let flags = ConfigLayer { bind: Some("localhost".into()), ..ConfigLayer::default() };
        let err = resolve(None, None, ConfigLayer::default(), flags).unwrap_err();
        assert!(matches!(err, DeskError::Config(ref msg) if msg.contains("localhost")));
    }

    #[test]
    fn test_config_paths() {
        assert!(local_config_path().unwrap().ends_with(".sqldesk/config.json"));
        if let Ok(global) = global_config_path() {
            assert!(global.ends_with("sqldesk/config.json"));
        }
    }

    #[test]
    fn test_api_key_never_serialized() {
        let config = DeskConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("apiKeyEnv"));
        assert!(!json.contains("sk-"));
    }
}
