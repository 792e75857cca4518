use crate::core::config::data::{Config, ConfigKey};
use crate::core::models::Model;
use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors from reading, editing or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config at {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine a configuration directory for this platform")]
    NoConfigDir,

    #[error("Unknown config key '{0}'. Valid keys: chat-url, default-model, plugin-document, upload-url, max-function-calls, request-timeout-secs")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl Config {
    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: config_path.to_path_buf(),
            source,
        };
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(write_err)?;

        temp_file.write_all(contents.as_bytes()).map_err(write_err)?;
        temp_file.as_file_mut().sync_all().map_err(write_err)?;
        temp_file
            .persist(config_path)
            .map_err(|err| write_err(err.error))?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs =
            ProjectDirs::from("org", "sherpa", "sherpa").ok_or(ConfigError::NoConfigDir)?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Validates `value` for `key` and stores it.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<ConfigKey, ConfigError> {
        let key = ConfigKey::parse(key).ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.name(),
                reason: "value must not be empty".to_string(),
            });
        }

        match key {
            ConfigKey::ChatUrl => self.chat_url = Some(value.to_string()),
            ConfigKey::PluginDocument => self.plugin_document = Some(value.to_string()),
            ConfigKey::UploadUrl => self.upload_url = Some(value.to_string()),
            ConfigKey::DefaultModel => {
                let model: Model = value.parse().map_err(|reason| ConfigError::InvalidValue {
                    key: key.name(),
                    reason,
                })?;
                self.default_model = Some(model.label().to_string());
            }
            ConfigKey::MaxFunctionCalls => {
                self.max_function_calls = Some(parse_number(key, value)?);
            }
            ConfigKey::RequestTimeoutSecs => {
                self.request_timeout_secs = Some(parse_number(key, value)?);
            }
        }
        Ok(key)
    }

    pub fn unset_value(&mut self, key: &str) -> Result<ConfigKey, ConfigError> {
        let key = ConfigKey::parse(key).ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        match key {
            ConfigKey::ChatUrl => self.chat_url = None,
            ConfigKey::DefaultModel => self.default_model = None,
            ConfigKey::PluginDocument => self.plugin_document = None,
            ConfigKey::UploadUrl => self.upload_url = None,
            ConfigKey::MaxFunctionCalls => self.max_function_calls = None,
            ConfigKey::RequestTimeoutSecs => self.request_timeout_secs = None,
        }
        Ok(key)
    }
}

fn parse_number<T: std::str::FromStr>(key: ConfigKey, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.name(),
        reason: format!("'{value}' is not a non-negative whole number"),
    })
}
