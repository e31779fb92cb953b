//! Configuration loading.

use super::Config;
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::Path;
use tracing::debug;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        debug!(path = %path.display(), "Loading configuration");
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from the default path, falling back to defaults if no file exists.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Self::load_or_default_from(&paths::config_file()?)
    }

    /// Load from `path`, falling back to defaults if it does not exist.
    pub fn load_or_default_from(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply `SERVERWAMP_HOST` and `SERVERWAMP_PORT` overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVERWAMP_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Some(port) = lookup("SERVERWAMP_PORT") {
            self.server.port = port.parse::<u16>().map_err(|_| {
                ConfigError::Validation(format!(
                    "SERVERWAMP_PORT must be a port number, got '{}'",
                    port
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize to a pretty JSON string (valid JSON5).
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.server.host.trim().is_empty() {
            errors.push("Server host cannot be empty".to_string());
        }

        if !self.server.path.starts_with('/') {
            errors.push(format!(
                "Server path must start with '/', got '{}'",
                self.server.path
            ));
        }

        if self.server.agent_name.trim().is_empty() {
            errors.push("Agent name cannot be empty".to_string());
        }

        if self.server.max_connections == 0 {
            errors.push("max_connections must be greater than 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "Unknown log level '{}', expected one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
