//! Path resolution utilities.

use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the serverwamp base directory (~/.serverwamp).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".serverwamp"))
}

/// Get the main config file path (~/.serverwamp/serverwamp.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("serverwamp.json5"))
}
