//! Configuration management commands.

use clap::Args;
use serverwamp_core::config::Config;
use serverwamp_core::paths;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", config.to_json5()?);
        }

        ConfigCommand::Get { key } => match lookup(&config, &key)? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => anyhow::bail!("Key not found: {}", key),
        },

        ConfigCommand::Path => {
            let path = paths::config_file()?;
            println!("{}", path.display());
        }

        ConfigCommand::Validate => match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => anyhow::bail!("Configuration error: {}", e),
        },
    }

    Ok(())
}

/// Walk a dot-separated key path through the serialized config.
pub fn lookup(config: &Config, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let json = serde_json::to_value(config)?;
    let value = key
        .split('.')
        .try_fold(&json, |acc, part| acc.get(part));
    Ok(value.cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_nested_key() {
        let config = Config::default();
        assert_eq!(
            lookup(&config, "server.port").unwrap(),
            Some(serde_json::json!(8080))
        );
        assert_eq!(
            lookup(&config, "logging.json").unwrap(),
            Some(serde_json::json!(false))
        );
    }

    #[test]
    fn test_lookup_missing_key() {
        let config = Config::default();
        assert!(lookup(&config, "server.nope").unwrap().is_none());
        assert!(lookup(&config, "server.port.deeper").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_rejects_invalid_config() {
        let mut config = Config::default();
        config.server.port = 0;
        let args = ConfigArgs {
            command: ConfigCommand::Validate,
        };
        assert!(run(args, config).await.is_err());
    }

    #[tokio::test]
    async fn test_validate_accepts_defaults() {
        let args = ConfigArgs {
            command: ConfigCommand::Validate,
        };
        assert!(run(args, Config::default()).await.is_ok());
    }
}
