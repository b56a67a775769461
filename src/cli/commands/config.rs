//! Implementation of the `cofsync config` command.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Check that the configuration loads and validates
    Validate,
}

#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValidateOutput {
    pub valid: bool,
    pub message: String,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: &ConfigArgs, config: Result<Config>, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = config.context("Failed to load configuration")?;
            output(&ConfigShowOutput { config }, json_mode);
        }
        ConfigCommands::Validate => {
            let result = match config {
                Ok(_) => ConfigValidateOutput {
                    valid: true,
                    message: "Configuration is valid.".to_string(),
                },
                Err(err) => ConfigValidateOutput {
                    valid: false,
                    message: format!("Configuration is invalid: {err:#}"),
                },
            };
            let valid = result.valid;
            output(&result, json_mode);
            if !valid {
                anyhow::bail!("configuration validation failed");
            }
        }
    }
    Ok(())
}
