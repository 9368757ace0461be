use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::{Config, validation_summary, write_template};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (API keys masked)
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Get a configuration value
    Get {
        /// Config key (e.g., ai.provider)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Config key (e.g., ai.provider)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,

    /// Write the default config file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Check the configuration for problems
    Validate,
}

pub async fn run(args: ConfigArgs, config: Config) -> Result<()> {
    match args.command {
        ConfigCommands::Show { format } => show_config(&config, &format),
        ConfigCommands::Get { key } => get_config(&config, &key),
        ConfigCommands::Set { key, value } => set_config(&config, &key, &value),
        ConfigCommands::Path => show_path(&config),
        ConfigCommands::Init { force } => init_config(&config, force),
        ConfigCommands::Validate => validate_config(&config),
    }
}

fn show_config(config: &Config, format: &str) -> Result<()> {
    let redacted = config.redacted();

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&redacted)?;
            println!("{}", json);
        }
        _ => {
            let toml = toml::to_string_pretty(&redacted)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

fn get_config(config: &Config, key: &str) -> Result<()> {
    let value = config.get_value(key)?;
    println!("{}", value);
    Ok(())
}

fn set_config(config: &Config, key: &str, value: &str) -> Result<()> {
    config.persist_value(key, value)?;
    if key.ends_with("api_key") {
        println!("Set {}", key);
    } else {
        println!("Set {} = {}", key, value);
    }
    Ok(())
}

fn show_path(config: &Config) -> Result<()> {
    println!("{}", config.config_file().display());
    Ok(())
}

fn init_config(config: &Config, force: bool) -> Result<()> {
    let path = config.config_file();

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    write_template(&path)?;
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    let checks = config.validate();
    println!("{}", validation_summary(&checks));

    let failed = checks.iter().filter(|c| !c.ok).count();
    if failed > 0 {
        anyhow::bail!("{} check(s) failed", failed);
    }
    println!("\nConfiguration is valid");
    Ok(())
}
