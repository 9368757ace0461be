pub mod ask;
pub mod chat;
pub mod config;
pub mod memory;
pub mod paths;
pub mod profile;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::ai::ProviderKind;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "companion")]
#[command(author, version, about = "A terminal AI companion with memory and personality")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Defaults to `chat`
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "COMPANION_CONFIG")]
    pub config: Option<String>,

    /// User whose profile and memories to use (default: companion.user_id)
    #[arg(short, long, global = true, env = "COMPANION_USER_ID")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive conversation
    Chat(chat::ChatArgs),

    /// Send a single message
    Ask(ask::AskArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Long-term memory operations
    Memory(memory::MemoryArgs),

    /// User profile operations
    Profile(profile::ProfileArgs),

    /// Show resolved XDG directory paths
    Paths,
}

impl Commands {
    /// Chat and ask log to a file so log lines never mix with replies.
    pub fn logs_to_file(&self) -> bool {
        matches!(self, Commands::Chat(_) | Commands::Ask(_))
    }
}

/// User from `--user`, falling back to the configured one.
pub fn resolve_user(cli_user: Option<&str>, config: &Config) -> String {
    cli_user
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(&config.companion.user_id)
        .to_string()
}

/// Apply `--provider` / `--model` overrides. The model applies to the
/// (possibly overridden) provider.
pub fn apply_ai_overrides(
    config: &mut Config,
    provider: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    if let Some(provider) = provider {
        let kind: ProviderKind = provider.parse()?;
        config.ai.provider = kind.to_string();
    }
    if let Some(model) = model {
        let kind: ProviderKind = config.ai.provider.parse()?;
        config.set_value(&format!("providers.{}.model", kind), model)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_falls_back_to_config() {
        let config = Config::default();
        assert_eq!(resolve_user(None, &config), config.companion.user_id);
        assert_eq!(resolve_user(Some("  "), &config), config.companion.user_id);
        assert_eq!(resolve_user(Some("bob"), &config), "bob");
    }

    #[test]
    fn model_override_follows_provider_override() {
        let mut config = Config::default();
        apply_ai_overrides(&mut config, Some("OpenRouter"), Some("meta-llama/llama-3.1-8b")).unwrap();
        assert_eq!(config.ai.provider, "openrouter");
        assert_eq!(config.providers.openrouter.model, "meta-llama/llama-3.1-8b");

        assert!(apply_ai_overrides(&mut config, Some("claude"), None).is_err());
    }

    #[test]
    fn parses_default_and_global_flags() {
        let cli = Cli::try_parse_from(["companion", "--user", "alice"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.user.as_deref(), Some("alice"));

        let cli = Cli::try_parse_from(["companion", "ask", "안녕", "--format", "json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Ask(_))));
    }
}
