mod env;
mod validate;

pub use env::apply_env_overrides;
pub use validate::{ValidationCheck, validation_summary};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths::Paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG-compliant paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    /// File this config was loaded from (not serialized)
    #[serde(skip)]
    pub source: Option<PathBuf>,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub companion: CompanionConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Primary provider: "ollama" | "openai" | "openrouter"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Past turns sent with each request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Providers tried in order when the primary one fails
    #[serde(default)]
    pub fallback_providers: Vec<String>,

    /// Retries per provider for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Consecutive failures before a provider is skipped
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,

    #[serde(default = "default_circuit_cooldown_secs")]
    pub circuit_cooldown_secs: u64,

    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAIConfig,

    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    #[serde(default = "default_openrouter_model")]
    pub model: String,

    /// Sent as HTTP-Referer for OpenRouter app attribution
    #[serde(default = "default_openrouter_referer")]
    pub referer: String,

    /// Sent as X-Title
    #[serde(default = "default_openrouter_title")]
    pub title: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,

    #[serde(default = "default_ollama_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default = "default_companion_name")]
    pub name: String,

    /// "caring" | "playful" | "intellectual" | "romantic"
    #[serde(default = "default_personality")]
    pub default_personality: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Turns of session history handed to the AI service
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Use the SQLite long-term store (falls back to session-only on failure)
    #[serde(default = "default_true")]
    pub long_term_enabled: bool,

    #[serde(default = "default_max_session_memories")]
    pub max_session_memories: usize,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// How many recent turns session search looks at
    #[serde(default = "default_session_search_window")]
    pub session_search_window: usize,

    /// Embedding provider: "ollama" (default), "openai", or "none"
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Base URL for the embedding provider
    #[serde(default = "default_ollama_endpoint")]
    pub embedding_endpoint: String,

    /// Minimum cosine similarity for vector hits
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_true")]
    pub show_typing_animation: bool,

    /// Typing animation length in seconds
    #[serde(default = "default_animation_duration")]
    pub animation_duration: f32,

    #[serde(default = "default_true")]
    pub clear_screen_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Keep a timestamped copy of the previous profile on every save
    #[serde(default = "default_true")]
    pub backup: bool,

    #[serde(default = "default_backup_count")]
    pub backup_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Days to keep log files (0 = keep forever)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

// Default value functions
fn default_provider() -> String {
    "ollama".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_history_window() -> usize {
    10
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_circuit_failure_threshold() -> u32 {
    3
}
fn default_circuit_cooldown_secs() -> u64 {
    60
}
fn default_health_check_timeout_secs() -> u64 {
    5
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_openrouter_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_openrouter_referer() -> String {
    "https://github.com/terminal-companion".to_string()
}
fn default_openrouter_title() -> String {
    "Terminal AI Companion".to_string()
}
fn default_remote_timeout_secs() -> u64 {
    30
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "gemma3:1b".to_string()
}
fn default_ollama_timeout_secs() -> u64 {
    60
}
fn default_companion_name() -> String {
    "AI동반자".to_string()
}
fn default_personality() -> String {
    "caring".to_string()
}
fn default_user_id() -> String {
    "default_user".to_string()
}
fn default_history_turns() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_max_session_memories() -> usize {
    100
}
fn default_search_limit() -> usize {
    5
}
fn default_session_search_window() -> usize {
    20
}
fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "bge-m3".to_string()
}
fn default_min_similarity() -> f32 {
    0.3
}
fn default_theme() -> String {
    "magenta".to_string()
}
fn default_animation_duration() -> f32 {
    1.0
}
fn default_backup_count() -> usize {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_retention_days() -> u32 {
    30
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            history_window: default_history_window(),
            fallback_providers: Vec::new(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_cooldown_secs: default_circuit_cooldown_secs(),
            health_check_timeout_secs: default_health_check_timeout_secs(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openrouter_base_url(),
            model: default_openrouter_model(),
            referer: default_openrouter_referer(),
            title: default_openrouter_title(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_ollama_model(),
            timeout_secs: default_ollama_timeout_secs(),
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            name: default_companion_name(),
            default_personality: default_personality(),
            user_id: default_user_id(),
            history_turns: default_history_turns(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            long_term_enabled: default_true(),
            max_session_memories: default_max_session_memories(),
            search_limit: default_search_limit(),
            session_search_window: default_session_search_window(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            embedding_endpoint: default_ollama_endpoint(),
            min_similarity: default_min_similarity(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            show_typing_animation: default_true(),
            animation_duration: default_animation_duration(),
            clear_screen_on_start: default_true(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            backup: default_true(),
            backup_count: default_backup_count(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            retention_days: default_retention_days(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load config from `path`, or from the XDG config file when `None`.
    ///
    /// A missing default config file is created from the template. Environment
    /// overrides are applied last.
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let paths = Paths::resolve()?;
        paths.ensure_dirs()?;

        let path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).to_string()),
            None => paths.config_file(),
        };

        let mut config = if path.exists() {
            let mut config = Self::parse_file(&path)?;
            config.paths = paths;
            config
        } else {
            let config = Config {
                paths,
                ..Config::default()
            };
            write_template(&path)?;
            config
        };
        config.source = Some(path);

        config.expand_env_vars();
        apply_env_overrides(&mut config, |key| std::env::var(key));

        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.config_file();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;

        Ok(())
    }

    /// Set `key` in the config file itself. The file is re-read so env
    /// expansion and env overrides never get written back to disk.
    pub fn persist_value(&self, key: &str, value: &str) -> Result<()> {
        let path = self.config_file();
        let mut raw = if path.exists() {
            Self::parse_file(&path)?
        } else {
            Config::default()
        };
        raw.source = Some(path);
        raw.set_value(key, value)?;
        raw.save()
    }

    /// The file this config reads from and saves to.
    pub fn config_file(&self) -> PathBuf {
        self.source
            .clone()
            .unwrap_or_else(|| self.paths.config_file())
    }

    pub fn config_path() -> Result<PathBuf> {
        let paths = Paths::resolve()?;
        Ok(paths.config_file())
    }

    fn expand_env_vars(&mut self) {
        self.providers.openai.api_key = expand_env(&self.providers.openai.api_key);
        self.providers.openrouter.api_key = expand_env(&self.providers.openrouter.api_key);
    }

    /// A copy safe to print: API keys are replaced by a set/unset marker.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.providers.openai.api_key = mask(&self.providers.openai.api_key);
        copy.providers.openrouter.api_key = mask(&self.providers.openrouter.api_key);
        copy
    }

    /// Run every config check, in display order.
    pub fn validate(&self) -> Vec<ValidationCheck> {
        validate::run_checks(self)
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["ai", "provider"] => Ok(self.ai.provider.clone()),
            ["ai", "temperature"] => Ok(self.ai.temperature.to_string()),
            ["ai", "max_tokens"] => Ok(self.ai.max_tokens.to_string()),
            ["ai", "history_window"] => Ok(self.ai.history_window.to_string()),
            ["ai", "fallback_providers"] => Ok(self.ai.fallback_providers.join(",")),
            ["ai", "max_retries"] => Ok(self.ai.max_retries.to_string()),
            ["providers", "openai", "model"] => Ok(self.providers.openai.model.clone()),
            ["providers", "openai", "base_url"] => Ok(self.providers.openai.base_url.clone()),
            ["providers", "openai", "api_key"] => Ok(mask(&self.providers.openai.api_key)),
            ["providers", "openrouter", "model"] => Ok(self.providers.openrouter.model.clone()),
            ["providers", "openrouter", "api_key"] => {
                Ok(mask(&self.providers.openrouter.api_key))
            }
            ["providers", "ollama", "endpoint"] => Ok(self.providers.ollama.endpoint.clone()),
            ["providers", "ollama", "model"] => Ok(self.providers.ollama.model.clone()),
            ["companion", "name"] => Ok(self.companion.name.clone()),
            ["companion", "default_personality"] => Ok(self.companion.default_personality.clone()),
            ["companion", "user_id"] => Ok(self.companion.user_id.clone()),
            ["memory", "long_term_enabled"] => Ok(self.memory.long_term_enabled.to_string()),
            ["memory", "max_session_memories"] => Ok(self.memory.max_session_memories.to_string()),
            ["memory", "search_limit"] => Ok(self.memory.search_limit.to_string()),
            ["memory", "embedding_provider"] => Ok(self.memory.embedding_provider.clone()),
            ["memory", "embedding_model"] => Ok(self.memory.embedding_model.clone()),
            ["ui", "theme"] => Ok(self.ui.theme.clone()),
            ["ui", "show_typing_animation"] => Ok(self.ui.show_typing_animation.to_string()),
            ["ui", "animation_duration"] => Ok(self.ui.animation_duration.to_string()),
            ["ui", "clear_screen_on_start"] => Ok(self.ui.clear_screen_on_start.to_string()),
            ["logging", "level"] => Ok(self.logging.level.clone()),
            ["logging", "retention_days"] => Ok(self.logging.retention_days.to_string()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["ai", "provider"] => self.ai.provider = value.to_string(),
            ["ai", "temperature"] => self.ai.temperature = value.parse()?,
            ["ai", "max_tokens"] => self.ai.max_tokens = value.parse()?,
            ["ai", "history_window"] => self.ai.history_window = value.parse()?,
            ["ai", "fallback_providers"] => {
                self.ai.fallback_providers = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }
            ["ai", "max_retries"] => self.ai.max_retries = value.parse()?,
            ["providers", "openai", "model"] => self.providers.openai.model = value.to_string(),
            ["providers", "openai", "base_url"] => {
                self.providers.openai.base_url = value.to_string()
            }
            ["providers", "openai", "api_key"] => {
                self.providers.openai.api_key = value.to_string()
            }
            ["providers", "openrouter", "model"] => {
                self.providers.openrouter.model = value.to_string()
            }
            ["providers", "openrouter", "api_key"] => {
                self.providers.openrouter.api_key = value.to_string()
            }
            ["providers", "ollama", "endpoint"] => {
                self.providers.ollama.endpoint = value.to_string()
            }
            ["providers", "ollama", "model"] => self.providers.ollama.model = value.to_string(),
            ["companion", "name"] => self.companion.name = value.to_string(),
            ["companion", "default_personality"] => {
                self.companion.default_personality = value.to_string()
            }
            ["companion", "user_id"] => self.companion.user_id = value.to_string(),
            ["memory", "long_term_enabled"] => self.memory.long_term_enabled = value.parse()?,
            ["memory", "max_session_memories"] => {
                self.memory.max_session_memories = value.parse()?
            }
            ["memory", "search_limit"] => self.memory.search_limit = value.parse()?,
            ["memory", "embedding_provider"] => {
                self.memory.embedding_provider = value.to_string()
            }
            ["memory", "embedding_model"] => self.memory.embedding_model = value.to_string(),
            ["ui", "theme"] => self.ui.theme = value.to_string(),
            ["ui", "show_typing_animation"] => self.ui.show_typing_animation = value.parse()?,
            ["ui", "animation_duration"] => self.ui.animation_duration = value.parse()?,
            ["ui", "clear_screen_on_start"] => self.ui.clear_screen_on_start = value.parse()?,
            ["logging", "level"] => self.logging.level = value.to_string(),
            ["logging", "retention_days"] => self.logging.retention_days = value.parse()?,
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        Ok(())
    }
}

/// Write the commented template config to `path`.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    eprintln!("Created default config at {}", path.display());
    Ok(())
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_default()
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_default()
    } else {
        s.to_string()
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "<set>".to_string()
    }
}

/// Default config template with helpful comments (used for first-time setup)
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Companion Configuration
# Auto-created on first run. Edit as needed.
# Environment variables (AI_PROVIDER, OPENAI_API_KEY, OLLAMA_MODEL, ...) override these values.

[ai]
# Primary provider: ollama | openai | openrouter
provider = "ollama"
temperature = 0.7
max_tokens = 500
# Providers tried in order when the primary one fails
# fallback_providers = ["openrouter"]

[providers.ollama]
endpoint = "http://localhost:11434"
model = "gemma3:1b"

# [providers.openai]
# api_key = "${OPENAI_API_KEY}"
# model = "gpt-4o-mini"

# [providers.openrouter]
# api_key = "${OPENROUTER_API_KEY}"
# model = "openai/gpt-4o-mini"

[companion]
name = "AI동반자"
# caring | playful | intellectual | romantic
default_personality = "caring"
user_id = "default_user"

[memory]
long_term_enabled = true
max_session_memories = 100
search_limit = 5
# Embeddings for semantic recall: ollama | openai | none
embedding_provider = "ollama"
embedding_model = "bge-m3"

[ui]
theme = "magenta"
show_typing_animation = true
animation_duration = 1.0
clear_screen_on_start = true

[logging]
level = "info"
retention_days = 30
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.ai.provider, "ollama");
        assert_eq!(config.ai.max_tokens, 500);
        assert_eq!(config.providers.ollama.model, "gemma3:1b");
        assert_eq!(config.companion.default_personality, "caring");
        assert_eq!(config.memory.max_session_memories, 100);
        assert_eq!(config.ui.theme, "magenta");
        assert!(config.ai.fallback_providers.is_empty());
    }

    #[test]
    fn empty_file_uses_section_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.providers.openai.model, "gpt-4o-mini");
        assert_eq!(config.providers.openrouter.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.providers.ollama.timeout_secs, 60);
        assert_eq!(config.memory.session_search_window, 20);
        assert_eq!(config.profile.backup_count, 5);
    }

    #[test]
    fn get_and_set_values() {
        let mut config = Config::default();
        config.set_value("ai.provider", "openrouter").unwrap();
        config.set_value("ai.temperature", "0.3").unwrap();
        config
            .set_value("ai.fallback_providers", "ollama, openai")
            .unwrap();
        config.set_value("ui.show_typing_animation", "false").unwrap();

        assert_eq!(config.get_value("ai.provider").unwrap(), "openrouter");
        assert_eq!(config.get_value("ai.temperature").unwrap(), "0.3");
        assert_eq!(config.ai.fallback_providers, vec!["ollama", "openai"]);
        assert_eq!(config.get_value("ui.show_typing_animation").unwrap(), "false");
    }

    #[test]
    fn unknown_keys_and_bad_values_are_errors() {
        let mut config = Config::default();
        assert!(config.get_value("nope.key").is_err());
        assert!(config.set_value("nope.key", "1").is_err());
        assert!(config.set_value("ai.max_tokens", "lots").is_err());
    }

    #[test]
    fn api_keys_never_print() {
        let mut config = Config::default();
        config.providers.openai.api_key = "sk-secret".to_string();

        assert_eq!(config.get_value("providers.openai.api_key").unwrap(), "<set>");
        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
    }

    #[test]
    fn save_and_reload_roundtrip_through_source() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");

        let mut config = Config {
            source: Some(path.clone()),
            ..Config::default()
        };
        config.companion.name = "Mori".to_string();
        config.save().unwrap();

        let loaded = Config::parse_file(&path).unwrap();
        assert_eq!(loaded.companion.name, "Mori");
    }

    #[test]
    fn persist_value_keeps_env_values_off_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, DEFAULT_CONFIG_TEMPLATE).unwrap();

        let mut config = Config::parse_file(&path).unwrap();
        config.source = Some(path.clone());
        config.expand_env_vars();
        apply_env_overrides(&mut config, |key| match key {
            "OPENAI_API_KEY" => Ok("sk-secret-from-env".to_string()),
            "OLLAMA_MODEL" => Ok("llama3.2".to_string()),
            _ => Err(std::env::VarError::NotPresent),
        });
        assert_eq!(config.providers.openai.api_key, "sk-secret-from-env");

        config.persist_value("ui.theme", "cyan").unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-secret-from-env"));
        assert!(!written.contains("llama3.2"));
        let saved = Config::parse_file(&path).unwrap();
        assert_eq!(saved.ui.theme, "cyan");
        assert_eq!(saved.providers.ollama.model, "gemma3:1b");
    }

    #[test]
    fn persist_value_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let config = Config {
            source: Some(path.clone()),
            ..Config::default()
        };

        config.persist_value("companion.name", "Mori").unwrap();
        assert_eq!(Config::parse_file(&path).unwrap().companion.name, "Mori");
        assert!(config.persist_value("nope.key", "1").is_err());
    }
}
