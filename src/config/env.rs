//! Environment variable overrides.
//!
//! Variable names match the ones companion deployments already export
//! (`AI_PROVIDER`, `OLLAMA_MODEL`, ...). Values that fail to parse are skipped.

use std::str::FromStr;
use tracing::warn;

use super::Config;

type EnvResult = std::result::Result<String, std::env::VarError>;

/// Apply environment overrides on top of the file config.
pub fn apply_env_overrides<F>(config: &mut Config, env_fn: F)
where
    F: Fn(&str) -> EnvResult,
{
    let text = |key: &str| env_fn(key).ok().filter(|v| !v.trim().is_empty());

    if let Some(v) = text("AI_PROVIDER") {
        config.ai.provider = v.trim().to_lowercase();
    }
    if let Some(v) = text("OPENAI_API_KEY") {
        config.providers.openai.api_key = v;
    }
    if let Some(v) = text("OPENAI_MODEL") {
        config.providers.openai.model = v;
    }
    if let Some(v) = text("OPENROUTER_API_KEY") {
        config.providers.openrouter.api_key = v;
    }
    if let Some(v) = text("OPENROUTER_MODEL") {
        config.providers.openrouter.model = v;
    }
    if let Some(v) = text("OLLAMA_BASE_URL") {
        config.providers.ollama.endpoint = v;
    }
    if let Some(v) = text("OLLAMA_MODEL") {
        config.providers.ollama.model = v;
    }
    parsed(&env_fn, "AI_TEMPERATURE", &mut config.ai.temperature);
    parsed(&env_fn, "AI_MAX_TOKENS", &mut config.ai.max_tokens);

    if let Some(v) = text("COMPANION_NAME") {
        config.companion.name = v;
    }
    if let Some(v) = text("COMPANION_DEFAULT_PERSONALITY") {
        config.companion.default_personality = v.trim().to_lowercase();
    }
    if let Some(v) = text("COMPANION_USER_ID") {
        config.companion.user_id = v;
    }

    parsed(&env_fn, "MAX_SESSION_MEMORIES", &mut config.memory.max_session_memories);
    parsed(&env_fn, "MEMORY_SEARCH_LIMIT", &mut config.memory.search_limit);
    if let Some(v) = text("MEMORY_EMBED_PROVIDER") {
        config.memory.embedding_provider = v.trim().to_lowercase();
    }
    if let Some(v) = text("MEMORY_EMBED_MODEL") {
        config.memory.embedding_model = v;
    }
    if let Some(v) = text("MEMORY_EMBED_BASE_URL") {
        config.memory.embedding_endpoint = v;
    }

    if let Some(v) = text("UI_THEME") {
        config.ui.theme = v;
    }
    flag(&env_fn, "UI_SHOW_TYPING_ANIMATION", &mut config.ui.show_typing_animation);
    parsed(&env_fn, "UI_ANIMATION_DURATION", &mut config.ui.animation_duration);
    flag(&env_fn, "UI_CLEAR_SCREEN_ON_START", &mut config.ui.clear_screen_on_start);

    if let Some(v) = text("LOG_LEVEL") {
        config.logging.level = v.trim().to_lowercase();
    }
}

fn parsed<F, T>(env_fn: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> EnvResult,
    T: FromStr,
{
    let Ok(raw) = env_fn(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!("Ignoring {}={:?}: not a valid value", key, raw),
    }
}

fn flag<F>(env_fn: &F, key: &str, slot: &mut bool)
where
    F: Fn(&str) -> EnvResult,
{
    let Ok(raw) = env_fn(key) else {
        return;
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => *slot = true,
        "false" | "0" | "no" | "off" => *slot = false,
        _ => warn!("Ignoring {}={:?}: expected true or false", key, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_env(map: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> EnvResult {
        move |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::default();
        let env = HashMap::from([
            ("AI_PROVIDER", "OpenRouter"),
            ("OPENROUTER_API_KEY", "or-key"),
            ("OLLAMA_MODEL", "llama3.2"),
            ("AI_MAX_TOKENS", "800"),
            ("COMPANION_DEFAULT_PERSONALITY", "Playful"),
            ("UI_SHOW_TYPING_ANIMATION", "false"),
            ("MAX_SESSION_MEMORIES", "42"),
        ]);

        apply_env_overrides(&mut config, make_env(env));

        assert_eq!(config.ai.provider, "openrouter");
        assert_eq!(config.providers.openrouter.api_key, "or-key");
        assert_eq!(config.providers.ollama.model, "llama3.2");
        assert_eq!(config.ai.max_tokens, 800);
        assert_eq!(config.companion.default_personality, "playful");
        assert!(!config.ui.show_typing_animation);
        assert_eq!(config.memory.max_session_memories, 42);
    }

    #[test]
    fn unparseable_values_are_ignored() {
        let mut config = Config::default();
        let env = HashMap::from([
            ("AI_TEMPERATURE", "warm"),
            ("UI_CLEAR_SCREEN_ON_START", "maybe"),
            ("COMPANION_NAME", "   "),
        ]);

        apply_env_overrides(&mut config, make_env(env));

        assert!((config.ai.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.ui.clear_screen_on_start);
        assert_eq!(config.companion.name, "AI동반자");
    }
}
