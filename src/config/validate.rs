use std::fs;
use std::str::FromStr;
use std::time::Duration;

use super::Config;
use crate::ai::ProviderKind;
use crate::personality::PersonalityType;

/// Outcome of one named config check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationCheck {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl ValidationCheck {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }
}

pub(super) fn run_checks(config: &Config) -> Vec<ValidationCheck> {
    let provider = ProviderKind::from_str(&config.ai.provider);

    let api_key = match provider {
        Ok(ProviderKind::Ollama) => ValidationCheck::new("api_key", true, "not required for ollama"),
        Ok(ProviderKind::OpenAI) => key_check(&config.providers.openai.api_key, "OPENAI_API_KEY"),
        Ok(ProviderKind::OpenRouter) => {
            key_check(&config.providers.openrouter.api_key, "OPENROUTER_API_KEY")
        }
        Err(_) => ValidationCheck::new("api_key", false, "unknown provider"),
    };

    let personality = match PersonalityType::from_str(&config.companion.default_personality) {
        Ok(p) => ValidationCheck::new("personality", true, p.to_string()),
        Err(e) => ValidationCheck::new("personality", false, e.to_string()),
    };

    let ai_provider = match &provider {
        Ok(p) => ValidationCheck::new("ai_provider", true, p.to_string()),
        Err(e) => ValidationCheck::new("ai_provider", false, e.to_string()),
    };

    let bad_fallbacks: Vec<&str> = config
        .ai
        .fallback_providers
        .iter()
        .filter(|name| ProviderKind::from_str(name).is_err())
        .map(String::as_str)
        .collect();
    let fallback_providers = if bad_fallbacks.is_empty() {
        ValidationCheck::new(
            "fallback_providers",
            true,
            if config.ai.fallback_providers.is_empty() {
                "none".to_string()
            } else {
                config.ai.fallback_providers.join(", ")
            },
        )
    } else {
        ValidationCheck::new(
            "fallback_providers",
            false,
            format!("unknown: {}", bad_fallbacks.join(", ")),
        )
    };

    let logs_dir = config.paths.logs_dir();
    let log_directory = ValidationCheck::new(
        "log_directory",
        logs_dir.is_dir() || fs::create_dir_all(&logs_dir).is_ok(),
        logs_dir.display().to_string(),
    );

    let temperature = ValidationCheck::new(
        "temperature",
        (0.0..=2.0).contains(&config.ai.temperature),
        config.ai.temperature.to_string(),
    );

    let animation_duration = ValidationCheck::new(
        "animation_duration",
        Duration::try_from_secs_f32(config.ui.animation_duration).is_ok(),
        config.ui.animation_duration.to_string(),
    );

    vec![
        api_key,
        personality,
        ai_provider,
        fallback_providers,
        log_directory,
        temperature,
        animation_duration,
    ]
}

fn key_check(key: &str, var: &str) -> ValidationCheck {
    if key.trim().is_empty() {
        ValidationCheck::new("api_key", false, format!("set {}", var))
    } else {
        ValidationCheck::new("api_key", true, "set")
    }
}

/// One line per check, marked with ✅ or ❌.
pub fn validation_summary(checks: &[ValidationCheck]) -> String {
    checks
        .iter()
        .map(|c| {
            format!(
                "{} {}: {}",
                if c.ok { "✅" } else { "❌" },
                c.name,
                c.detail
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
