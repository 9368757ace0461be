//! Language-model orchestration: provider selection, fallback chain and
//! degraded offline replies.

mod analysis;
mod error;
mod fallback;
mod providers;
mod router;

pub use analysis::{
    ExtractedPreference, PERSONALITY_PREFERENCE, analyze_sentiment, extract_preferences,
};
pub use error::ProviderError;
pub use fallback::offline_reply;
#[cfg(test)]
pub use providers::MockLLMProvider;
pub use providers::{
    Completion, CompletionRequest, LLMProvider, OLLAMA_DEFAULT_MODELS, OPENAI_MODELS,
    OPENROUTER_MODELS, OllamaProvider, OpenAIProvider, OpenRouterProvider, ProviderKind,
    StreamResult, create_provider,
};
pub use router::{ProviderRouter, RetryPolicy};

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AiConfig, ProvidersConfig};
use crate::conversation::ConversationEntry;

/// One generated reply and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub content: String,
    /// None when the offline fallback answered
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationStats {
    pub total_conversations: u64,
    pub total_tokens_used: u64,
    pub last_conversation: Option<DateTime<Local>>,
    pub provider: String,
    pub model: String,
    pub initialized: bool,
}

pub struct ConversationService {
    ai: AiConfig,
    providers: ProvidersConfig,
    current: ProviderKind,
    router: ProviderRouter,
    initialized: bool,
    stats: ConversationStats,
}

impl ConversationService {
    /// An unknown provider name falls back to Ollama with a warning.
    pub fn new(ai: AiConfig, providers: ProvidersConfig) -> Self {
        let current = ai.provider.parse::<ProviderKind>().unwrap_or_else(|e| {
            warn!("{}; using ollama", e);
            ProviderKind::Ollama
        });
        Self {
            ai,
            providers,
            current,
            router: ProviderRouter::empty(),
            initialized: false,
            stats: ConversationStats::default(),
        }
    }

    /// Service with a ready-made provider chain.
    pub fn with_chain(
        ai: AiConfig,
        providers: ProvidersConfig,
        chain: Vec<Box<dyn LLMProvider>>,
    ) -> Self {
        let mut service = Self::new(ai, providers);
        if let Some(first) = chain.first() {
            service.current = first.kind();
        }
        service.initialized = !chain.is_empty();
        service.router = ProviderRouter::new(chain, RetryPolicy::from_config(&service.ai));
        service
    }

    /// Health-check the primary provider and build the fallback chain.
    ///
    /// Returns whether the primary is ready. Configured fallbacks join the
    /// chain either way.
    pub async fn initialize(&mut self) -> bool {
        let mut chain: Vec<Box<dyn LLMProvider>> = Vec::new();

        match create_provider(self.current, &self.providers, &self.ai) {
            Ok(primary) => match primary.health_check().await {
                Ok(()) => {
                    info!("{} provider ready ({})", self.current, primary.model());
                    chain.push(primary);
                    self.initialized = true;
                }
                Err(e) => {
                    warn!("{} provider unavailable: {}", self.current, e);
                    self.initialized = false;
                }
            },
            Err(e) => {
                warn!("Failed to create {} provider: {:#}", self.current, e);
                self.initialized = false;
            }
        }

        for kind in self.fallback_kinds() {
            match create_provider(kind, &self.providers, &self.ai) {
                Ok(provider) => chain.push(provider),
                Err(e) => warn!("Skipping fallback provider {}: {:#}", kind, e),
            }
        }

        debug!(
            "Provider chain: {:?}",
            chain.iter().map(|p| p.kind()).collect::<Vec<_>>()
        );
        self.router = ProviderRouter::new(chain, RetryPolicy::from_config(&self.ai));
        self.initialized
    }

    /// Configured fallback providers: parsed, deduplicated, primary removed.
    fn fallback_kinds(&self) -> Vec<ProviderKind> {
        let mut kinds = Vec::new();
        for name in &self.ai.fallback_providers {
            match name.parse::<ProviderKind>() {
                Ok(kind) if kind != self.current && !kinds.contains(&kind) => kinds.push(kind),
                Ok(_) => {}
                Err(e) => warn!("Ignoring fallback provider: {}", e),
            }
        }
        kinds
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Answer `user_message`. Never fails: when the whole chain is down the
    /// offline reply is returned with `degraded` set.
    pub async fn generate_response(
        &mut self,
        user_message: &str,
        system_prompt: &str,
        history: &[ConversationEntry],
    ) -> Reply {
        let window = self.ai.history_window;
        let start = history.len().saturating_sub(window);
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            history: history[start..].to_vec(),
            user_message: user_message.to_string(),
            temperature: self.ai.temperature,
            max_tokens: self.ai.max_tokens,
        };

        match self.router.complete(&request).await {
            Ok(completion) => {
                self.stats.total_conversations += 1;
                self.stats.total_tokens_used += completion.tokens_used.unwrap_or(0);
                self.stats.last_conversation = Some(Local::now());
                Reply {
                    content: completion.content,
                    provider: Some(completion.provider),
                    model: Some(completion.model),
                    degraded: false,
                }
            }
            Err(e) => {
                warn!("No provider answered, using offline reply: {}", e);
                Reply {
                    content: offline_reply(user_message),
                    provider: None,
                    model: None,
                    degraded: true,
                }
            }
        }
    }

    /// Stream a reply from the first provider in the chain.
    pub async fn generate_stream(
        &self,
        user_message: &str,
        system_prompt: &str,
    ) -> Result<StreamResult, ProviderError> {
        let Some(provider) = self.router.primary() else {
            return Err(ProviderError::NotConfigured(
                self.current,
                "provider is not initialized".to_string(),
            ));
        };
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            history: Vec::new(),
            user_message: user_message.to_string(),
            temperature: self.ai.temperature,
            max_tokens: self.ai.max_tokens,
        };
        provider.complete_stream(&request).await
    }

    pub fn stats(&self) -> ConversationStats {
        ConversationStats {
            provider: self.current.to_string(),
            model: self.current_model(),
            initialized: self.initialized,
            ..self.stats.clone()
        }
    }

    pub fn reset_stats(&mut self) {
        self.stats = ConversationStats::default();
    }

    /// Switch the primary provider. The service must be initialized again.
    pub fn set_provider(&mut self, name: &str) -> Result<ProviderKind> {
        let kind: ProviderKind = name.parse()?;
        self.current = kind;
        self.ai.provider = kind.to_string();
        self.initialized = false;
        self.router = ProviderRouter::empty();
        info!("AI provider changed to {}", kind);
        Ok(kind)
    }

    /// Change the model of the current provider. OpenAI only accepts its
    /// known models; the others accept any name.
    pub fn set_model(&mut self, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            bail!("Model name is empty");
        }
        if !self.current.accepts_model(model) {
            bail!("{} does not support model '{}'", self.current, model);
        }
        match self.current {
            ProviderKind::OpenAI => self.providers.openai.model = model.to_string(),
            ProviderKind::OpenRouter => self.providers.openrouter.model = model.to_string(),
            ProviderKind::Ollama => self.providers.ollama.model = model.to_string(),
        }
        // Providers hold their model, so the chain is rebuilt on next initialize
        self.initialized = false;
        self.router = ProviderRouter::empty();
        info!("{} model changed to {}", self.current, model);
        Ok(())
    }

    /// Models for the current provider. Ollama is asked for its installed
    /// models; the built-in list is used when that fails.
    pub async fn available_models(&self) -> Vec<String> {
        if self.current == ProviderKind::Ollama {
            match create_provider(self.current, &self.providers, &self.ai) {
                Ok(provider) => match provider.list_models().await {
                    Ok(models) if !models.is_empty() => return models,
                    Ok(_) => debug!("Ollama reported no models"),
                    Err(e) => debug!("Could not list Ollama models: {}", e),
                },
                Err(e) => debug!("Could not create Ollama client: {:#}", e),
            }
        }
        self.current
            .known_models()
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    pub fn available_providers(&self) -> &'static [ProviderKind] {
        &ProviderKind::ALL
    }

    pub fn current_provider(&self) -> ProviderKind {
        self.current
    }

    pub fn current_model(&self) -> String {
        match self.current {
            ProviderKind::OpenAI => self.providers.openai.model.clone(),
            ProviderKind::OpenRouter => self.providers.openrouter.model.clone(),
            ProviderKind::Ollama => self.providers.ollama.model.clone(),
        }
    }

    pub fn chain(&self) -> Vec<ProviderKind> {
        self.router.chain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationEntry;
    use std::sync::{Arc, Mutex};

    fn fast_ai() -> AiConfig {
        AiConfig {
            max_retries: 0,
            retry_base_delay_ms: 0,
            history_window: 2,
            ..AiConfig::default()
        }
    }

    fn answering(kind: ProviderKind, text: &'static str) -> MockLLMProvider {
        let mut mock = MockLLMProvider::new();
        mock.expect_kind().return_const(kind);
        mock.expect_complete().returning(move |_| {
            Ok(Completion {
                content: text.to_string(),
                tokens_used: Some(12),
                provider: kind,
                model: "mock".to_string(),
            })
        });
        mock
    }

    fn failing(kind: ProviderKind) -> MockLLMProvider {
        let mut mock = MockLLMProvider::new();
        mock.expect_kind().return_const(kind);
        mock.expect_complete()
            .returning(move |_| Err(ProviderError::EmptyResponse(kind)));
        mock
    }

    #[tokio::test]
    async fn reply_updates_stats() {
        let mut service = ConversationService::with_chain(
            fast_ai(),
            ProvidersConfig::default(),
            vec![Box::new(answering(ProviderKind::OpenAI, "반가워요"))],
        );

        let reply = service.generate_response("안녕", "sys", &[]).await;
        assert_eq!(reply.content, "반가워요");
        assert_eq!(reply.provider, Some(ProviderKind::OpenAI));
        assert!(!reply.degraded);

        let stats = service.stats();
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.total_tokens_used, 12);
        assert!(stats.last_conversation.is_some());
        assert_eq!(stats.provider, "openai");

        service.reset_stats();
        assert_eq!(service.stats().total_conversations, 0);
    }

    #[tokio::test]
    async fn falls_back_to_secondary_provider() {
        let mut service = ConversationService::with_chain(
            fast_ai(),
            ProvidersConfig::default(),
            vec![
                Box::new(failing(ProviderKind::OpenAI)),
                Box::new(answering(ProviderKind::Ollama, "local answer")),
            ],
        );
        let reply = service.generate_response("hello", "sys", &[]).await;
        assert_eq!(reply.content, "local answer");
        assert_eq!(reply.provider, Some(ProviderKind::Ollama));
    }

    #[tokio::test]
    async fn degraded_reply_when_chain_is_exhausted() {
        let mut service = ConversationService::with_chain(
            fast_ai(),
            ProvidersConfig::default(),
            vec![Box::new(failing(ProviderKind::OpenRouter))],
        );
        let reply = service.generate_response("고마워", "sys", &[]).await;
        assert!(reply.degraded);
        assert_eq!(reply.provider, None);
        assert!(reply.content.starts_with("천만에요"));
        assert_eq!(service.stats().total_conversations, 0);
    }

    #[tokio::test]
    async fn uninitialized_service_replies_offline() {
        let mut service = ConversationService::new(fast_ai(), ProvidersConfig::default());
        assert!(!service.is_initialized());
        let reply = service.generate_response("hi", "sys", &[]).await;
        assert!(reply.degraded);
    }

    #[tokio::test]
    async fn history_is_windowed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();

        let mut mock = MockLLMProvider::new();
        mock.expect_kind().return_const(ProviderKind::Ollama);
        mock.expect_complete().returning(move |req| {
            captured
                .lock()
                .unwrap()
                .extend(req.history.iter().map(|e| e.user_message.clone()));
            Ok(Completion {
                content: "ok".to_string(),
                tokens_used: None,
                provider: ProviderKind::Ollama,
                model: "mock".to_string(),
            })
        });

        let mut service =
            ConversationService::with_chain(fast_ai(), ProvidersConfig::default(), vec![Box::new(mock)]);
        let history: Vec<_> = ["one", "two", "three"]
            .iter()
            .map(|m| ConversationEntry::new(*m, "reply"))
            .collect();
        service.generate_response("four", "sys", &history).await;

        assert_eq!(*seen.lock().unwrap(), vec!["two", "three"]);
    }

    #[test]
    fn provider_and_model_switching() {
        let mut service = ConversationService::with_chain(
            fast_ai(),
            ProvidersConfig::default(),
            vec![Box::new(answering(ProviderKind::Ollama, "x"))],
        );
        assert!(service.is_initialized());

        assert_eq!(service.set_provider("OpenAI").unwrap(), ProviderKind::OpenAI);
        assert!(!service.is_initialized());
        assert!(service.chain().is_empty());
        assert!(service.set_provider("claude").is_err());

        assert!(service.set_model("gpt-4o").is_ok());
        assert_eq!(service.current_model(), "gpt-4o");
        assert!(service.set_model("llama3.2").is_err());

        service.set_provider("openrouter").unwrap();
        assert!(service.set_model("some/new-model").is_ok());
        assert_eq!(service.current_model(), "some/new-model");
    }

    #[test]
    fn fallback_kinds_are_deduplicated() {
        let ai = AiConfig {
            provider: "openai".to_string(),
            fallback_providers: vec![
                "ollama".to_string(),
                "openai".to_string(),
                "bogus".to_string(),
                "Ollama".to_string(),
                "openrouter".to_string(),
            ],
            ..AiConfig::default()
        };
        let service = ConversationService::new(ai, ProvidersConfig::default());
        assert_eq!(
            service.fallback_kinds(),
            vec![ProviderKind::Ollama, ProviderKind::OpenRouter]
        );
    }

    #[tokio::test]
    async fn openai_models_are_the_fixed_list() {
        let mut ai = fast_ai();
        ai.provider = "openai".to_string();
        let service = ConversationService::new(ai, ProvidersConfig::default());
        assert_eq!(service.available_models().await, OPENAI_MODELS);
        assert_eq!(service.available_providers().len(), 3);
    }
}
