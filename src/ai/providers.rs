use anyhow::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::ProviderError;
use crate::config::{AiConfig, OllamaConfig, OpenAIConfig, OpenRouterConfig, ProvidersConfig};
use crate::conversation::{ConversationEntry, Message};

/// Models the OpenAI provider accepts.
pub const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4", "gpt-3.5-turbo"];

/// Curated OpenRouter catalogue (any model id is still accepted).
pub const OPENROUTER_MODELS: &[&str] = &[
    "openai/gpt-4o-mini",
    "openai/gpt-4o",
    "openai/gpt-4-turbo",
    "anthropic/claude-3-sonnet",
    "anthropic/claude-3-haiku",
    "meta-llama/llama-3.1-8b-instruct",
    "meta-llama/llama-3.1-70b-instruct",
    "google/gemini-pro",
];

/// Shown when the Ollama server cannot list its models.
pub const OLLAMA_DEFAULT_MODELS: &[&str] = &[
    "gemma3:1b",
    "gemma2:2b",
    "llama3.2",
    "llama3.1",
    "mistral",
    "codellama",
    "phi3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    OpenRouter,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Ollama,
        ProviderKind::OpenAI,
        ProviderKind::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI API (API key required)",
            ProviderKind::OpenRouter => "OpenRouter gateway to many hosted models (API key required)",
            ProviderKind::Ollama => "Local models served by Ollama (no API key)",
        }
    }

    /// Built-in model list for this provider.
    pub fn known_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAI => OPENAI_MODELS,
            ProviderKind::OpenRouter => OPENROUTER_MODELS,
            ProviderKind::Ollama => OLLAMA_DEFAULT_MODELS,
        }
    }

    /// OpenAI is restricted to its known models; the others take any id.
    pub fn accepts_model(&self, model: &str) -> bool {
        let model = model.trim();
        if model.is_empty() {
            return false;
        }
        match self {
            ProviderKind::OpenAI => OPENAI_MODELS.contains(&model),
            ProviderKind::OpenRouter | ProviderKind::Ollama => true,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "ollama" => Ok(ProviderKind::Ollama),
            other => anyhow::bail!(
                "Unknown provider '{}' (expected openai, openrouter or ollama)",
                other
            ),
        }
    }
}

/// Everything a provider needs to answer one turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Already windowed, oldest first
    pub history: Vec<ConversationEntry>,
    pub user_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// System message, then past turns as user/assistant pairs, then the new message.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() * 2 + 2);
        messages.push(Message::system(&self.system_prompt));
        for entry in &self.history {
            messages.extend(entry.to_messages());
        }
        messages.push(Message::user(&self.user_message));
        messages
    }

    /// Flattened transcript for completion-style endpoints.
    pub fn transcript(&self) -> String {
        let mut prompt = format!("System: {}\n\n", self.system_prompt);
        for entry in &self.history {
            prompt.push_str(&format!(
                "Human: {}\nAssistant: {}\n\n",
                entry.user_message, entry.assistant_response
            ));
        }
        prompt.push_str(&format!("Human: {}\nAssistant:", self.user_message));
        prompt
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tokens_used: Option<u64>,
    pub provider: ProviderKind,
    pub model: String,
}

pub type StreamResult = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> String;

    /// Cheap readiness probe run before the provider is trusted.
    async fn health_check(&self) -> Result<(), ProviderError>;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;

    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    /// Stream the reply (default: one chunk with the full reply)
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<StreamResult, ProviderError> {
        let completion = self.complete(request).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(completion.content)
        })))
    }
}

/// Build the provider of `kind` from config.
pub fn create_provider(
    kind: ProviderKind,
    providers: &ProvidersConfig,
    ai: &AiConfig,
) -> Result<Box<dyn LLMProvider>> {
    let health_timeout = Duration::from_secs(ai.health_check_timeout_secs);
    match kind {
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(&providers.openai)?)),
        ProviderKind::OpenRouter => Ok(Box::new(OpenRouterProvider::new(&providers.openrouter)?)),
        ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(
            &providers.ollama,
            health_timeout,
        )?)),
    }
}

fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn format_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            json!({
                "role": m.role.as_str(),
                "content": m.content
            })
        })
        .collect()
}

/// POST an OpenAI-compatible chat completion and pull out content and usage.
async fn send_chat_completion(
    kind: ProviderKind,
    request: reqwest::RequestBuilder,
    timeout: Duration,
    model: &str,
) -> Result<Completion, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(kind, timeout, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Http {
            provider: kind,
            status: status.as_u16(),
            body,
        });
    }

    let response_body: Value = response
        .json()
        .await
        .map_err(|e| ProviderError::from_reqwest(kind, timeout, e))?;
    debug!(
        "{} response: {}",
        kind,
        serde_json::to_string(&response_body).unwrap_or_default()
    );

    parse_chat_completion(kind, model, &response_body)
}

fn parse_chat_completion(
    kind: ProviderKind,
    model: &str,
    body: &Value,
) -> Result<Completion, ProviderError> {
    if let Some(error) = body.get("error") {
        let message = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::Api {
            provider: kind,
            message,
        });
    }

    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: kind,
            message: "no choices in response".to_string(),
        })?;

    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .trim()
        .to_string();
    if content.is_empty() {
        return Err(ProviderError::EmptyResponse(kind));
    }

    Ok(Completion {
        content,
        tokens_used: body["usage"]["total_tokens"].as_u64(),
        provider: kind,
        model: body["model"].as_str().unwrap_or(model).to_string(),
    })
}

// OpenAI Provider
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAIProvider {
    pub fn new(config: &OpenAIConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                ProviderKind::OpenAI,
                "OPENAI_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": format_messages(&request.messages()),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "frequency_penalty": 0.1,
            "presence_penalty": 0.1
        });

        debug!("OpenAI request: {} messages", body["messages"].as_array().map_or(0, Vec::len));

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        send_chat_completion(ProviderKind::OpenAI, builder, self.timeout, &self.model).await
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(OPENAI_MODELS.iter().map(|m| m.to_string()).collect())
    }
}

// OpenRouter Provider (OpenAI-compatible gateway)
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    referer: String,
    title: String,
    timeout: Duration,
}

impl OpenRouterProvider {
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                ProviderKind::OpenRouter,
                "OPENROUTER_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": format_messages(&request.messages()),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        debug!("OpenRouter request: model {}", self.model);

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body);

        send_chat_completion(ProviderKind::OpenRouter, builder, self.timeout, &self.model).await
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(OPENROUTER_MODELS.iter().map(|m| m.to_string()).collect())
    }
}

// Ollama Provider (for local models)
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig, health_timeout: Duration) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout,
            health_timeout,
        })
    }

    fn generate_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        json!({
            "model": self.model,
            "prompt": request.transcript(),
            "stream": stream,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens
            }
        })
    }

    async fn tags(&self) -> Result<Value, ProviderError> {
        let kind = ProviderKind::Ollama;
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(kind, self.health_timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: kind,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(kind, self.health_timeout, e))
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.tags().await.map(|_| ())
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let kind = ProviderKind::Ollama;
        let body = self.generate_body(request, false);

        debug!("Ollama request: model {}", self.model);

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(kind, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: kind,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(kind, self.timeout, e))?;

        parse_generate_response(&self.model, &response_body)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let tags = self.tags().await?;
        let models: Vec<String> = tags["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<StreamResult, ProviderError> {
        let kind = ProviderKind::Ollama;
        let body = self.generate_body(request, true);

        debug!("Ollama streaming request: model {}", self.model);

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(kind, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: kind,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        // Ollama streams newline-delimited JSON
        let stream = async_stream::stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            'read: while let Some(chunk) = byte_stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].to_string();
                            buffer = buffer[pos + 1..].to_string();

                            if line.trim().is_empty() {
                                continue;
                            }

                            if let Ok(json) = serde_json::from_str::<Value>(&line) {
                                if let Some(error) = json["error"].as_str() {
                                    yield Err(ProviderError::Api {
                                        provider: kind,
                                        message: error.to_string(),
                                    });
                                    break 'read;
                                }
                                let delta = json["response"].as_str().unwrap_or("");
                                if !delta.is_empty() {
                                    yield Ok(delta.to_string());
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ProviderError::Transport { provider: kind, source: e });
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_generate_response(model: &str, body: &Value) -> Result<Completion, ProviderError> {
    let kind = ProviderKind::Ollama;
    if let Some(error) = body["error"].as_str() {
        return Err(ProviderError::Api {
            provider: kind,
            message: error.to_string(),
        });
    }

    let content = body["response"].as_str().unwrap_or("").trim().to_string();
    if content.is_empty() {
        return Err(ProviderError::EmptyResponse(kind));
    }

    let tokens_used = match (body["prompt_eval_count"].as_u64(), body["eval_count"].as_u64()) {
        (None, None) => None,
        (prompt, eval) => Some(prompt.unwrap_or(0) + eval.unwrap_or(0)),
    };

    Ok(Completion {
        content,
        tokens_used,
        provider: kind,
        model: model.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    fn request_with_history() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "be kind".to_string(),
            history: vec![
                ConversationEntry::new("hello", "hi there"),
                ConversationEntry::new("how are you", "great"),
            ],
            user_message: "tell me a joke".to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!(" ollama ".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!(ProviderKind::OpenRouter.to_string(), "openrouter");
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn model_acceptance_rules() {
        assert!(ProviderKind::OpenAI.accepts_model("gpt-4o"));
        assert!(!ProviderKind::OpenAI.accepts_model("llama3"));
        assert!(ProviderKind::OpenRouter.accepts_model("mistralai/mixtral-8x7b"));
        assert!(ProviderKind::Ollama.accepts_model("qwen2.5:7b"));
        assert!(!ProviderKind::Ollama.accepts_model("  "));
    }

    #[test]
    fn messages_wrap_history_in_order() {
        let messages = request_with_history().messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User
            ]
        );
        assert_eq!(messages[0].content, "be kind");
        assert_eq!(messages.last().unwrap().content, "tell me a joke");
    }

    #[test]
    fn transcript_ends_with_open_assistant_turn() {
        let prompt = request_with_history().transcript();
        assert!(prompt.starts_with("System: be kind\n\n"));
        assert!(prompt.contains("Human: hello\nAssistant: hi there\n\n"));
        assert!(prompt.ends_with("Human: tell me a joke\nAssistant:"));
    }

    #[test]
    fn chat_completion_parsing() {
        let body = json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"role": "assistant", "content": "  안녕하세요!  "}}],
            "usage": {"total_tokens": 42}
        });
        let completion = parse_chat_completion(ProviderKind::OpenAI, "gpt-4o-mini", &body).unwrap();
        assert_eq!(completion.content, "안녕하세요!");
        assert_eq!(completion.tokens_used, Some(42));
        assert_eq!(completion.model, "gpt-4o-mini-2024");

        let error = json!({"error": {"message": "invalid key"}});
        assert!(matches!(
            parse_chat_completion(ProviderKind::OpenRouter, "m", &error),
            Err(ProviderError::Api { message, .. }) if message == "invalid key"
        ));

        let empty = json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(
            parse_chat_completion(ProviderKind::OpenAI, "m", &empty),
            Err(ProviderError::EmptyResponse(_))
        ));

        let no_choices = json!({"choices": []});
        assert!(matches!(
            parse_chat_completion(ProviderKind::OpenAI, "m", &no_choices),
            Err(ProviderError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn generate_response_parsing() {
        let body = json!({"response": "반가워요", "done": true, "prompt_eval_count": 10, "eval_count": 5});
        let completion = parse_generate_response("gemma3:1b", &body).unwrap();
        assert_eq!(completion.content, "반가워요");
        assert_eq!(completion.tokens_used, Some(15));
        assert_eq!(completion.model, "gemma3:1b");

        let no_counts = json!({"response": "ok"});
        assert_eq!(parse_generate_response("m", &no_counts).unwrap().tokens_used, None);

        let error = json!({"error": "model 'x' not found"});
        assert!(parse_generate_response("x", &error).is_err());
    }

    #[tokio::test]
    async fn remote_providers_need_keys() {
        let openai = OpenAIProvider::new(&OpenAIConfig::default()).unwrap();
        assert!(matches!(
            openai.health_check().await,
            Err(ProviderError::NotConfigured(ProviderKind::OpenAI, _))
        ));

        let config = OpenRouterConfig {
            api_key: "or-key".to_string(),
            ..OpenRouterConfig::default()
        };
        let openrouter = OpenRouterProvider::new(&config).unwrap();
        assert!(openrouter.health_check().await.is_ok());
        assert_eq!(openrouter.list_models().await.unwrap().len(), OPENROUTER_MODELS.len());
    }

    #[tokio::test]
    async fn unreachable_ollama_fails_health_check() {
        let config = OllamaConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..OllamaConfig::default()
        };
        let ollama = OllamaProvider::new(&config, Duration::from_secs(1)).unwrap();
        assert!(ollama.health_check().await.is_err());
    }
}
