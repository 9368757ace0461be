//! Embedding providers for semantic memory recall
//!
//! Ollama's `/api/embeddings` endpoint (local, default) and the OpenAI
//! embeddings API. Vectors are normalized so cosine similarity is a dot product.

use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{MemoryConfig, OpenAIConfig};

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider id ("ollama", "openai")
    fn id(&self) -> String;

    fn model(&self) -> String;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the embedder named by `memory.embedding_provider`; "none" disables it.
pub fn create_embedder(
    memory: &MemoryConfig,
    openai: &OpenAIConfig,
) -> Result<Option<Box<dyn EmbeddingProvider>>> {
    match memory.embedding_provider.trim().to_lowercase().as_str() {
        "none" | "" => Ok(None),
        "ollama" => Ok(Some(Box::new(OllamaEmbeddingProvider::new(
            &memory.embedding_endpoint,
            &memory.embedding_model,
        )?))),
        "openai" => {
            if openai.api_key.is_empty() {
                bail!("OpenAI embeddings need providers.openai.api_key");
            }
            Ok(Some(Box::new(OpenAIEmbeddingProvider::new(
                &openai.api_key,
                &openai.base_url,
                &memory.embedding_model,
            )?)))
        }
        other => bail!(
            "Unknown embedding provider '{}' (expected ollama, openai or none)",
            other
        ),
    }
}

pub struct OllamaEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    pub fn new(endpoint: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(EMBED_TIMEOUT).build()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn id(&self) -> String {
        "ollama".to_string()
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding {} chars with ollama/{}", text.len(), self.model);

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.endpoint))
            .json(&OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Ollama embeddings error {}: {}", status, body);
        }

        let response: OllamaEmbeddingResponse = response.json().await?;
        if response.embedding.is_empty() {
            bail!("Ollama returned an empty embedding");
        }
        Ok(normalize_embedding(response.embedding))
    }
}

pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIEmbeddingProvider {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(EMBED_TIMEOUT).build()?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn id(&self) -> String {
        "openai".to_string()
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding {} chars with openai/{}", text.len(), self.model);

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&OpenAIEmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("OpenAI embeddings error {}: {}", status, body);
        }

        let response: OpenAIEmbeddingResponse = response.json().await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| normalize_embedding(d.embedding))
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

/// Scale to unit length; zero vectors are left alone.
pub fn normalize_embedding(mut vec: Vec<f32>) -> Vec<f32> {
    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 1e-10 {
        for x in &mut vec {
            *x /= magnitude;
        }
    }
    vec
}

/// Cosine similarity of two unit vectors. Mismatched lengths score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn serialize_embedding(embedding: &[f32]) -> String {
    serde_json::to_string(embedding).unwrap_or_else(|_| "[]".to_string())
}

pub fn deserialize_embedding(json: &str) -> Vec<f32> {
    serde_json::from_str(json).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_to_unit_length() {
        let normalized = normalize_embedding(vec![3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize_embedding(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn cosine_of_unit_vectors() {
        let a = [1.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn stored_embeddings_parse_back() {
        let embedding = vec![0.1, 0.2, 0.3];
        assert_eq!(deserialize_embedding(&serialize_embedding(&embedding)), embedding);
        assert!(deserialize_embedding("not json").is_empty());
    }

    #[test]
    fn embedder_selection() {
        let mut memory = MemoryConfig::default();
        let openai = OpenAIConfig::default();

        let embedder = create_embedder(&memory, &openai).unwrap().unwrap();
        assert_eq!(embedder.id(), "ollama");
        assert_eq!(embedder.model(), "bge-m3");

        memory.embedding_provider = "none".to_string();
        assert!(create_embedder(&memory, &openai).unwrap().is_none());

        memory.embedding_provider = "openai".to_string();
        assert!(create_embedder(&memory, &openai).is_err());

        memory.embedding_provider = "word2vec".to_string();
        assert!(create_embedder(&memory, &openai).is_err());
    }
}
