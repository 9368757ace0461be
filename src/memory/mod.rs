//! Conversation memory: an in-process session buffer plus an optional
//! SQLite long-term store. Long-term failures never reach the caller; the
//! session buffer answers instead.

mod embeddings;
mod session;
mod store;

#[cfg(test)]
pub use embeddings::MockEmbeddingProvider;
pub use embeddings::{
    EmbeddingProvider, OllamaEmbeddingProvider, OpenAIEmbeddingProvider, cosine_similarity,
    create_embedder, normalize_embedding,
};
pub use session::{SessionMemory, format_exchange};
pub use store::LongTermStore;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::conversation::{ConversationEntry, Sentiment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Conversation,
    Preference,
    Fact,
    Emotion,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Conversation => "conversation",
            MemoryType::Preference => "preference",
            MemoryType::Fact => "fact",
            MemoryType::Emotion => "emotion",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "conversation" => Ok(MemoryType::Conversation),
            "preference" => Ok(MemoryType::Preference),
            "fact" => Ok(MemoryType::Fact),
            "emotion" => Ok(MemoryType::Emotion),
            other => anyhow::bail!("Unknown memory type '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub user_id: String,
    pub score: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    LongTerm,
    Session,
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySource::LongTerm => f.write_str("long-term"),
            MemorySource::Session => f.write_str("session"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySearchResult {
    pub entries: Vec<MemoryEntry>,
    pub query: String,
    pub total_count: usize,
    pub search_time: Duration,
    pub source: MemorySource,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub session_memories: usize,
    pub long_term_enabled: bool,
    pub user_id: String,
    pub last_updated: DateTime<Local>,
    pub store_size_kb: u64,
}

pub struct MemoryManager {
    user_id: String,
    config: MemoryConfig,
    session: SessionMemory,
    store: Option<LongTermStore>,
    embedder: Option<Box<dyn EmbeddingProvider>>,
    last_updated: DateTime<Local>,
}

impl MemoryManager {
    /// Open long-term memory at `db_path` when enabled. A store that fails to
    /// open leaves the manager in session-only mode.
    pub fn initialize(
        config: &MemoryConfig,
        db_path: &Path,
        user_id: &str,
        embedder: Option<Box<dyn EmbeddingProvider>>,
    ) -> Self {
        let store = if config.long_term_enabled {
            match LongTermStore::open(db_path) {
                Ok(store) => {
                    info!("Long-term memory ready at {}", db_path.display());
                    Some(store)
                }
                Err(e) => {
                    warn!("Long-term memory unavailable, using session memory only: {:#}", e);
                    None
                }
            }
        } else {
            debug!("Long-term memory disabled");
            None
        };

        Self::with_store(config, user_id, store, embedder)
    }

    pub fn with_store(
        config: &MemoryConfig,
        user_id: &str,
        store: Option<LongTermStore>,
        embedder: Option<Box<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            config: config.clone(),
            session: SessionMemory::new(config.max_session_memories, config.session_search_window),
            store,
            embedder,
            last_updated: Local::now(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Whether the long-term store is open.
    pub fn long_term_active(&self) -> bool {
        self.store.is_some()
    }

    /// Record one exchange. Session memory always gets it; the long-term
    /// store gets it when available, with an embedding when one can be made.
    pub async fn add_conversation(
        &mut self,
        user_message: &str,
        assistant_response: &str,
        sentiment: Sentiment,
        metadata: HashMap<String, Value>,
    ) {
        let entry = ConversationEntry::new(user_message, assistant_response)
            .with_sentiment(sentiment)
            .with_metadata(metadata.clone());
        let content = format_exchange(&entry);
        self.session.push(entry);
        self.last_updated = Local::now();

        let Some(store) = &self.store else {
            return;
        };

        let embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(&content).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    debug!("Embedding failed, storing without vector: {:#}", e);
                    None
                }
            },
            None => None,
        };

        let mut metadata = metadata;
        metadata.insert("type".to_string(), json!("conversation"));
        metadata.insert("sentiment".to_string(), json!(sentiment.to_string()));

        if let Err(e) = store.add(
            &self.user_id,
            &content,
            MemoryType::Conversation,
            &metadata,
            embedding.as_deref(),
        ) {
            warn!("Failed to store conversation in long-term memory: {:#}", e);
        }
    }

    /// Search long-term memory (vector first, then text) and fall back to the
    /// session buffer on error or when nothing was found.
    pub async fn search_memories(&self, query: &str, limit: usize) -> MemorySearchResult {
        let start = Instant::now();

        if let Some(store) = &self.store {
            match self.search_long_term(store, query, limit).await {
                Ok(entries) if !entries.is_empty() => {
                    return MemorySearchResult {
                        total_count: entries.len(),
                        entries,
                        query: query.to_string(),
                        search_time: start.elapsed(),
                        source: MemorySource::LongTerm,
                    };
                }
                Ok(_) => debug!("No long-term memories for '{}', checking session", query),
                Err(e) => warn!("Long-term search failed, using session memory: {:#}", e),
            }
        }

        let entries = self.session.search(query, &self.user_id, limit);
        MemorySearchResult {
            total_count: entries.len(),
            entries,
            query: query.to_string(),
            search_time: start.elapsed(),
            source: MemorySource::Session,
        }
    }

    async fn search_long_term(
        &self,
        store: &LongTermStore,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        if let Some(embedder) = &self.embedder {
            match embedder.embed(query).await {
                Ok(vector) => {
                    let hits =
                        store.search_vector(&self.user_id, &vector, limit, self.config.min_similarity)?;
                    if !hits.is_empty() {
                        return Ok(hits);
                    }
                }
                Err(e) => debug!("Query embedding failed, using text search: {:#}", e),
            }
        }
        store.search_text(&self.user_id, query, limit)
    }

    /// Store a preference in long-term memory. False when long-term memory is
    /// off or the write failed.
    pub fn add_user_preference(&mut self, category: &str, value: &str) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        let content = format!("사용자 선호도: {} = {}", category, value);
        let metadata = HashMap::from([
            ("type".to_string(), json!("preference")),
            ("category".to_string(), json!(category)),
        ]);

        match store.add(&self.user_id, &content, MemoryType::Preference, &metadata, None) {
            Ok(_) => {
                self.last_updated = Local::now();
                true
            }
            Err(e) => {
                warn!("Failed to store preference: {:#}", e);
                false
            }
        }
    }

    pub fn user_preferences(&self) -> Vec<MemoryEntry> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        store
            .list_by_type(&self.user_id, MemoryType::Preference, 100)
            .unwrap_or_else(|e| {
                warn!("Failed to read preferences: {:#}", e);
                Vec::new()
            })
    }

    /// Last `limit` exchanges of this session, oldest first.
    pub fn conversation_history(&self, limit: usize) -> Vec<ConversationEntry> {
        self.session.recent(limit)
    }

    pub fn clear_session_memory(&mut self) {
        self.session.clear();
        info!("Session memory cleared");
    }

    pub fn recent_long_term(&self, limit: usize) -> Result<Vec<MemoryEntry>> {
        match &self.store {
            Some(store) => store.recent(&self.user_id, limit),
            None => Ok(Vec::new()),
        }
    }

    /// Remove this user's long-term memories.
    pub fn clear_long_term(&mut self) -> Result<usize> {
        match &self.store {
            Some(store) => {
                let removed = store.clear_user(&self.user_id)?;
                info!("Cleared {} long-term memories", removed);
                Ok(removed)
            }
            None => Ok(0),
        }
    }

    pub fn stats(&self) -> MemoryStats {
        let session_memories = self.session.len();
        let (total_memories, store_size_kb, last_updated) = match &self.store {
            Some(store) => {
                let total = store.count(&self.user_id).unwrap_or(0);
                let size = store.size_bytes().unwrap_or(0) / 1024;
                let last = store
                    .last_updated(&self.user_id)
                    .ok()
                    .flatten()
                    .map(|t| t.with_timezone(&Local))
                    .map_or(self.last_updated, |t| t.max(self.last_updated));
                (total, size, last)
            }
            None => (session_memories, 0, self.last_updated),
        };

        MemoryStats {
            total_memories,
            session_memories,
            long_term_enabled: self.store.is_some(),
            user_id: self.user_id.clone(),
            last_updated,
            store_size_kb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> MemoryConfig {
        MemoryConfig {
            max_session_memories: 10,
            session_search_window: 20,
            ..MemoryConfig::default()
        }
    }

    fn manager(temp: &TempDir, embedder: Option<Box<dyn EmbeddingProvider>>) -> MemoryManager {
        MemoryManager::initialize(&config(), &temp.path().join("mem.sqlite"), "alice", embedder)
    }

    #[tokio::test]
    async fn session_only_when_disabled() {
        let temp = TempDir::new().unwrap();
        let cfg = MemoryConfig {
            long_term_enabled: false,
            ..config()
        };
        let mut memory = MemoryManager::initialize(&cfg, &temp.path().join("m.sqlite"), "alice", None);
        assert!(!memory.long_term_active());
        assert!(!temp.path().join("m.sqlite").exists());

        memory
            .add_conversation("피자 먹었어", "맛있었겠다", Sentiment::Positive, HashMap::new())
            .await;
        let result = memory.search_memories("피자", 5).await;
        assert_eq!(result.source, MemorySource::Session);
        assert_eq!(result.total_count, 1);

        assert!(!memory.add_user_preference("음식_피자", "좋아함"));
        assert!(memory.user_preferences().is_empty());
        assert_eq!(memory.stats().total_memories, 1);
    }

    #[tokio::test]
    async fn unopenable_store_falls_back_to_session() {
        let temp = TempDir::new().unwrap();
        // A directory where the database file should be
        let db_path = temp.path().join("taken");
        std::fs::create_dir_all(&db_path).unwrap();

        let memory = MemoryManager::initialize(&config(), &db_path, "alice", None);
        assert!(!memory.long_term_active());
        assert!(!memory.stats().long_term_enabled);
    }

    #[tokio::test]
    async fn long_term_text_search() {
        let temp = TempDir::new().unwrap();
        let mut memory = manager(&temp, None);
        assert!(memory.long_term_active());

        memory
            .add_conversation("주말에 등산을 다녀왔어", "멋지네요!", Sentiment::Positive, HashMap::new())
            .await;
        memory.clear_session_memory();

        let result = memory.search_memories("등산을", 5).await;
        assert_eq!(result.source, MemorySource::LongTerm);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].metadata["type"], "conversation");
        assert_eq!(result.entries[0].metadata["sentiment"], "positive");
    }

    #[tokio::test]
    async fn empty_long_term_result_checks_session() {
        let temp = TempDir::new().unwrap();
        let mut memory = manager(&temp, None);
        memory
            .add_conversation("hello", "hi", Sentiment::Neutral, HashMap::new())
            .await;

        // Nothing matches in either place; the session buffer reports the miss
        let result = memory.search_memories("zzz", 5).await;
        assert_eq!(result.source, MemorySource::Session);
        assert!(result.entries.is_empty());
    }

    #[tokio::test]
    async fn vector_search_uses_embedder() {
        let temp = TempDir::new().unwrap();
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|text| Ok(if text.contains("고양이") { vec![1.0, 0.0] } else { vec![0.0, 1.0] }));

        let mut memory = manager(&temp, Some(Box::new(embedder)));
        memory
            .add_conversation("고양이를 키워", "귀엽겠어요", Sentiment::Neutral, HashMap::new())
            .await;
        memory
            .add_conversation("출근했어", "수고 많아요", Sentiment::Neutral, HashMap::new())
            .await;

        let result = memory.search_memories("우리 고양이", 5).await;
        assert_eq!(result.source, MemorySource::LongTerm);
        assert_eq!(result.entries.len(), 1);
        assert!(result.entries[0].content.contains("고양이"));
        assert_eq!(result.entries[0].score, Some(1.0));
    }

    #[tokio::test]
    async fn failing_embedder_still_stores_text() {
        let temp = TempDir::new().unwrap();
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let mut memory = manager(&temp, Some(Box::new(embedder)));
        memory
            .add_conversation("기억해줘 비밀번호 아님", "알겠어요", Sentiment::Neutral, HashMap::new())
            .await;
        memory.clear_session_memory();

        let result = memory.search_memories("기억해줘", 5).await;
        assert_eq!(result.source, MemorySource::LongTerm);
        assert_eq!(result.total_count, 1);
    }

    #[tokio::test]
    async fn preferences_and_housekeeping() {
        let temp = TempDir::new().unwrap();
        let mut memory = manager(&temp, None);

        assert!(memory.add_user_preference("음식_피자", "좋아함"));
        assert!(memory.add_user_preference("음식_피자", "좋아함"));
        let prefs = memory.user_preferences();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].content, "사용자 선호도: 음식_피자 = 좋아함");
        assert_eq!(prefs[0].metadata["category"], "음식_피자");

        for i in 0..3 {
            memory
                .add_conversation(&format!("q{}", i), "a", Sentiment::Neutral, HashMap::new())
                .await;
        }
        let history = memory.conversation_history(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].user_message, "q2");

        let stats = memory.stats();
        assert_eq!(stats.total_memories, 4);
        assert_eq!(stats.session_memories, 3);
        assert!(stats.long_term_enabled);
        assert_eq!(stats.user_id, "alice");

        assert_eq!(memory.recent_long_term(10).unwrap().len(), 4);
        assert_eq!(memory.clear_long_term().unwrap(), 4);
        assert_eq!(memory.stats().total_memories, 0);
    }
}
