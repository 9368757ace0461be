//! Turn processing: one user message in, one companion reply out, with the
//! personality, memory and profile updated along the way.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::ai::{
    ConversationService, ConversationStats, ExtractedPreference, ProviderKind, analyze_sentiment,
    extract_preferences,
};
use crate::config::Config;
use crate::conversation::Sentiment;
use crate::memory::{MemoryManager, MemoryStats, create_embedder};
use crate::personality::{
    PersonalityEngine, PersonalityInfo, PersonalityStats, PersonalityType, SystemPromptParams,
    build_system_prompt,
};
use crate::profile::{ProfileStore, UserProfile};

pub const EMPTY_REPLY: &str = "죄송해요, 응답을 생성할 수 없었어요.";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct InitReport {
    pub ai_ready: bool,
    pub long_term_memory: bool,
}

impl InitReport {
    pub fn any_ready(&self) -> bool {
        self.ai_ready || self.long_term_memory
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub sentiment: Sentiment,
    pub preferences: Vec<ExtractedPreference>,
    pub degraded: bool,
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
}

pub struct Companion {
    config: Config,
    ai: ConversationService,
    personality: PersonalityEngine,
    memory: MemoryManager,
    profile: UserProfile,
    store: ProfileStore,
    session_id: String,
    started: Instant,
}

impl Companion {
    /// Load (or create) the user's profile and set up the services. Nothing
    /// talks to the network until [`Companion::initialize`].
    pub fn new(config: Config, user_id: &str) -> Self {
        let store = ProfileStore::for_user(&config.paths, user_id, &config.profile);
        let ai = ConversationService::new(config.ai.clone(), config.providers.clone());
        let memory = MemoryManager::with_store(&config.memory, user_id, None, None);
        Self::with_parts(config, ai, memory, store)
    }

    pub fn with_parts(
        config: Config,
        ai: ConversationService,
        memory: MemoryManager,
        store: ProfileStore,
    ) -> Self {
        let default_personality: PersonalityType = config
            .companion
            .default_personality
            .parse()
            .unwrap_or_default();
        let profile = store.load_or_create(memory.user_id(), default_personality);
        let personality = PersonalityEngine::new(profile.preferred_personality);

        Self {
            config,
            ai,
            personality,
            memory,
            profile,
            store,
            session_id: uuid::Uuid::new_v4().to_string(),
            started: Instant::now(),
        }
    }

    /// Bring up the AI provider chain and long-term memory. Either one being
    /// ready is enough to chat.
    pub async fn initialize(&mut self) -> InitReport {
        let ai_ready = self.ai.initialize().await;

        let user_id = self.profile.user_id.clone();
        let embedder = match create_embedder(&self.config.memory, &self.config.providers.openai) {
            Ok(embedder) => embedder,
            Err(e) => {
                warn!("Embeddings disabled: {:#}", e);
                None
            }
        };
        self.memory = MemoryManager::initialize(
            &self.config.memory,
            &self.config.paths.memory_db(&user_id),
            &user_id,
            embedder,
        );

        let report = InitReport {
            ai_ready,
            long_term_memory: self.memory.long_term_active(),
        };
        if report.any_ready() {
            info!(
                "Companion ready (ai: {}, long-term memory: {})",
                report.ai_ready, report.long_term_memory
            );
        } else {
            warn!("Neither the AI provider nor long-term memory is available");
        }
        report
    }

    pub fn greeting(&self) -> String {
        self.personality.greeting()
    }

    pub fn needs_name(&self) -> bool {
        !self.profile.has_name()
    }

    pub fn set_user_name(&mut self, name: &str) {
        self.profile.set_name(name);
        self.save_profile();
    }

    pub async fn respond(&mut self, user_message: &str) -> TurnOutcome {
        let sentiment = analyze_sentiment(user_message);

        let preferences = extract_preferences(user_message);
        for pref in &preferences {
            self.profile.add_preference(&pref.category, &pref.value, 1.0);
            self.memory.add_user_preference(&pref.category, &pref.value);
        }
        if !preferences.is_empty() {
            debug!("Learned {} preference(s)", preferences.len());
            self.save_profile();
        }

        let recalled = self
            .memory
            .search_memories(user_message, self.config.memory.search_limit)
            .await;
        let history = self
            .memory
            .conversation_history(self.config.companion.history_turns);

        let params = SystemPromptParams::new(self.personality.kind())
            .with_user(
                Some(self.profile.name.as_str()),
                self.personality.interaction_count(),
                self.personality.mood(),
            )
            .with_memories(recalled.entries.into_iter().map(|e| e.content).collect())
            .with_preferences(self.profile.preference_pairs())
            .with_opening_hint(self.personality.contextual_prefix(user_message));
        let system_prompt = build_system_prompt(params);

        let reply = self
            .ai
            .generate_response(user_message, &system_prompt, &history)
            .await;
        let content = if reply.content.trim().is_empty() {
            EMPTY_REPLY.to_string()
        } else {
            reply.content
        };

        let metadata = HashMap::from([
            ("session_id".to_string(), json!(self.session_id)),
            (
                "personality".to_string(),
                json!(self.personality.kind().as_str()),
            ),
        ]);
        self.memory
            .add_conversation(user_message, &content, sentiment, metadata)
            .await;

        self.personality.update_interaction(user_message, sentiment);
        self.profile.update_stats(1, 0.0);
        self.profile.record_personality_use(self.personality.kind());

        TurnOutcome {
            reply: content,
            sentiment,
            preferences,
            degraded: reply.degraded,
            provider: reply.provider,
            model: reply.model,
        }
    }

    pub fn change_personality(&mut self, kind: PersonalityType) {
        self.personality.change(kind);
        self.profile.preferred_personality = kind;
        self.save_profile();
    }

    /// Switch the primary provider and bring the chain back up. Returns
    /// whether the new provider answered its health check.
    pub async fn switch_provider(&mut self, name: &str) -> Result<bool> {
        self.ai.set_provider(name)?;
        Ok(self.ai.initialize().await)
    }

    pub async fn switch_model(&mut self, model: &str) -> Result<bool> {
        self.ai.set_model(model)?;
        Ok(self.ai.initialize().await)
    }

    pub async fn available_models(&self) -> Vec<String> {
        self.ai.available_models().await
    }

    pub fn available_providers(&self) -> &'static [ProviderKind] {
        self.ai.available_providers()
    }

    pub fn current_provider(&self) -> ProviderKind {
        self.ai.current_provider()
    }

    pub fn current_model(&self) -> String {
        self.ai.current_model()
    }

    pub fn personality(&self) -> PersonalityInfo {
        self.personality.info()
    }

    pub fn clear_session_memory(&mut self) {
        self.memory.clear_session_memory();
    }

    pub fn record_command(&mut self, command: &str) {
        self.profile.record_command(command);
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    pub fn personality_stats(&self) -> PersonalityStats {
        self.personality.stats()
    }

    pub fn ai_stats(&self) -> ConversationStats {
        self.ai.stats()
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_duration(&self) -> Duration {
        self.started.elapsed()
    }

    /// Add this session's duration to the profile and save it.
    pub fn finish(&mut self) -> Result<()> {
        let elapsed = self.session_duration().as_secs_f64();
        self.profile.update_stats(0, elapsed);
        self.store.save(&self.profile)?;
        info!(
            "Session {} ended after {:.0}s",
            self.session_id, elapsed
        );
        Ok(())
    }

    fn save_profile(&self) {
        if let Err(e) = self.store.save(&self.profile) {
            warn!("Failed to save profile: {:#}", e);
        }
    }
}
