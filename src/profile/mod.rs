//! Per-user profile: name, preferred personality, learned preferences and
//! usage statistics.

mod store;

pub use store::ProfileStore;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::personality::PersonalityType;

const TOP_COMMANDS: usize = 5;

fn default_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub category: String,
    pub value: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,
    #[serde(default = "Local::now")]
    pub updated_at: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub total_conversations: u64,
    /// Seconds
    pub total_session_time: f64,
    pub favorite_personality: Option<PersonalityType>,
    pub most_used_commands: Vec<String>,
    pub command_counts: BTreeMap<String, u64>,
    pub personality_usage: BTreeMap<String, u64>,
    pub last_active: DateTime<Local>,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            total_conversations: 0,
            total_session_time: 0.0,
            favorite_personality: None,
            most_used_commands: Vec::new(),
            command_counts: BTreeMap::new(),
            personality_usage: BTreeMap::new(),
            last_active: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub preferred_personality: PersonalityType,
    /// Keyed by `{category}_{value}`
    #[serde(default)]
    pub preferences: BTreeMap<String, UserPreference>,
    #[serde(default)]
    pub stats: UserStats,
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,
    #[serde(default = "Local::now")]
    pub updated_at: DateTime<Local>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl UserProfile {
    pub fn new(user_id: &str, preferred_personality: PersonalityType) -> Self {
        let now = Local::now();
        Self {
            user_id: user_id.to_string(),
            name: String::new(),
            preferred_personality,
            preferences: BTreeMap::new(),
            stats: UserStats::default(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.trim().to_string();
        self.updated_at = Local::now();
    }

    /// Add a preference, or raise the confidence of an existing one.
    pub fn add_preference(&mut self, category: &str, value: &str, confidence: f32) {
        let now = Local::now();
        let key = format!("{}_{}", category, value);
        self.preferences
            .entry(key)
            .and_modify(|p| {
                p.confidence = p.confidence.max(confidence);
                p.updated_at = now;
            })
            .or_insert_with(|| UserPreference {
                category: category.to_string(),
                value: value.to_string(),
                confidence,
                created_at: now,
                updated_at: now,
            });
        self.updated_at = now;
    }

    pub fn preferences_by_category(&self, category: &str) -> Vec<&UserPreference> {
        self.preferences
            .values()
            .filter(|p| p.category == category)
            .collect()
    }

    /// One value per category, the most recently updated winning, sorted by
    /// category.
    pub fn preference_pairs(&self) -> Vec<(String, String)> {
        let mut latest: BTreeMap<&str, &UserPreference> = BTreeMap::new();
        for pref in self.preferences.values() {
            latest
                .entry(pref.category.as_str())
                .and_modify(|current| {
                    if pref.updated_at > current.updated_at {
                        *current = pref;
                    }
                })
                .or_insert(pref);
        }
        latest
            .into_iter()
            .map(|(category, pref)| (category.to_string(), pref.value.clone()))
            .collect()
    }

    pub fn update_stats(&mut self, conversations: u64, session_time: f64) {
        self.stats.total_conversations += conversations;
        self.stats.total_session_time += session_time;
        self.stats.last_active = Local::now();
        self.updated_at = self.stats.last_active;
    }

    /// Count a chat command and refresh the most-used list.
    pub fn record_command(&mut self, command: &str) {
        *self
            .stats
            .command_counts
            .entry(command.to_string())
            .or_insert(0) += 1;

        let mut ranked: Vec<(&String, &u64)> = self.stats.command_counts.iter().collect();
        // Highest count first, name breaks ties
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        self.stats.most_used_commands = ranked
            .into_iter()
            .take(TOP_COMMANDS)
            .map(|(name, _)| name.clone())
            .collect();
        self.updated_at = Local::now();
    }

    /// Count a turn under `personality` and refresh the favorite.
    pub fn record_personality_use(&mut self, personality: PersonalityType) {
        *self
            .stats
            .personality_usage
            .entry(personality.to_string())
            .or_insert(0) += 1;

        self.stats.favorite_personality = self
            .stats
            .personality_usage
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .and_then(|(name, _)| name.parse().ok());
        self.updated_at = Local::now();
    }
}
