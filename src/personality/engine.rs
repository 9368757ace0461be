use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info};

use super::{PersonalityType, traits_for};
use crate::conversation::Sentiment;
use crate::text::{mentions_any, pick};

const CONTEXT_CAPACITY: usize = 10;
const INITIAL_MOOD: f32 = 0.8;
const MIN_MOOD: f32 = 0.2;
const MAX_MOOD: f32 = 1.0;

const SAD: &[&str] = &["슬프", "우울", "힘들", "괴로", "sad"];
const HAPPY: &[&str] = &["기쁘", "행복", "좋", "성공", "happy"];
const CURIOUS: &[&str] = &["질문", "궁금", "알고싶", "설명"];

#[derive(Debug, Clone, Serialize)]
pub struct InteractionContext {
    pub message: String,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalityInfo {
    pub kind: PersonalityType,
    pub name: &'static str,
    pub description: &'static str,
    pub response_style: &'static str,
}

impl PersonalityInfo {
    pub fn of(kind: PersonalityType) -> Self {
        let traits = traits_for(kind);
        Self {
            kind,
            name: traits.name,
            description: traits.description,
            response_style: traits.response_style,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalityStats {
    pub current: PersonalityType,
    pub name: &'static str,
    pub mood: f32,
    pub interaction_count: u64,
    pub context_size: usize,
}

/// Current persona plus the mood it drifts into over a conversation.
#[derive(Debug)]
pub struct PersonalityEngine {
    kind: PersonalityType,
    mood: f32,
    interaction_count: u64,
    context: VecDeque<InteractionContext>,
}

impl PersonalityEngine {
    pub fn new(kind: PersonalityType) -> Self {
        Self {
            kind,
            mood: INITIAL_MOOD,
            interaction_count: 0,
            context: VecDeque::with_capacity(CONTEXT_CAPACITY),
        }
    }

    pub fn kind(&self) -> PersonalityType {
        self.kind
    }

    pub fn mood(&self) -> f32 {
        self.mood
    }

    pub fn interaction_count(&self) -> u64 {
        self.interaction_count
    }

    pub fn info(&self) -> PersonalityInfo {
        PersonalityInfo::of(self.kind)
    }

    pub fn greeting(&self) -> String {
        let greeting = pick(traits_for(self.kind).greetings);
        debug!("Greeting: {}", greeting);
        greeting.to_string()
    }

    /// A short opener matching the mood of `message`, or "" when nothing fits.
    pub fn contextual_prefix(&self, message: &str) -> String {
        let lower = message.to_lowercase();
        let traits = traits_for(self.kind);

        let prefix = if mentions_any(&lower, SAD) {
            match self.kind {
                PersonalityType::Caring => pick(traits.primary_phrases),
                PersonalityType::Playful => {
                    "아, 기분이 안 좋으시군요. 제가 기분 좋아지게 해드릴게요!"
                }
                PersonalityType::Romantic => "마음이 아프시군요. 제가 위로해드릴게요 💕",
                PersonalityType::Intellectual => "",
            }
        } else if mentions_any(&lower, HAPPY) {
            match self.kind {
                PersonalityType::Caring => pick(traits.secondary_phrases),
                PersonalityType::Playful | PersonalityType::Romantic => {
                    pick(traits.primary_phrases)
                }
                PersonalityType::Intellectual => "",
            }
        } else if mentions_any(&lower, CURIOUS) && self.kind == PersonalityType::Intellectual {
            pick(traits.primary_phrases)
        } else {
            ""
        };

        prefix.to_string()
    }

    /// Record one user turn and let the mood follow its sentiment.
    pub fn update_interaction(&mut self, message: &str, sentiment: Sentiment) {
        self.interaction_count += 1;
        if self.context.len() == CONTEXT_CAPACITY {
            self.context.pop_front();
        }
        self.context.push_back(InteractionContext {
            message: message.to_string(),
            sentiment,
            timestamp: Local::now(),
        });

        match sentiment {
            Sentiment::Positive => self.mood = (self.mood + 0.1).min(MAX_MOOD),
            Sentiment::Negative => self.mood = (self.mood - 0.05).max(MIN_MOOD),
            Sentiment::Neutral => {}
        }
        debug!("Interaction recorded: sentiment={}, mood={:.2}", sentiment, self.mood);
    }

    pub fn change(&mut self, kind: PersonalityType) {
        if kind != self.kind {
            info!("Personality changed from {} to {}", self.kind, kind);
        }
        self.kind = kind;
    }

    pub fn available() -> Vec<PersonalityInfo> {
        PersonalityType::ALL.into_iter().map(PersonalityInfo::of).collect()
    }

    pub fn context(&self) -> impl Iterator<Item = &InteractionContext> {
        self.context.iter()
    }

    pub fn stats(&self) -> PersonalityStats {
        PersonalityStats {
            current: self.kind,
            name: traits_for(self.kind).name,
            mood: self.mood,
            interaction_count: self.interaction_count,
            context_size: self.context.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_is_clamped() {
        let mut engine = PersonalityEngine::new(PersonalityType::Caring);
        for _ in 0..5 {
            engine.update_interaction("좋아", Sentiment::Positive);
        }
        assert!((engine.mood() - 1.0).abs() < f32::EPSILON);

        for _ in 0..30 {
            engine.update_interaction("우울해", Sentiment::Negative);
        }
        assert!((engine.mood() - 0.2).abs() < 1e-6);

        engine.update_interaction("그냥", Sentiment::Neutral);
        assert!((engine.mood() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn context_keeps_last_ten() {
        let mut engine = PersonalityEngine::new(PersonalityType::Playful);
        for i in 0..15 {
            engine.update_interaction(&format!("msg {}", i), Sentiment::Neutral);
        }
        let stats = engine.stats();
        assert_eq!(stats.interaction_count, 15);
        assert_eq!(stats.context_size, 10);
        assert_eq!(engine.context().next().unwrap().message, "msg 5");
    }

    #[test]
    fn prefix_follows_personality() {
        let caring = PersonalityEngine::new(PersonalityType::Caring);
        let traits = traits_for(PersonalityType::Caring);
        assert!(traits.primary_phrases.contains(&caring.contextual_prefix("너무 슬프다").as_str()));
        assert!(traits.secondary_phrases.contains(&caring.contextual_prefix("시험 성공!").as_str()));
        assert_eq!(caring.contextual_prefix("궁금한 게 있어"), "");

        let playful = PersonalityEngine::new(PersonalityType::Playful);
        assert!(playful.contextual_prefix("힘들어").starts_with("아, 기분이 안 좋으시군요"));

        let sage = PersonalityEngine::new(PersonalityType::Intellectual);
        assert_eq!(sage.contextual_prefix("우울해"), "");
        let analytical = traits_for(PersonalityType::Intellectual).primary_phrases;
        assert!(analytical.contains(&sage.contextual_prefix("설명해줘").as_str()));
        assert_eq!(sage.contextual_prefix("오늘 날씨"), "");
    }

    #[test]
    fn change_and_list() {
        let mut engine = PersonalityEngine::new(PersonalityType::Caring);
        engine.change(PersonalityType::Romantic);
        assert_eq!(engine.info().name, "로맨틱");
        assert_eq!(PersonalityEngine::available().len(), 4);
        assert!(traits_for(PersonalityType::Romantic)
            .greetings
            .contains(&engine.greeting().as_str()));
    }
}
