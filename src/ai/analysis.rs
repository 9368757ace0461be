//! Keyword sentiment and preference extraction.

use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

use crate::conversation::Sentiment;
use crate::text::{count_mentions, mentions, mentions_any};

const POSITIVE: &[&str] = &[
    "기쁘", "행복", "좋", "사랑", "고마워", "완벽", "최고", "성공", "축하", "happy", "love",
    "great", "thanks", "awesome",
];
const NEGATIVE: &[&str] = &[
    "슬프", "우울", "힘들", "괴로", "화나", "짜증", "실망", "걱정", "두렵", "sad", "angry",
    "upset", "worried", "afraid",
];

const FOOD_TRIGGERS: &[&str] = &["좋아", "싫어", "선호"];
const FOODS: &[&str] = &["피자", "치킨", "한식", "중식", "일식", "양식"];
const ACTIVITY_TRIGGERS: &[&str] = &["좋아", "취미", "관심"];
const ACTIVITIES: &[&str] = &["영화", "음악", "독서", "운동", "게임", "여행", "요리"];

const PERSONALITY_HINTS: &[(&str, &str)] = &[
    ("재미있", "playful"),
    ("장난", "playful"),
    ("유머", "playful"),
    ("따뜻", "caring"),
    ("돌봄", "caring"),
    ("지적", "intellectual"),
    ("똑똑", "intellectual"),
    ("로맨틱", "romantic"),
    ("사랑", "romantic"),
];

/// Category under which a personality hint is stored.
pub const PERSONALITY_PREFERENCE: &str = "선호_성격";

/// A preference found in a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedPreference {
    pub category: String,
    pub value: String,
}

impl ExtractedPreference {
    fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

pub fn analyze_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = count_mentions(&lower, POSITIVE);
    let negative = count_mentions(&lower, NEGATIVE);

    match positive.cmp(&negative) {
        Ordering::Greater => Sentiment::Positive,
        Ordering::Less => Sentiment::Negative,
        Ordering::Equal => Sentiment::Neutral,
    }
}

/// Food likes/dislikes, activity interests and a preferred personality.
/// Categories are unique in the result.
pub fn extract_preferences(text: &str) -> Vec<ExtractedPreference> {
    let lower = text.to_lowercase();
    let mut found = Vec::new();

    if mentions_any(&lower, FOOD_TRIGGERS) {
        let verdict = if mentions(&lower, "좋아") {
            Some("좋아함")
        } else if mentions(&lower, "싫어") {
            Some("싫어함")
        } else {
            None
        };
        if let Some(verdict) = verdict {
            for food in FOODS.iter().filter(|f| mentions(&lower, f)) {
                found.push(ExtractedPreference::new(format!("음식_{}", food), verdict));
            }
        }
    }

    if mentions_any(&lower, ACTIVITY_TRIGGERS) {
        for activity in ACTIVITIES.iter().filter(|a| mentions(&lower, a)) {
            found.push(ExtractedPreference::new(
                format!("활동_{}", activity),
                "관심있음",
            ));
        }
    }

    let hinted = PERSONALITY_HINTS
        .iter()
        .filter(|(hint, _)| mentions(&lower, hint))
        .map(|(_, personality)| *personality)
        .last();
    if let Some(personality) = hinted {
        found.push(ExtractedPreference::new(PERSONALITY_PREFERENCE, personality));
    }

    if !found.is_empty() {
        debug!("Extracted preferences: {:?}", found);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(prefs: &[ExtractedPreference]) -> Vec<&str> {
        prefs.iter().map(|p| p.category.as_str()).collect()
    }

    #[test]
    fn sentiment_by_majority() {
        assert_eq!(analyze_sentiment("오늘 정말 행복하고 기쁘다"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("너무 우울하고 걱정돼"), Sentiment::Negative);
        assert_eq!(analyze_sentiment("행복한데 걱정도 돼"), Sentiment::Neutral);
        assert_eq!(analyze_sentiment("그냥 그래"), Sentiment::Neutral);
        assert_eq!(analyze_sentiment("I am SAD"), Sentiment::Negative);
    }

    #[test]
    fn food_likes_and_dislikes() {
        let prefs = extract_preferences("나는 피자랑 치킨 좋아해");
        assert_eq!(categories(&prefs), vec!["음식_피자", "음식_치킨"]);
        assert!(prefs.iter().all(|p| p.value == "좋아함"));

        let prefs = extract_preferences("중식은 싫어");
        assert_eq!(prefs, vec![ExtractedPreference::new("음식_중식", "싫어함")]);
    }

    #[test]
    fn food_preference_without_verdict_is_ignored() {
        assert!(extract_preferences("한식을 선호하는 편").is_empty());
    }

    #[test]
    fn activities_need_a_trigger() {
        let prefs = extract_preferences("취미는 영화랑 요리");
        assert_eq!(categories(&prefs), vec!["활동_영화", "활동_요리"]);
        assert!(prefs.iter().all(|p| p.value == "관심있음"));

        assert!(extract_preferences("어제 영화 봤어").is_empty());
    }

    #[test]
    fn last_personality_hint_wins() {
        let prefs = extract_preferences("재미있고 똑똑한 친구");
        assert_eq!(prefs, vec![ExtractedPreference::new(PERSONALITY_PREFERENCE, "intellectual")]);
    }

    #[test]
    fn combined_message() {
        let prefs = extract_preferences("따뜻한 말이 좋아, 음악도 좋아하고 피자도");
        assert_eq!(
            categories(&prefs),
            vec!["음식_피자", "활동_음악", PERSONALITY_PREFERENCE]
        );
        assert_eq!(prefs[2].value, "caring");
    }
}
