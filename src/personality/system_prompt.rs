//! System prompt assembled from the persona, the user and recalled memories.

use super::{PersonalityType, traits_for};

pub struct SystemPromptParams<'a> {
    pub personality: PersonalityType,
    pub user_name: Option<&'a str>,
    pub interaction_count: u64,
    pub mood: f32,
    pub memories: Vec<String>,
    /// (category, value) pairs
    pub preferences: Vec<(String, String)>,
    pub opening_hint: Option<String>,
}

impl<'a> SystemPromptParams<'a> {
    pub fn new(personality: PersonalityType) -> Self {
        Self {
            personality,
            user_name: None,
            interaction_count: 0,
            mood: 0.8,
            memories: Vec::new(),
            preferences: Vec::new(),
            opening_hint: None,
        }
    }

    pub fn with_user(mut self, name: Option<&'a str>, interaction_count: u64, mood: f32) -> Self {
        self.user_name = name.filter(|n| !n.trim().is_empty());
        self.interaction_count = interaction_count;
        self.mood = mood;
        self
    }

    pub fn with_memories(mut self, memories: Vec<String>) -> Self {
        self.memories = memories;
        self
    }

    pub fn with_preferences(mut self, preferences: Vec<(String, String)>) -> Self {
        self.preferences = preferences;
        self
    }

    /// Empty hints are dropped.
    pub fn with_opening_hint(mut self, hint: String) -> Self {
        self.opening_hint = Some(hint).filter(|h| !h.trim().is_empty());
        self
    }
}

pub fn build_system_prompt(params: SystemPromptParams) -> String {
    let traits = traits_for(params.personality);
    let mut lines = vec![
        format!("당신은 {}이라는 이름의 AI 동반자입니다.", traits.name),
        format!("성격: {}", traits.description),
        String::new(),
        format!("응답 스타일: {} 대화해주세요.", traits.response_style),
        String::new(),
        "사용자 정보:".to_string(),
        format!("- 이름: {}", params.user_name.unwrap_or("알 수 없음")),
        format!("- 상호작용 횟수: {}", params.interaction_count),
        format!("- 현재 기분 수준: {:.1}/1.0", params.mood),
        String::new(),
    ];

    // Memories
    if params.memories.is_empty() {
        lines.push("아직 기억된 정보가 없습니다.".to_string());
    } else {
        lines.push("기억된 정보:".to_string());
        for memory in &params.memories {
            lines.push(format!("- {}", memory));
        }
    }
    lines.push(String::new());

    if !params.preferences.is_empty() {
        lines.push("사용자 선호도:".to_string());
        for (category, value) in &params.preferences {
            lines.push(format!("- {}: {}", category, value));
        }
        lines.push(String::new());
    }

    if let Some(ref hint) = params.opening_hint {
        lines.push(format!("응답을 이런 느낌으로 시작해도 좋아요: {}", hint));
        lines.push(String::new());
    }

    for line in traits.guidance {
        lines.push(line.to_string());
    }
    lines.push(String::new());

    lines.push(
        "한국어로 자연스럽게 대화하며, 사용자의 감정과 맥락을 고려해 응답해주세요.".to_string(),
    );

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_prompt() {
        let prompt = build_system_prompt(SystemPromptParams::new(PersonalityType::Caring));
        assert!(prompt.starts_with("당신은 돌봄이이라는 이름의 AI 동반자입니다."));
        assert!(prompt.contains("- 이름: 알 수 없음"));
        assert!(prompt.contains("- 현재 기분 수준: 0.8/1.0"));
        assert!(prompt.contains("아직 기억된 정보가 없습니다."));
        assert!(!prompt.contains("사용자 선호도:"));
        assert!(!prompt.contains("응답을 이런 느낌으로"));
        assert!(prompt.ends_with("맥락을 고려해 응답해주세요."));
    }

    #[test]
    fn full_prompt_sections() {
        let params = SystemPromptParams::new(PersonalityType::Intellectual)
            .with_user(Some("민수"), 7, 0.95)
            .with_memories(vec!["사용자: 피자 좋아\nAI: 저도요".to_string()])
            .with_preferences(vec![("음식_피자".to_string(), "좋아함".to_string())])
            .with_opening_hint("흥미로운 관점이네요.".to_string());
        let prompt = build_system_prompt(params);

        assert!(prompt.contains("현자"));
        assert!(prompt.contains("- 이름: 민수"));
        assert!(prompt.contains("- 상호작용 횟수: 7"));
        assert!(prompt.contains("기억된 정보:\n- 사용자: 피자 좋아"));
        assert!(prompt.contains("사용자 선호도:\n- 음식_피자: 좋아함"));
        assert!(prompt.contains("흥미로운 관점이네요."));
        assert!(prompt.contains("새로운 지식이나 인사이트"));
    }

    #[test]
    fn blank_name_and_hint_are_ignored() {
        let params = SystemPromptParams::new(PersonalityType::Playful)
            .with_user(Some("  "), 0, 0.5)
            .with_opening_hint(String::new());
        let prompt = build_system_prompt(params);
        assert!(prompt.contains("- 이름: 알 수 없음"));
        assert!(!prompt.contains("응답을 이런 느낌으로"));
    }
}
