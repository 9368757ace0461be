//! Canned replies used when no provider can answer.

use crate::text::{mentions_any, pick};

const GREETING: &[&str] = &["안녕", "hello", "hi", "hey"];
const SAD: &[&str] = &["슬프", "우울", "힘들", "sad"];
const HAPPY: &[&str] = &["기쁘", "행복", "좋", "happy"];
const THANKS: &[&str] = &["고마워", "감사", "thank", "thanks"];
const FAREWELL: &[&str] = &["안녕히", "bye", "goodbye"];
const QUESTION: &[&str] = &["뭐", "무엇", "왜", "어떻게"];

const GENERIC: &[&str] = &[
    "흥미로운 이야기네요. 더 자세히 말씀해주세요.",
    "그런 일이 있으셨군요. 어떤 기분이셨나요?",
    "당신의 이야기를 듣고 있어요. 계속해주세요.",
    "AI 연결이 안 되어 있지만, 여전히 당신과 대화하고 싶어요.",
    "제한적이지만 당신의 동반자가 되어드리고 싶어요.",
];

/// Pick an offline reply from the keywords in `message`.
pub fn offline_reply(message: &str) -> String {
    let lower = message.to_lowercase();

    let reply = if mentions_any(&lower, GREETING) {
        "안녕하세요! 만나서 반가워요. AI 서비스에 연결할 수 없지만 여전히 당신과 대화하고 싶어요."
    } else if mentions_any(&lower, SAD) {
        "힘든 시간이시군요. 비록 AI 서비스가 연결되지 않았지만, 제가 여기 있어서 당신의 이야기를 들어드릴 수 있어요."
    } else if mentions_any(&lower, HAPPY) {
        "기분이 좋으시다니 저도 함께 기뻐요! 더 자세한 이야기를 들려주세요."
    } else if mentions_any(&lower, THANKS) {
        "천만에요! 언제든지 도움이 필요하시면 말씀해주세요."
    } else if mentions_any(&lower, FAREWELL) {
        "안녕히 가세요! 좋은 하루 보내시고, 다음에 또 만나요!"
    } else if message.contains('?') || mentions_any(&lower, QUESTION) {
        "궁금한 것이 있으시군요. AI 서비스가 연결되면 더 자세한 답변을 드릴 수 있을 텐데, 지금은 제한적인 응답만 가능해요."
    } else {
        pick(GENERIC)
    };

    reply.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_classes_in_order() {
        assert!(offline_reply("안녕하세요").starts_with("안녕하세요! 만나서"));
        assert!(offline_reply("Hi there").starts_with("안녕하세요! 만나서"));
        assert!(offline_reply("오늘 너무 우울해").starts_with("힘든 시간"));
        assert!(offline_reply("행복한 하루").starts_with("기분이 좋으시다니"));
        assert!(offline_reply("정말 고마워").starts_with("천만에요"));
        assert!(offline_reply("ok bye").starts_with("안녕히 가세요"));
        assert!(offline_reply("이게 뭐야").starts_with("궁금한 것이"));
        assert!(offline_reply("really?").starts_with("궁금한 것이"));
    }

    #[test]
    fn greeting_wins_over_sadness() {
        assert!(offline_reply("안녕, 나 슬퍼").starts_with("안녕하세요!"));
    }

    #[test]
    fn ascii_keywords_need_whole_words() {
        // "this" must not count as "hi"
        let reply = offline_reply("this thing");
        assert!(GENERIC.contains(&reply.as_str()));
    }
}
