//! Transcript analysis: caller name extraction, summarization, urgency.
//!
//! All three functions are pure and operate on the structured transcript the
//! voice provider posts with its call-completed webhook. They are heuristic by
//! design; a missed name or summary degrades the call record, never the
//! pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const SUMMARY_MAX_CHARS: usize = 200;
pub const SUMMARY_FALLBACK: &str = "No summary available";

/// Keywords that mark a call as high urgency. Matched as substrings on the
/// lowercased full transcript text.
const URGENCY_KEYWORDS: &[&str] = &[
    "emergency",
    "urgent",
    "asap",
    "right away",
    "flooding",
    "burst",
    "fire",
    "leak",
];

#[allow(clippy::unwrap_used)] // static pattern, covered by tests
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:my name is|i'm|i am|this is|it's)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)")
        .unwrap()
});

/// Who spoke a transcript turn. The provider uses "user"/"agent" on the wire;
/// we also accept "assistant" from older agent versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "assistant")]
    Agent,
    #[serde(alias = "user")]
    Caller,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(default, alias = "message", alias = "text")]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "high",
            Urgency::Low => "low",
        }
    }
}

/// Scans caller turns for a self-introduction ("my name is Jane", "this is
/// Bob Smith") and returns the first capitalized name found.
pub fn extract_caller_name(turns: &[Turn]) -> Option<String> {
    turns
        .iter()
        .filter(|turn| turn.role == Role::Caller)
        .find_map(|turn| {
            NAME_PATTERN
                .captures(&turn.content)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Builds a short summary from the caller's side of the conversation,
/// truncated to [`SUMMARY_MAX_CHARS`] characters. Caller turns that are empty
/// or whitespace-only are skipped, so a transcript with no caller text at all
/// gets the fallback; downstream consumers never see a blank field.
pub fn summarize(turns: &[Turn]) -> String {
    let caller_text: Vec<&str> = turns
        .iter()
        .filter(|turn| turn.role == Role::Caller)
        .map(|turn| turn.content.trim())
        .filter(|text| !text.is_empty())
        .collect();

    if caller_text.is_empty() {
        return SUMMARY_FALLBACK.to_string();
    }

    let joined = caller_text.join(" ");
    if joined.chars().count() <= SUMMARY_MAX_CHARS {
        joined
    } else {
        joined.chars().take(SUMMARY_MAX_CHARS).collect()
    }
}

/// Flags the call as high urgency when any keyword appears anywhere in the
/// transcript, caller or agent side. Substring matching is intentional:
/// "there's flooding everywhere" and "basement is flooding" both hit.
pub fn detect_urgency(turns: &[Turn]) -> Urgency {
    let full_text = turns
        .iter()
        .map(|turn| turn.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if URGENCY_KEYWORDS.iter().any(|kw| full_text.contains(kw)) {
        Urgency::High
    } else {
        Urgency::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(content: &str) -> Turn {
        Turn {
            role: Role::Caller,
            content: content.to_string(),
        }
    }

    fn agent(content: &str) -> Turn {
        Turn {
            role: Role::Agent,
            content: content.to_string(),
        }
    }

    #[test]
    fn extracts_name_from_introduction() {
        let turns = vec![
            agent("Hello, how can I help you today?"),
            caller("Hi, my name is Jane and my sink is broken."),
        ];
        assert_eq!(extract_caller_name(&turns), Some("Jane".to_string()));
    }

    #[test]
    fn extracts_two_part_name() {
        let turns = vec![caller("this is Bob Smith calling about an estimate")];
        assert_eq!(extract_caller_name(&turns), Some("Bob Smith".to_string()));
    }

    #[test]
    fn ignores_agent_introductions() {
        let turns = vec![
            agent("Hi, my name is Ava, the receptionist."),
            caller("I need to book an appointment."),
        ];
        assert_eq!(extract_caller_name(&turns), None);
    }

    #[test]
    fn no_name_when_no_introduction() {
        let turns = vec![caller("I want to ask about your prices.")];
        assert_eq!(extract_caller_name(&turns), None);
    }

    #[test]
    fn summary_uses_caller_turns_only() {
        let turns = vec![
            agent("How can I help?"),
            caller("My water heater is making noises."),
            agent("I can schedule a technician."),
            caller("Tomorrow morning works."),
        ];
        assert_eq!(
            summarize(&turns),
            "My water heater is making noises. Tomorrow morning works."
        );
    }

    #[test]
    fn summary_truncates_to_limit() {
        let long = "a".repeat(500);
        let turns = vec![caller(&long)];
        let summary = summarize(&turns);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn summary_falls_back_when_empty() {
        assert_eq!(summarize(&[]), SUMMARY_FALLBACK);
        let turns = vec![agent("Hello?"), caller("   ")];
        assert_eq!(summarize(&turns), SUMMARY_FALLBACK);
    }

    #[test]
    fn burst_pipe_is_high_urgency() {
        let turns = vec![caller("A pipe burst in my basement!")];
        assert_eq!(detect_urgency(&turns), Urgency::High);
    }

    #[test]
    fn pricing_question_is_low_urgency() {
        let turns = vec![caller("How much do you charge for a drain cleaning?")];
        assert_eq!(detect_urgency(&turns), Urgency::Low);
    }

    #[test]
    fn negated_keyword_still_flags_high() {
        // Substring matching does not understand negation; this is accepted.
        let turns = vec![caller("It's no emergency, just a slow drain.")];
        assert_eq!(detect_urgency(&turns), Urgency::High);
    }

    #[test]
    fn keyword_in_agent_turn_counts() {
        let turns = vec![
            caller("Water everywhere, please hurry."),
            agent("Understood, I'm marking this as urgent."),
        ];
        assert_eq!(detect_urgency(&turns), Urgency::High);
    }
}
