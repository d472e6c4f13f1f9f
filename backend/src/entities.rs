use std::collections::{BTreeMap, BTreeSet};

use candid::CandidType;
use ic_llm::{ChatMessage, Role};
use itertools::Itertools;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Roles {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Roles,
    pub content: String,
    /// Quick-select answers offered with an assistant turn.
    pub options: Option<Vec<String>>,
    pub timestamp: u64,
}

pub type ChatHistory = Vec<ChatTurn>;

impl ChatTurn {
    pub fn user(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Roles::User,
            content: content.into(),
            options: None,
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role: Roles::Assistant,
            content: content.into(),
            options: None,
            timestamp,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Roles,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Roles::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Roles::User,
            content: content.into(),
        }
    }

    pub fn to_ic_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role.to_ic_role(),
            content: self.content.clone(),
        }
    }
}

impl From<&ChatTurn> for PromptMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

impl Roles {
    pub fn to_ic_role(&self) -> Role {
        match *self {
            Roles::Assistant => Role::Assistant,
            Roles::User => Role::User,
            Roles::System => Role::System,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiksCategory {
    Abilities,
    Interests,
    Knowledge,
    Skills,
}

impl AiksCategory {
    pub const ALL: [AiksCategory; 4] = [
        AiksCategory::Abilities,
        AiksCategory::Interests,
        AiksCategory::Knowledge,
        AiksCategory::Skills,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AiksCategory::Abilities => "Abilities",
            AiksCategory::Interests => "Interests",
            AiksCategory::Knowledge => "Knowledge",
            AiksCategory::Skills => "Skills",
        }
    }
}

#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, Default, PartialEq, Eq)]
pub struct AiksUpdate {
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub knowledge: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Present in the payload but superseded by the turn-level options.
    #[serde(default)]
    pub suggested_options: Vec<String>,
}

impl AiksUpdate {
    pub fn items(&self, category: AiksCategory) -> &[String] {
        match category {
            AiksCategory::Abilities => &self.abilities,
            AiksCategory::Interests => &self.interests,
            AiksCategory::Knowledge => &self.knowledge,
            AiksCategory::Skills => &self.skills,
        }
    }
}

/// Items only ever get added; matching is exact and case-sensitive.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AiksProfile {
    pub abilities: BTreeSet<String>,
    pub interests: BTreeSet<String>,
    pub knowledge: BTreeSet<String>,
    pub skills: BTreeSet<String>,
}

impl AiksProfile {
    pub fn category(&self, category: AiksCategory) -> &BTreeSet<String> {
        match category {
            AiksCategory::Abilities => &self.abilities,
            AiksCategory::Interests => &self.interests,
            AiksCategory::Knowledge => &self.knowledge,
            AiksCategory::Skills => &self.skills,
        }
    }

    fn category_mut(&mut self, category: AiksCategory) -> &mut BTreeSet<String> {
        match category {
            AiksCategory::Abilities => &mut self.abilities,
            AiksCategory::Interests => &mut self.interests,
            AiksCategory::Knowledge => &mut self.knowledge,
            AiksCategory::Skills => &mut self.skills,
        }
    }

    /// Returns how many items were new.
    pub fn merge(&mut self, update: &AiksUpdate) -> usize {
        let mut added = 0;
        for category in AiksCategory::ALL {
            let set = self.category_mut(category);
            for item in update.items(category) {
                if set.insert(item.clone()) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        AiksCategory::ALL
            .iter()
            .map(|c| self.category(*c).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One `Label: a, b` line per category, empty categories included.
    pub fn summary(&self) -> String {
        AiksCategory::ALL
            .iter()
            .map(|c| format!("{}: {}", c.label(), self.category(*c).iter().join(", ")))
            .join("\n")
    }
}

#[derive(
    CandidType, Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq,
)]
pub struct Profession {
    pub title: String,
    pub explanation: String,
    pub required_skills: Vec<String>,
    /// AIKS category name to the profile items that justify the match.
    pub aiks_alignment: BTreeMap<String, Vec<String>>,
    pub daily_life_example: String,
}

#[derive(CandidType, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AdvisorThread {
    pub title: String,
    pub turns: ChatHistory,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(interests: &[&str], skills: &[&str]) -> AiksUpdate {
        AiksUpdate {
            interests: interests.iter().map(|s| s.to_string()).collect(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn map_message_should_valid() {
        let turn = ChatTurn::user("hi text!", 1);
        let mapped = PromptMessage::from(&turn).to_ic_message();
        assert_eq!(turn.content, mapped.content);
    }

    #[test]
    fn map_role_should_valid() {
        let r = Roles::Assistant;
        let mapped = r.to_ic_role();
        assert!(matches!(mapped, Role::Assistant));
    }

    #[test]
    fn merge_twice_equals_merge_once() {
        let u = update(&["problem-solving", "music"], &["python"]);
        let mut once = AiksProfile::default();
        once.merge(&u);
        let mut twice = once.clone();
        assert_eq!(twice.merge(&u), 0);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn merge_is_case_sensitive_and_monotonic() {
        let mut profile = AiksProfile::default();
        profile.merge(&update(&["Coding"], &[]));
        let before = profile.interests.len();
        assert_eq!(profile.merge(&update(&["coding", "Coding"], &[])), 1);
        assert!(profile.interests.len() >= before);
        assert!(profile.interests.contains("coding"));
        assert!(profile.interests.contains("Coding"));
    }

    #[test]
    fn merge_ignores_update_suggested_options() {
        let mut profile = AiksProfile::default();
        let u = AiksUpdate {
            suggested_options: vec!["Tell me more".to_string()],
            ..Default::default()
        };
        assert_eq!(profile.merge(&u), 0);
        assert!(profile.is_empty());
    }

    #[test]
    fn summary_keeps_empty_categories() {
        let mut profile = AiksProfile::default();
        profile.merge(&update(&["coding"], &["python", "git"]));
        assert_eq!(
            profile.summary(),
            "Abilities: \nInterests: coding\nKnowledge: \nSkills: git, python"
        );
    }

    #[test]
    fn update_defaults_missing_lists() {
        let parsed: AiksUpdate = serde_json::from_str(r#"{"interests":["art"]}"#).unwrap();
        assert_eq!(parsed.interests, vec!["art".to_string()]);
        assert!(parsed.abilities.is_empty());
        assert!(parsed.suggested_options.is_empty());
    }
}
