use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Prior turns of one conversation, oldest first. The router only ever
/// forwards a bounded tail of it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn { role, text: text.into() });
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Role::User, text);
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(Role::Assistant, text);
    }

    /// The last `window` turns.
    pub fn recent(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Plain-text transcript used inside LLM prompts.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{render_transcript, ConversationHistory, Role};

    #[test]
    fn recent_returns_a_bounded_tail() {
        let mut history = ConversationHistory::new();
        for index in 0..5 {
            history.push_user(format!("message {index}"));
        }

        let tail = history.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "message 3");
        assert_eq!(history.recent(10).len(), 5);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn history_deserializes_from_a_plain_turn_list() {
        let history: ConversationHistory = serde_json::from_str(
            r#"[{"role":"user","text":"who owns Palm Tower 3401?"},{"role":"assistant","text":"John Smith"}]"#,
        )
        .expect("parse");
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[1].role, Role::Assistant);
        assert_eq!(
            render_transcript(history.turns()),
            "user: who owns Palm Tower 3401?\nassistant: John Smith"
        );
    }
}
