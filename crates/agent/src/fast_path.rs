use aura_core::knowledge::FastPathTable;

/// Tier 0 lookup. Matching is exact after folding case, whitespace and
/// trailing punctuation, so "thanks" hits but "thanks, now find buyers"
/// does not.
#[derive(Clone, Debug)]
pub struct FastPath {
    fillers: Vec<String>,
    acknowledgement: String,
    greetings: Vec<String>,
    greeting_reply: String,
}

impl FastPath {
    pub fn new(table: &FastPathTable) -> Self {
        Self {
            fillers: table.fillers.iter().map(|filler| fold(filler)).collect(),
            acknowledgement: table.acknowledgement.clone(),
            greetings: table.greetings.iter().map(|greeting| fold(greeting)).collect(),
            greeting_reply: table.greeting_reply.clone(),
        }
    }

    pub fn respond(&self, utterance: &str) -> Option<&str> {
        let folded = fold(utterance);
        if folded.is_empty() {
            return None;
        }
        if self.greetings.contains(&folded) {
            return Some(self.greeting_reply.as_str());
        }
        self.fillers.contains(&folded).then_some(self.acknowledgement.as_str())
    }
}

pub(crate) fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| matches!(c, '!' | '.' | '?' | ',' | ':' | ')'))
        .trim()
        .to_string()
}
