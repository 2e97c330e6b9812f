use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for ConversationTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.speaker {
            Speaker::User => "You",
            Speaker::Bot => "Bot",
        };
        write!(f, "# {label}:\n{}", self.text)
    }
}

/// Append-only transcript of one chat session. Lives for as long as the
/// process does; nothing is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    turns: Vec<ConversationTurn>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Appends a user turn and the bot turn answering it. Turns only ever
    /// enter the log in such pairs.
    pub fn record_exchange(&mut self, user: impl Into<String>, bot: impl Into<String>) {
        self.turns.push(ConversationTurn {
            speaker: Speaker::User,
            text: user.into(),
        });
        self.turns.push(ConversationTurn {
            speaker: Speaker::Bot,
            text: bot.into(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last_bot_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::Bot)
            .map(|turn| turn.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The whole log, one block per turn, oldest first.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchanges_append_in_order() {
        let mut session = Session::new();
        session.record_exchange("hi", "hello");
        session.record_exchange("weather?", "sunny");

        let speakers: Vec<Speaker> = session.turns().iter().map(|t| t.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Bot, Speaker::User, Speaker::Bot]
        );
        assert_eq!(session.last_bot_text(), Some("sunny"));
    }

    #[test]
    fn renders_labelled_blocks() {
        let mut session = Session::with_id(Uuid::nil());
        session.record_exchange("hi", "hello");
        assert_eq!(session.render(), "# You:\nhi\n\n# Bot:\nhello");
    }

    #[test]
    fn new_session_is_empty() {
        let session = Session::default();
        assert!(session.is_empty());
        assert_eq!(session.last_bot_text(), None);
    }
}
