//! Conversation history for a dialogue session

use std::fmt;

/// Default number of turns kept in history (20 exchanges)
pub const DEFAULT_MAX_TURNS: usize = 40;

/// Smallest retention cap, one USER and one ASSISTANT turn
pub const MIN_MAX_TURNS: usize = 2;

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The participant
    User,
    /// The robot
    Assistant,
}

impl Role {
    /// Chat-completion role name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One utterance in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    /// Participant turn
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Robot turn
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Ordered, append-only record of the exchange
///
/// Only the orchestrator holds a mutable reference. History is capped at
/// `max_turns`; when the cap is exceeded the oldest turns are dropped until
/// the history fits and starts with a user turn again.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::with_max_turns(DEFAULT_MAX_TURNS)
    }
}

impl ConversationHistory {
    /// Empty history with the default retention cap
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty history keeping at most `max_turns` turns
    ///
    /// The cap is raised to [`MIN_MAX_TURNS`] so one whole exchange fits.
    #[must_use]
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(MIN_MAX_TURNS),
        }
    }

    /// Append a turn, trimming the oldest turns if over the cap
    ///
    /// Trimming only ever cuts in front of a USER turn; with no USER turn
    /// left in the window the history is emptied.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);

        if self.turns.len() > self.max_turns {
            let mut cut = self.turns.len() - self.max_turns;
            while cut < self.turns.len() && self.turns[cut].role != Role::User {
                cut += 1;
            }
            self.turns.drain(..cut);
            tracing::debug!(dropped = cut, kept = self.turns.len(), "trimmed conversation history");
        }
    }

    /// Copy of the current turns in order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Borrow the current turns
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
