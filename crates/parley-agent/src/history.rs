//! Bounded dialogue history.
//!
//! Capped at the most recent 20 entries (10 exchanges); oldest entries are
//! evicted first. Mutated only by the session after a completed turn.

use std::collections::VecDeque;

/// Maximum retained entries (user + assistant both count).
pub const HISTORY_CAP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct DialogueTurn {
    pub role: Role,
    pub text: String,
}

/// FIFO-bounded sequence of dialogue turns in chronological order.
#[derive(Debug, Clone)]
pub struct DialogueHistory {
    turns: VecDeque<DialogueTurn>,
    cap: usize,
}

impl DialogueHistory {
    pub fn new() -> Self {
        Self::with_cap(HISTORY_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            cap,
        }
    }

    /// Seed an assistant turn (the spoken opening line) before the first
    /// exchange so the model knows it already greeted the caller.
    pub fn seed_assistant(&mut self, text: impl Into<String>) {
        self.turns.push_back(DialogueTurn {
            role: Role::Assistant,
            text: text.into(),
        });
        self.truncate();
    }

    /// Append one completed exchange and evict the oldest entries past cap.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push_back(DialogueTurn {
            role: Role::User,
            text: user.into(),
        });
        self.turns.push_back(DialogueTurn {
            role: Role::Assistant,
            text: assistant.into(),
        });
        self.truncate();
    }

    fn truncate(&mut self) {
        while self.turns.len() > self.cap {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DialogueTurn> {
        self.turns.iter()
    }
}

impl Default for DialogueHistory {
    fn default() -> Self {
        Self::new()
    }
}
