//! Conversation history for the narrative agent
//!
//! Keeps a bounded log of prompt/response turns so each brief can refer back
//! to what was already said.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write;

/// Maximum number of conversation turns to keep in history
pub const MAX_HISTORY_SIZE: usize = 50;

/// Turns rendered into each prompt
pub const PROMPT_HISTORY_TURNS: usize = 5;

/// Characters of each past response quoted back into prompts
const RESPONSE_EXCERPT_CHARS: usize = 200;

/// A single turn in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_input: String,
    pub assistant_response: String,
    /// Stock symbols the turn was about
    pub symbols: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user_input: String, assistant_response: String, symbols: Vec<String>) -> Self {
        Self {
            user_input,
            assistant_response,
            symbols,
            timestamp: Utc::now(),
        }
    }
}

/// Bounded conversation log
#[derive(Debug)]
pub struct ConversationHistory {
    history: VecDeque<ConversationTurn>,
    max_history: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::with_max_history(MAX_HISTORY_SIZE)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Record a turn, dropping the oldest beyond the limit
    pub fn add_turn(&mut self, user_input: String, response: String, symbols: Vec<String>) {
        self.history
            .push_back(ConversationTurn::new(user_input, response, symbols));

        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> &VecDeque<ConversationTurn> {
        &self.history
    }

    /// The last `n` turns, newest first
    pub fn last_turns(&self, n: usize) -> Vec<&ConversationTurn> {
        self.history.iter().rev().take(n).collect()
    }

    /// Symbols from the most recent turn that named any
    pub fn current_symbols(&self) -> Option<&[String]> {
        self.history
            .iter()
            .rev()
            .find(|turn| !turn.symbols.is_empty())
            .map(|turn| turn.symbols.as_slice())
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Render the last `n` turns, oldest first; empty when there is no history
    pub fn format_recent_context(&self, n: usize) -> String {
        let turns = self.last_turns(n);

        let mut context = String::new();
        for (i, turn) in turns.iter().rev().enumerate() {
            let excerpt: String = turn
                .assistant_response
                .chars()
                .take(RESPONSE_EXCERPT_CHARS)
                .collect();
            let ellipsis = if turn.assistant_response.chars().count() > RESPONSE_EXCERPT_CHARS {
                "..."
            } else {
                ""
            };
            let _ = writeln!(context, "User {}: {}", i + 1, turn.user_input);
            let _ = writeln!(context, "Assistant {}: {excerpt}{ellipsis}", i + 1);
        }

        context
    }
}
