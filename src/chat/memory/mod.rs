#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::chunking::estimate_token_count;
use crate::providers::ChatMessage;

/// Token-bounded conversation history.
///
/// Turns are appended at the back; when the cumulative token estimate would
/// exceed the budget, turns are evicted from the front (oldest first) until
/// it holds again. The same token estimator as the chunker keeps the unit
/// consistent across the pipeline.
#[derive(Debug)]
pub struct MemoryBuffer {
    turns: VecDeque<ChatMessage>,
    token_counts: VecDeque<usize>,
    token_limit: usize,
    total_tokens: usize,
}

impl MemoryBuffer {
    #[inline]
    pub fn new(token_limit: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            token_counts: VecDeque::new(),
            token_limit,
            total_tokens: 0,
        }
    }

    /// Append one turn, evicting from the oldest end until the token budget
    /// holds. A single turn larger than the whole budget is dropped
    /// immediately rather than violate the bound.
    #[inline]
    pub fn append(&mut self, turn: ChatMessage) {
        let tokens = estimate_token_count(&turn.content);

        self.turns.push_back(turn);
        self.token_counts.push_back(tokens);
        self.total_tokens += tokens;

        while self.total_tokens > self.token_limit {
            let Some(evicted) = self.token_counts.pop_front() else {
                break;
            };
            let dropped = self.turns.pop_front();
            self.total_tokens -= evicted;

            if self.turns.is_empty() {
                warn!(
                    "A single turn of ~{evicted} tokens exceeds the memory budget of {}; dropping it",
                    self.token_limit
                );
            } else if let Some(dropped) = dropped {
                debug!(
                    "Evicted oldest {:?} turn (~{evicted} tokens) to stay within budget",
                    dropped.role
                );
            }
        }
    }

    /// All retained turns in chronological order
    #[inline]
    pub fn all(&self) -> Vec<ChatMessage> {
        self.turns.iter().cloned().collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn token_count(&self) -> usize {
        self.total_tokens
    }

    #[inline]
    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Empty the buffer; the next append starts a fresh conversation
    #[inline]
    pub fn reset(&mut self) {
        self.turns.clear();
        self.token_counts.clear();
        self.total_tokens = 0;
        debug!("Conversation memory cleared");
    }
}
