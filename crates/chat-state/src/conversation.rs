//! Append-only conversation history.

use crate::budget::selection;
use crate::budget::types::SelectedContext;
use crate::error::BudgetError;
use crate::turn::{Role, Turn};

/// Ordered history of turns for one chat session.
///
/// Turns are only ever appended; earlier turns are never edited or
/// reordered. The one way to shrink history is [`Conversation::rollback_to`]
/// with a checkpoint taken earlier, which discards a failed exchange.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

/// Position in history to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation seeded with a system turn.
    pub fn with_system_turn(system: Turn) -> Self {
        Self {
            turns: vec![system],
        }
    }

    pub fn append_turn(&mut self, turn: Turn) {
        tracing::trace!(
            "Appending {} turn {} ({} tokens)",
            turn.role(),
            turn.id(),
            turn.token_count()
        );
        self.turns.push(turn);
    }

    /// Turns to send for one model call within `budget` tokens.
    pub fn select_context(&self, budget: u32) -> Result<SelectedContext, BudgetError> {
        selection::select_context(&self.turns, budget)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn system_turn(&self) -> Option<&Turn> {
        self.turns.first().filter(|t| t.role() == Role::System)
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Sum of cached token counts over the whole history.
    pub fn total_tokens(&self) -> u64 {
        self.turns.iter().map(|t| u64::from(t.token_count())).sum()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.turns.len())
    }

    /// Drop every turn appended after `checkpoint`. Returns how many were
    /// removed.
    pub fn rollback_to(&mut self, checkpoint: Checkpoint) -> usize {
        let removed = self.turns.len().saturating_sub(checkpoint.0);
        if removed > 0 {
            tracing::debug!("Rolling back {} turn(s) to checkpoint {}", removed, checkpoint.0);
            self.turns.truncate(checkpoint.0);
        }
        removed
    }
}
