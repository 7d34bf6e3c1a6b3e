//! Context selection with budget enforcement.
//!
//! The leading system turn is reserved first; the rest of the budget is
//! filled with the most recent turns, walking backward until the first turn
//! that does not fit.

use crate::budget::types::{SelectedContext, TokenUsageBreakdown};
use crate::error::BudgetError;
use crate::turn::{Role, Turn};

/// Select the turns to send for one model call.
///
/// 1. Reserve the leading system turn, if any. If it alone exceeds `budget`
///    the configuration is unsatisfiable and [`BudgetError::BudgetExhausted`]
///    is returned.
/// 2. Walk the remaining history from newest to oldest, accumulating cached
///    token counts, and stop before the first turn that would overflow.
///    Older turns are never reconsidered, so the window stays contiguous.
/// 3. Return the system turn followed by the window, oldest first.
///
/// `history` is never modified.
pub fn select_context(history: &[Turn], budget: u32) -> Result<SelectedContext, BudgetError> {
    if budget == 0 {
        return Err(BudgetError::ZeroBudget);
    }

    let (system, rest) = match history.split_first() {
        Some((first, rest)) if first.role() == Role::System => (Some(first), rest),
        _ => (None, history),
    };

    let system_tokens = system.map_or(0, Turn::token_count);
    if system_tokens > budget {
        return Err(BudgetError::BudgetExhausted {
            system_tokens,
            budget,
        });
    }

    let remaining_budget = budget - system_tokens;
    let (window_start, window_tokens) = window_start_within(rest, remaining_budget);
    let window = &rest[window_start..];

    if window_start > 0 {
        tracing::debug!(
            "Dropped {} older turns to fit {} tokens (window {} tokens, system {} tokens)",
            window_start,
            budget,
            window_tokens,
            system_tokens
        );
    }

    let mut turns = Vec::with_capacity(window.len() + usize::from(system.is_some()));
    if let Some(system) = system {
        turns.push(system.clone());
    }
    turns.extend_from_slice(window);

    Ok(SelectedContext {
        turns,
        token_usage: TokenUsageBreakdown {
            system_tokens,
            window_tokens,
            total_tokens: system_tokens + window_tokens,
            budget_limit: budget,
        },
        turns_dropped: window_start,
    })
}

/// Index of the oldest turn in the newest run of `turns` that fits in
/// `remaining_budget`, plus that run's token total.
fn window_start_within(turns: &[Turn], remaining_budget: u32) -> (usize, u32) {
    let mut current_tokens: u32 = 0;
    let mut start = turns.len();

    for (index, turn) in turns.iter().enumerate().rev() {
        let next = current_tokens.saturating_add(turn.token_count());
        if next > remaining_budget {
            if start == turns.len() {
                tracing::warn!(
                    "Newest turn ({} tokens) exceeds remaining budget ({} tokens); no history fits",
                    turn.token_count(),
                    remaining_budget
                );
            }
            break;
        }
        current_tokens = next;
        start = index;
    }

    (start, current_tokens)
}
