use std::sync::Arc;

use tokio::sync::mpsc;

use chat_llm::LLMProvider;
use chat_state::{BudgetError, Turn};

use crate::config::ChatLoopConfig;
use crate::error::Result;
use crate::events::{ChatEvent, ContextUsage, TokenUsage};
use crate::session::{ChatSession, UserInput};
use crate::stream::handler::consume_llm_stream;

/// Run one submission end to end: append the user turn, select context,
/// call the model, append its reply.
///
/// On any failure the session is rolled back to where it was before the
/// call, so neither the user turn nor a partial reply is kept, and a
/// [`ChatEvent::Error`] is sent before the error is returned.
pub async fn run_round_trip(
    session: &mut ChatSession,
    input: UserInput,
    llm: Arc<dyn LLMProvider>,
    config: &ChatLoopConfig,
    event_tx: mpsc::Sender<ChatEvent>,
) -> Result<Turn> {
    let checkpoint = session.checkpoint();

    match round_trip(session, input, llm.as_ref(), config, &event_tx).await {
        Ok(reply) => Ok(reply),
        Err(error) => {
            let removed = session.rollback_to(checkpoint);
            tracing::warn!(
                "[{}] Round-trip failed, rolled back {} turn(s): {}",
                session.id(),
                removed,
                error
            );
            let _ = event_tx
                .send(ChatEvent::Error {
                    message: error.to_string(),
                })
                .await;
            Err(error)
        }
    }
}

async fn round_trip(
    session: &mut ChatSession,
    input: UserInput,
    llm: &dyn LLMProvider,
    config: &ChatLoopConfig,
    event_tx: &mpsc::Sender<ChatEvent>,
) -> Result<Turn> {
    let user_turn = session.submit(input)?;
    tracing::debug!(
        "[{}] User turn {} appended ({} tokens, {} image(s))",
        session.id(),
        user_turn.id(),
        user_turn.token_count(),
        user_turn.content().images().len()
    );

    let selected = session.select_context()?;
    if selected.turns.last().map(Turn::id) != Some(user_turn.id()) {
        return Err(BudgetError::TurnTooLarge {
            turn_tokens: user_turn.token_count(),
            budget: selected
                .token_usage
                .budget_limit
                .saturating_sub(selected.token_usage.system_tokens),
        }
        .into());
    }

    let context_usage = ContextUsage::new(
        &selected.token_usage,
        selected.len(),
        selected.turns_dropped,
    );
    if context_usage.truncation_occurred() {
        tracing::info!(
            "[{}] Context truncated: sending {} turn(s), dropped {} ({}/{} tokens)",
            session.id(),
            context_usage.turns_sent,
            context_usage.turns_dropped,
            context_usage.total_tokens,
            context_usage.budget_limit
        );
    }
    let _ = event_tx
        .send(ChatEvent::ContextPrepared {
            usage: context_usage,
        })
        .await;

    let stream = llm
        .chat_stream(
            &selected.turns,
            config.max_output_tokens,
            config.model_name.as_deref(),
        )
        .await?;

    let output = consume_llm_stream(stream, event_tx, session.id()).await?;
    if output.content.is_empty() {
        tracing::warn!("[{}] Model returned an empty reply", session.id());
    }

    let reply = session.append_assistant(output.content);
    let usage = TokenUsage {
        prompt_tokens: selected.token_usage.total_tokens,
        completion_tokens: reply.token_count(),
        total_tokens: selected
            .token_usage
            .total_tokens
            .saturating_add(reply.token_count()),
    };
    let _ = event_tx.send(ChatEvent::Complete { usage }).await;

    Ok(reply)
}
