//! Chat-completion SSE body -> [`LLMStream`].

use std::fmt;

use eventsource_stream::Eventsource;
use futures_util::{stream, Stream, StreamExt};

use super::openai_compat::parse_openai_compat_sse_data_strict;
use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

/// Turn a chat-completions event stream into reply chunks.
///
/// Blank payloads and empty deltas are skipped. `[DONE]` yields
/// [`LLMChunk::Done`] and ends the stream. A body that closes before `[DONE]`
/// was cut off, so it ends with an [`LLMError::Stream`] instead.
pub fn chat_completion_stream<S, B, E>(body: S) -> LLMStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let events = Box::pin(body.eventsource());

    let chunks = stream::unfold(Some(events), |state| async move {
        let mut events = state?;
        loop {
            let item = match events.next().await {
                Some(Ok(event)) => match chunk_from_data(&event.data) {
                    Ok(None) => continue,
                    Ok(Some(LLMChunk::Done)) => return Some((Ok(LLMChunk::Done), None)),
                    Ok(Some(chunk)) => chunk,
                    Err(e) => return Some((Err(e), None)),
                },
                Some(Err(e)) => return Some((Err(LLMError::Stream(e.to_string())), None)),
                None => {
                    log::warn!("Chat completion stream closed before [DONE]");
                    let error = LLMError::Stream("stream ended before completion".to_string());
                    return Some((Err(error), None));
                }
            };
            return Some((Ok(item), Some(events)));
        }
    });

    Box::pin(chunks)
}

fn chunk_from_data(data: &str) -> Result<Option<LLMChunk>> {
    if data.trim().is_empty() {
        return Ok(None);
    }
    match parse_openai_compat_sse_data_strict(data) {
        Ok(LLMChunk::Token(token)) if token.is_empty() => Ok(None),
        Ok(chunk) => Ok(Some(chunk)),
        Err(e @ LLMError::Stream(_)) => Err(e),
        Err(other) => Err(LLMError::Stream(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn body(frames: &[&'static str]) -> LLMStream {
        let items: Vec<std::result::Result<&'static [u8], Infallible>> =
            frames.iter().copied().map(|f| Ok(f.as_bytes())).collect();
        chat_completion_stream(stream::iter(items))
    }

    async fn collect(mut chunks: LLMStream) -> Vec<Result<LLMChunk>> {
        let mut out = Vec::new();
        while let Some(item) = chunks.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn yields_tokens_then_done() {
        let out = collect(body(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: \n\n",
            "data: [DONE]\n\n",
        ]))
        .await;

        let chunks: Vec<LLMChunk> = out.into_iter().map(|c| c.expect("chunk")).collect();
        assert_eq!(chunks, vec![LLMChunk::Token("Hi".to_string()), LLMChunk::Done]);
    }

    #[tokio::test]
    async fn nothing_is_read_after_done() {
        let out = collect(body(&[
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        ]))
        .await;

        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Ok(LLMChunk::Done)));
    }

    #[tokio::test]
    async fn body_closed_before_done_is_an_error() {
        let out = collect(body(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"The answer is\"}}]}\n\n",
        ]))
        .await;

        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Ok(LLMChunk::Token(t)) if t == "The answer is"));
        assert!(matches!(
            &out[1],
            Err(LLMError::Stream(msg)) if msg.contains("before completion")
        ));
    }

    #[tokio::test]
    async fn invalid_json_becomes_stream_error_and_stops() {
        let out = collect(body(&["data: {not json}\n\n", "data: [DONE]\n\n"])).await;

        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(LLMError::Stream(_))));
    }

    #[tokio::test]
    async fn events_split_across_reads_are_reassembled() {
        let out = collect(body(&[
            "data: {\"choices\":[{\"delta\":",
            "{\"content\":\"joined\"}}]}\n\ndata: [DO",
            "NE]\n\n",
        ]))
        .await;

        let chunks: Vec<LLMChunk> = out.into_iter().map(|c| c.expect("chunk")).collect();
        assert_eq!(
            chunks,
            vec![LLMChunk::Token("joined".to_string()), LLMChunk::Done]
        );
    }
}
