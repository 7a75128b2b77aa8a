use crate::protocol::anthropic::{
    AnthropicErrorEnvelope, AnthropicUsage, ContentBlockDeltaPayload, MessageDeltaPayload,
    MessageStartPayload,
};
use crate::protocol::mapping::anthropic_stop_to_openai;
use crate::protocol::openai_chat::{ChatRole, OutputChunk};

use super::{UpstreamEvent, UpstreamEventType};

const DEFAULT_STREAM_ERROR: &str = "upstream stream error";

/// What one upstream event turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum MapperStep {
    /// Emit this chunk to the client.
    Chunk(OutputChunk),
    /// `message_stop`: the terminal sentinel follows.
    Finish,
    /// In-stream `error` event carrying the upstream message.
    Fail(String),
}

/// Token counters reported by the upstream, kept for the completion log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl StreamUsage {
    fn absorb(&mut self, usage: Option<AnthropicUsage>) {
        let Some(usage) = usage else {
            return;
        };
        if usage.input_tokens.is_some() {
            self.input_tokens = usage.input_tokens;
        }
        if usage.output_tokens.is_some() {
            self.output_tokens = usage.output_tokens;
        }
    }
}

/// Per-stream event-to-chunk state machine.
///
/// At most one role chunk and one finish chunk are produced per stream, and
/// nothing is produced once a terminal event has been seen.
#[derive(Debug, Default)]
pub struct ChunkMapper {
    role_chunk_emitted: bool,
    finish_reason: Option<String>,
    finished: bool,
    usage: StreamUsage,
}

impl ChunkMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one event. `None` means the event produces nothing.
    pub fn advance(&mut self, event: UpstreamEvent) -> Option<MapperStep> {
        if self.finished {
            return None;
        }

        match event.event_type {
            UpstreamEventType::MessageStart => {
                if self.role_chunk_emitted {
                    return None;
                }
                self.role_chunk_emitted = true;
                let payload =
                    serde_json::from_value::<MessageStartPayload>(event.payload).unwrap_or_default();
                self.usage.absorb(payload.message.usage);
                Some(MapperStep::Chunk(OutputChunk::role(ChatRole::Assistant)))
            }
            UpstreamEventType::ContentBlockDelta => {
                let payload =
                    match serde_json::from_value::<ContentBlockDeltaPayload>(event.payload) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::debug!(error = %err, "skipping malformed content_block_delta");
                            return None;
                        }
                    };
                if !payload.delta.is_text() || payload.delta.text.is_empty() {
                    return None;
                }
                Some(MapperStep::Chunk(OutputChunk::content(payload.delta.text)))
            }
            UpstreamEventType::MessageDelta => {
                let payload = match serde_json::from_value::<MessageDeltaPayload>(event.payload) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::debug!(error = %err, "skipping malformed message_delta");
                        return None;
                    }
                };
                self.usage.absorb(payload.usage);
                let stop_reason = payload.delta.stop_reason?;
                if self.finish_reason.is_some() {
                    tracing::debug!(stop_reason = %stop_reason, "ignoring repeated stop_reason");
                    return None;
                }
                let finish_reason = anthropic_stop_to_openai(&stop_reason);
                self.finish_reason = Some(finish_reason.clone());
                Some(MapperStep::Chunk(OutputChunk::finish(finish_reason)))
            }
            UpstreamEventType::MessageStop => {
                self.finished = true;
                Some(MapperStep::Finish)
            }
            UpstreamEventType::Error => {
                self.finished = true;
                let message = serde_json::from_value::<AnthropicErrorEnvelope>(event.payload)
                    .ok()
                    .and_then(|envelope| {
                        envelope
                            .error
                            .message
                            .filter(|m| !m.is_empty())
                            .or(envelope.error.type_)
                    })
                    .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string());
                Some(MapperStep::Fail(message))
            }
            UpstreamEventType::ContentBlockStart
            | UpstreamEventType::ContentBlockStop
            | UpstreamEventType::Ping
            | UpstreamEventType::Other(_) => None,
        }
    }

    #[must_use]
    pub fn finish_emitted(&self) -> bool {
        self.finish_reason.is_some()
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn usage(&self) -> StreamUsage {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, payload: serde_json::Value) -> UpstreamEvent {
        UpstreamEvent {
            event_type: UpstreamEventType::from_name(name),
            payload,
        }
    }

    fn text_delta(text: &str) -> UpstreamEvent {
        event(
            "content_block_delta",
            json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":text}}),
        )
    }

    fn stop_delta(reason: &str) -> UpstreamEvent {
        event(
            "message_delta",
            json!({"type":"message_delta","delta":{"stop_reason":reason},"usage":{"output_tokens":9}}),
        )
    }

    #[test]
    fn happy_path_sequence() {
        let mut mapper = ChunkMapper::new();
        let steps: Vec<MapperStep> = [
            event(
                "message_start",
                json!({"type":"message_start","message":{"usage":{"input_tokens":12,"output_tokens":1}}}),
            ),
            event("content_block_start", json!({"type":"content_block_start"})),
            text_delta("Hel"),
            event("ping", json!({"type":"ping"})),
            text_delta("lo"),
            event("content_block_stop", json!({"type":"content_block_stop"})),
            stop_delta("end_turn"),
            event("message_stop", json!({"type":"message_stop"})),
        ]
        .into_iter()
        .filter_map(|e| mapper.advance(e))
        .collect();

        assert_eq!(
            steps,
            vec![
                MapperStep::Chunk(OutputChunk::role(ChatRole::Assistant)),
                MapperStep::Chunk(OutputChunk::content("Hel".into())),
                MapperStep::Chunk(OutputChunk::content("lo".into())),
                MapperStep::Chunk(OutputChunk::finish("stop".into())),
                MapperStep::Finish,
            ]
        );
        assert_eq!(
            mapper.usage(),
            StreamUsage {
                input_tokens: Some(12),
                output_tokens: Some(9)
            }
        );
        assert_eq!(mapper.finish_reason(), Some("stop"));
    }

    #[test]
    fn role_chunk_only_once() {
        let mut mapper = ChunkMapper::new();
        assert!(mapper.advance(event("message_start", json!({}))).is_some());
        assert!(mapper.advance(event("message_start", json!({}))).is_none());
    }

    #[test]
    fn empty_and_non_text_deltas_are_skipped() {
        let mut mapper = ChunkMapper::new();
        assert!(mapper.advance(text_delta("")).is_none());
        assert!(mapper
            .advance(event(
                "content_block_delta",
                json!({"delta":{"type":"input_json_delta","partial_json":"{}"}})
            ))
            .is_none());
        assert!(mapper
            .advance(event("content_block_delta", json!({"nope": true})))
            .is_none());
    }

    #[test]
    fn second_stop_reason_is_ignored() {
        let mut mapper = ChunkMapper::new();
        assert_eq!(
            mapper.advance(stop_delta("max_tokens")),
            Some(MapperStep::Chunk(OutputChunk::finish("max_tokens".into())))
        );
        assert!(mapper.advance(stop_delta("end_turn")).is_none());
        assert_eq!(mapper.finish_reason(), Some("max_tokens"));
    }

    #[test]
    fn message_delta_without_stop_reason_is_skipped() {
        let mut mapper = ChunkMapper::new();
        assert!(mapper
            .advance(event("message_delta", json!({"delta":{},"usage":{"output_tokens":4}})))
            .is_none());
        assert!(!mapper.finish_emitted());
        assert_eq!(mapper.usage().output_tokens, Some(4));
    }

    #[test]
    fn error_event_fails_with_upstream_message() {
        let mut mapper = ChunkMapper::new();
        let step = mapper.advance(event(
            "error",
            json!({"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}),
        ));
        assert_eq!(step, Some(MapperStep::Fail("Overloaded".into())));
        assert!(mapper.is_finished());
        assert!(mapper.advance(text_delta("late")).is_none());
    }

    #[test]
    fn error_event_without_message_uses_type_or_default() {
        let mut mapper = ChunkMapper::new();
        assert_eq!(
            mapper.advance(event("error", json!({"error":{"type":"api_error"}}))),
            Some(MapperStep::Fail("api_error".into()))
        );
        let mut mapper = ChunkMapper::new();
        assert_eq!(
            mapper.advance(event("error", json!({"type":"error"}))),
            Some(MapperStep::Fail(DEFAULT_STREAM_ERROR.into()))
        );
    }

    #[test]
    fn nothing_after_message_stop() {
        let mut mapper = ChunkMapper::new();
        assert_eq!(
            mapper.advance(event("message_stop", json!({}))),
            Some(MapperStep::Finish)
        );
        assert!(mapper.advance(text_delta("late")).is_none());
        assert!(mapper.advance(event("message_stop", json!({}))).is_none());
    }

    #[test]
    fn unknown_events_are_skipped() {
        let mut mapper = ChunkMapper::new();
        assert!(mapper
            .advance(event("citations_delta", json!({"type":"citations_delta"})))
            .is_none());
    }
}
