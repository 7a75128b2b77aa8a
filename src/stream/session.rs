use std::time::Instant;

use bytes::Bytes;

use crate::error::BridgeError;
use crate::observability::log_stream_complete;
use crate::protocol::anthropic::AnthropicErrorEnvelope;
use crate::protocol::openai_chat::stream::{done_frame, ChunkEncoder};
use crate::util::truncate_on_char_boundary;

use super::mapper::{ChunkMapper, MapperStep, StreamUsage};
use super::sse::FrameReassembler;

pub(crate) const MAX_ERROR_MESSAGE_LEN: usize = 500;
pub(crate) const MAX_ERROR_BODY_LEN: usize = 64 * 1024;
const EARLY_EOF_MESSAGE: &str = "upstream stream ended before message_stop";

/// Summary of one client stream, reported when it terminates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub chunks_emitted: usize,
    pub finish_reason: Option<String>,
    pub usage: StreamUsage,
    pub error: Option<String>,
}

/// One client stream: upstream bytes in, client SSE frames out.
///
/// Owns the reassembler, the mapper and the chunk encoder for the stream.
/// Every terminal path (`message_stop`, in-stream error, transport failure,
/// non-success status, early EOF) writes exactly one `[DONE]` frame; after
/// that the session ignores all further input.
#[derive(Debug)]
pub struct StreamSession {
    encoder: ChunkEncoder,
    reassembler: FrameReassembler,
    mapper: ChunkMapper,
    chunks_emitted: usize,
    error: Option<String>,
    finished: bool,
    started: Instant,
}

impl StreamSession {
    #[must_use]
    pub fn new(encoder: ChunkEncoder) -> Self {
        Self {
            encoder,
            reassembler: FrameReassembler::new(),
            mapper: ChunkMapper::new(),
            chunks_emitted: 0,
            error: None,
            finished: false,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn completion_id(&self) -> &str {
        self.encoder.id()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed a piece of a successful upstream body and append the resulting
    /// client frames to `out`.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<Bytes>) {
        if self.finished {
            return;
        }
        self.reassembler.push(bytes);
        while !self.finished {
            let Some(event) = self.reassembler.next_event() else {
                break;
            };
            match self.mapper.advance(event) {
                Some(MapperStep::Chunk(chunk)) => {
                    out.push(self.encoder.encode_chunk(&chunk));
                    self.chunks_emitted += 1;
                }
                Some(MapperStep::Finish) => self.close(out),
                Some(MapperStep::Fail(message)) => self.fail_with_message(&message, None, out),
                None => {}
            }
        }
    }

    /// Buffer a piece of a non-success upstream body without parsing frames.
    ///
    /// Keeps at most 64 KiB. Returns `false` once the cap is reached and no
    /// further reads are wanted.
    #[must_use]
    pub fn buffer_error_body(&mut self, bytes: &[u8]) -> bool {
        if self.finished {
            return false;
        }
        let room = MAX_ERROR_BODY_LEN.saturating_sub(self.reassembler.buffered().len());
        self.reassembler.push(&bytes[..bytes.len().min(room)]);
        self.reassembler.buffered().len() < MAX_ERROR_BODY_LEN
    }

    /// The non-success upstream body is complete: emit its error in-band.
    pub fn finish_error_body(&mut self, status: u16, out: &mut Vec<Bytes>) {
        if self.finished {
            return;
        }
        let body = self.reassembler.take_buffered();
        let err = upstream_status_error(status, &body);
        self.fail(&err, out);
    }

    /// The successful upstream body ended.
    ///
    /// If a finish chunk already went out only the sentinel is missing;
    /// otherwise the stream was cut short and is reported as an error.
    pub fn finish_eof(&mut self, out: &mut Vec<Bytes>) {
        if self.finished {
            return;
        }
        if self.mapper.finish_emitted() {
            tracing::debug!(
                completion_id = %self.encoder.id(),
                "upstream ended without message_stop after finish chunk"
            );
            self.close(out);
        } else {
            self.fail_with_message(EARLY_EOF_MESSAGE, None, out);
        }
    }

    /// Report a failure in-band: one error chunk, then the sentinel.
    pub fn fail(&mut self, err: &BridgeError, out: &mut Vec<Bytes>) {
        self.fail_with_message(&err.to_string(), err.upstream_status(), out);
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            chunks_emitted: self.chunks_emitted,
            finish_reason: self.mapper.finish_reason().map(str::to_string),
            usage: self.mapper.usage(),
            error: self.error.clone(),
        }
    }

    fn fail_with_message(&mut self, message: &str, code: Option<u16>, out: &mut Vec<Bytes>) {
        if self.finished {
            return;
        }
        let message = truncate_on_char_boundary(message, MAX_ERROR_MESSAGE_LEN);
        tracing::warn!(
            completion_id = %self.encoder.id(),
            code = ?code,
            error = %message,
            "upstream stream failed; reporting in-band"
        );
        out.push(self.encoder.encode_error(&message, code));
        self.error = Some(message);
        self.close(out);
    }

    fn close(&mut self, out: &mut Vec<Bytes>) {
        out.push(done_frame());
        self.finished = true;
        log_stream_complete(self.encoder.id(), &self.stats(), self.started.elapsed());
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                completion_id = %self.encoder.id(),
                chunks_emitted = self.chunks_emitted,
                "client stream dropped before completion"
            );
        }
    }
}

/// Build the error for a non-success upstream status from its body.
///
/// Uses the upstream's structured error message when the body carries one,
/// otherwise a generic message naming the status.
pub(crate) fn upstream_status_error(status: u16, body: &[u8]) -> BridgeError {
    let message = serde_json::from_slice::<AnthropicErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
        .map(|message| truncate_on_char_boundary(&message, MAX_ERROR_MESSAGE_LEN))
        .unwrap_or_else(|| format!("upstream returned status {status}"));
    BridgeError::Upstream { status, message }
}
