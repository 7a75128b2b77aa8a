use std::future::Future;
use std::pin::Pin;

use axum::response::Response;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use smallvec::SmallVec;

use crate::error::BridgeError;
use crate::stream::StreamSession;

/// Upstream body as a stream of transport reads.
pub(crate) type UpstreamByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

/// Status and body of an upstream response whose headers have arrived.
pub(crate) struct UpstreamReply {
    pub(crate) status: u16,
    pub(crate) body: UpstreamByteStream,
}

impl UpstreamReply {
    #[must_use]
    pub(crate) fn new(
        status: u16,
        body: impl Stream<Item = Result<Bytes, BridgeError>> + Send + 'static,
    ) -> Self {
        Self {
            status,
            body: Box::pin(body),
        }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<UpstreamReply, BridgeError>> + Send>>;

enum RelayPhase {
    Connecting(ConnectFuture),
    Streaming {
        body: UpstreamByteStream,
        status: u16,
        success: bool,
    },
    Done,
}

struct RelayState {
    phase: RelayPhase,
    session: StreamSession,
    frame_chunks: Vec<Bytes>,
    pending: PendingBytes,
}

/// Build the committed SSE response for one session.
///
/// The upstream call is only started once the body is first polled, i.e.
/// after the response head is on its way to the client. From then on every
/// outcome reaches the client as frames written by the session, and each
/// emitted `Bytes` is one complete frame.
pub(crate) fn relay_response<C>(session: StreamSession, connect: C) -> Response
where
    C: Future<Output = Result<UpstreamReply, BridgeError>> + Send + 'static,
{
    let state = RelayState {
        phase: RelayPhase::Connecting(Box::pin(connect)),
        session,
        frame_chunks: Vec::with_capacity(8),
        pending: PendingBytes::with_capacity(8),
    };

    let output_stream = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.pending.pop_front() {
                return Some((chunk, state));
            }
            match std::mem::replace(&mut state.phase, RelayPhase::Done) {
                RelayPhase::Connecting(connect) => match connect.await {
                    Ok(reply) => {
                        let success = reply.is_success();
                        if !success {
                            tracing::warn!(
                                completion_id = %state.session.completion_id(),
                                status = reply.status,
                                "upstream returned non-success status"
                            );
                        }
                        state.phase = RelayPhase::Streaming {
                            body: reply.body,
                            status: reply.status,
                            success,
                        };
                    }
                    Err(err) => state.session.fail(&err, &mut state.frame_chunks),
                },
                RelayPhase::Streaming {
                    mut body,
                    status,
                    success,
                } => match body.next().await {
                    Some(Ok(bytes)) => {
                        if success {
                            state.session.feed(&bytes, &mut state.frame_chunks);
                        } else if !state.session.buffer_error_body(&bytes) {
                            state
                                .session
                                .finish_error_body(status, &mut state.frame_chunks);
                        }
                        // A finished session drops the body, which closes the upstream call.
                        if !state.session.is_finished() {
                            state.phase = RelayPhase::Streaming {
                                body,
                                status,
                                success,
                            };
                        }
                    }
                    Some(Err(err)) => {
                        if success {
                            state.session.fail(&err, &mut state.frame_chunks);
                        } else {
                            state
                                .session
                                .finish_error_body(status, &mut state.frame_chunks);
                        }
                    }
                    None => {
                        if success {
                            state.session.finish_eof(&mut state.frame_chunks);
                        } else {
                            state
                                .session
                                .finish_error_body(status, &mut state.frame_chunks);
                        }
                    }
                },
                RelayPhase::Done => return None,
            }
            if let Some(chunk) = emit_from_byte_chunks(&mut state.frame_chunks, &mut state.pending)
            {
                return Some((chunk, state));
            }
        }
    });

    let body = axum::body::Body::from_stream(
        output_stream.map(Ok::<Bytes, std::convert::Infallible>),
    );
    sse_ok_response(body)
}

#[inline]
fn emit_from_byte_chunks(frame_chunks: &mut Vec<Bytes>, pending: &mut PendingBytes) -> Option<Bytes> {
    match frame_chunks.len() {
        0 => None,
        1 => frame_chunks.pop(),
        _ => {
            pending.extend_from_bytes(frame_chunks);
            pending.pop_front()
        }
    }
}

fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    headers.insert(
        http::HeaderName::from_static("x-accel-buffering"),
        http::HeaderValue::from_static("no"),
    );
    response
}

/// FIFO of frames produced by one upstream read, drained one per poll.
struct PendingBytes {
    chunks: SmallVec<[Bytes; 8]>,
    head: usize,
}

impl PendingBytes {
    #[inline]
    fn with_capacity(capacity: usize) -> Self {
        let mut chunks = SmallVec::new();
        chunks.reserve(capacity);
        Self { chunks, head: 0 }
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.chunks.len() {
            return None;
        }
        let chunk = std::mem::take(&mut self.chunks[self.head]);
        self.head += 1;
        if self.head == self.chunks.len() {
            self.chunks.clear();
            self.head = 0;
        }
        Some(chunk)
    }

    #[inline]
    fn extend_from_bytes(&mut self, frame_chunks: &mut Vec<Bytes>) {
        self.chunks.extend(frame_chunks.drain(..));
    }
}
