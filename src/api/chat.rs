use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use crate::api::streaming::{relay_response, UpstreamReply};
use crate::error::BridgeError;
use crate::protocol::anthropic::encoder::{encode_anthropic_request, TranslateDefaults};
use crate::protocol::openai_chat::stream::ChunkEncoder;
use crate::protocol::openai_chat::ChatCompletionRequest;
use crate::state::AppState;
use crate::stream::StreamSession;
use crate::util::unix_now_secs;

/// `POST /v1/chat/completions`.
///
/// Auth, parse and translation failures are answered with a status-coded
/// JSON error. Once translation succeeds the SSE response commits and the
/// upstream call runs inside the response body.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Response {
    match handler_inner(state, &headers, &body) {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting chat request before streaming");
            err.into_response()
        }
    }
}

fn handler_inner(
    state: Arc<AppState>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, BridgeError> {
    state.authenticate(headers)?;

    let request: ChatCompletionRequest = serde_json::from_slice(body)
        .map_err(|err| BridgeError::Validation(format!("invalid request body: {err}")))?;
    let upstream_request = encode_anthropic_request(
        request,
        TranslateDefaults {
            model: state.upstream.model(),
            default_max_tokens: state.upstream.default_max_tokens(),
        },
    )?;
    let upstream_body = serde_json::to_vec(&upstream_request)
        .map(bytes::Bytes::from)
        .map_err(|err| BridgeError::Internal(format!("failed to encode upstream request: {err}")))?;

    let encoder = ChunkEncoder::new(
        state.next_completion_id(),
        state.upstream.model().to_string(),
        unix_now_secs(),
    );
    tracing::info!(
        completion_id = %encoder.id(),
        turns = upstream_request.messages.len(),
        has_system = upstream_request.system.is_some(),
        max_tokens = upstream_request.max_tokens,
        "chat stream accepted"
    );
    let session = StreamSession::new(encoder);

    Ok(relay_response(session, open_upstream(state, upstream_body)))
}

async fn open_upstream(
    state: Arc<AppState>,
    upstream_body: bytes::Bytes,
) -> Result<UpstreamReply, BridgeError> {
    let response = state
        .transport
        .send_stream(
            state.upstream.messages_url(),
            state.upstream.static_headers(),
            upstream_body,
        )
        .await?;

    let status = response.status().as_u16();
    let transport = state.transport.clone();
    let body = response
        .bytes_stream()
        .map(move |read| read.map_err(|err| transport.transport_error(&err)));
    Ok(UpstreamReply::new(status, body))
}
