pub mod encoder;

use serde::{Deserialize, Serialize};

/// Anthropic Messages API streaming request wire type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
}

/// Upstream turn role; the Messages API only knows these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    User,
    Assistant,
}

/// Anthropic message wire type. Content is always plain text here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: String,
}

/// `message_start` payload; only usage is read from it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageStartPayload {
    #[serde(default)]
    pub message: MessageStartBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageStartBody {
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// `content_block_delta` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlockDeltaPayload {
    pub delta: ContentDelta,
}

/// Content delta body. Non-text delta kinds (`input_json_delta`,
/// `thinking_delta`, ...) deserialize with an empty `text`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentDelta {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl ContentDelta {
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.kind == "text_delta"
    }
}

/// `message_delta` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDeltaPayload {
    #[serde(default)]
    pub delta: MessageDeltaBody,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDeltaBody {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Token usage as reported by the upstream. Either side may be absent.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

/// Error envelope used both for non-success bodies and the in-stream
/// `error` event: `{"type":"error","error":{"type":"...","message":"..."}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorEnvelope {
    pub error: AnthropicErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorBody {
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_absent_system() {
        let req = AnthropicRequest {
            model: "claude-test".into(),
            max_tokens: 16,
            stream: true,
            system: None,
            messages: vec![AnthropicMessage {
                role: AnthropicRole::User,
                content: "Hi".into(),
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "claude-test",
                "max_tokens": 16,
                "stream": true,
                "messages": [{"role": "user", "content": "Hi"}]
            })
        );
    }

    #[test]
    fn non_text_delta_is_not_text() {
        let payload: ContentBlockDeltaPayload = serde_json::from_value(serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "input_json_delta", "partial_json": "{\"a\""}
        }))
        .unwrap();
        assert!(!payload.delta.is_text());
        assert!(payload.delta.text.is_empty());
    }

    #[test]
    fn error_envelope_tolerates_missing_fields() {
        let env: AnthropicErrorEnvelope =
            serde_json::from_str(r#"{"type":"error","error":{}}"#).unwrap();
        assert!(env.error.message.is_none());
        assert!(env.error.type_.is_none());
    }
}
