pub mod stream;

use serde::{Deserialize, Serialize};

/// Inbound chat-completions request body.
///
/// Only `messages` and `max_tokens` are read; every other field an
/// OpenAI-style client sends (`model`, `stream`, `temperature`, ...) is
/// accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

/// One role-tagged message as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> ChatRole {
        ChatRole::from_wire(&self.role)
    }
}

/// Client-side message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Classify a wire role. Anything that is not `system` or `assistant`
    /// is treated as `user`.
    #[must_use]
    pub fn from_wire(role: &str) -> Self {
        match role {
            "system" => ChatRole::System,
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// Delta carried by one client chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkDelta {
    pub role: Option<ChatRole>,
    pub content: Option<String>,
}

/// One client-visible emission, before it is wrapped in the chunk envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

impl OutputChunk {
    /// The opening chunk of a turn: assistant role with empty content.
    #[must_use]
    pub fn role(role: ChatRole) -> Self {
        Self {
            delta: ChunkDelta {
                role: Some(role),
                content: Some(String::new()),
            },
            finish_reason: None,
        }
    }

    #[must_use]
    pub fn content(text: String) -> Self {
        Self {
            delta: ChunkDelta {
                role: None,
                content: Some(text),
            },
            finish_reason: None,
        }
    }

    #[must_use]
    pub fn finish(reason: String) -> Self {
        Self {
            delta: ChunkDelta::default(),
            finish_reason: Some(reason),
        }
    }
}
