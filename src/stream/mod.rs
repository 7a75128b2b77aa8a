pub mod mapper;
pub mod session;
pub mod sse;

pub use mapper::{ChunkMapper, MapperStep, StreamUsage};
pub use session::{SessionStats, StreamSession};
pub use sse::{parse_frame, FrameReassembler};

/// Named event types of the upstream Messages stream.
///
/// Unrecognized names are kept in [`UpstreamEventType::Other`] so new
/// upstream events flow through the mapper and get skipped there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEventType {
    MessageStart,
    ContentBlockStart,
    ContentBlockDelta,
    ContentBlockStop,
    MessageDelta,
    MessageStop,
    Ping,
    Error,
    Other(String),
}

impl UpstreamEventType {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "message_start" => Self::MessageStart,
            "content_block_start" => Self::ContentBlockStart,
            "content_block_delta" => Self::ContentBlockDelta,
            "content_block_stop" => Self::ContentBlockStop,
            "message_delta" => Self::MessageDelta,
            "message_stop" => Self::MessageStop,
            "ping" => Self::Ping,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MessageStart => "message_start",
            Self::ContentBlockStart => "content_block_start",
            Self::ContentBlockDelta => "content_block_delta",
            Self::ContentBlockStop => "content_block_stop",
            Self::MessageDelta => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Ping => "ping",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }
}

/// One fully reassembled upstream frame.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamEvent {
    pub event_type: UpstreamEventType,
    pub payload: serde_json::Value,
}
