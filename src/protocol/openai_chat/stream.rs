use bytes::Bytes;

use crate::util::{push_json_string_escaped, push_u64_decimal};

use super::OutputChunk;

const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";
const ERROR_TYPE: &str = "upstream_error";

/// Terminal sentinel frame written once at the end of every client stream.
#[must_use]
pub fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME)
}

/// Encodes chunks into the client's SSE chunk envelope.
///
/// The id, `created` timestamp and model are fixed at construction so every
/// frame of one stream carries the same values.
#[derive(Debug, Clone)]
pub struct ChunkEncoder {
    id: String,
    model: String,
    created: u64,
}

impl ChunkEncoder {
    #[must_use]
    pub fn new(id: String, model: String, created: u64) -> Self {
        Self { id, model, created }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Encode one chunk as `data: {json}\n\n`.
    #[must_use]
    pub fn encode_chunk(&self, chunk: &OutputChunk) -> Bytes {
        let content_len = chunk.delta.content.as_ref().map_or(0, String::len);
        let mut out = String::with_capacity(160 + self.id.len() + self.model.len() + content_len);
        self.push_prefix(&mut out);
        out.push_str(",\"choices\":[{\"index\":0,\"delta\":{");
        let mut first = true;
        if let Some(role) = chunk.delta.role {
            out.push_str("\"role\":");
            push_json_string_escaped(&mut out, role.as_str());
            first = false;
        }
        if let Some(content) = chunk.delta.content.as_deref() {
            if !first {
                out.push(',');
            }
            out.push_str("\"content\":");
            push_json_string_escaped(&mut out, content);
        }
        out.push_str("},\"finish_reason\":");
        match chunk.finish_reason.as_deref() {
            Some(reason) => push_json_string_escaped(&mut out, reason),
            None => out.push_str("null"),
        }
        out.push_str("}]}\n\n");
        Bytes::from(out)
    }

    /// Encode an in-band error chunk. It carries no choices, so it never adds
    /// a second `finish_reason` to the stream.
    #[must_use]
    pub fn encode_error(&self, message: &str, code: Option<u16>) -> Bytes {
        let mut out = String::with_capacity(160 + self.id.len() + self.model.len() + message.len());
        self.push_prefix(&mut out);
        out.push_str(",\"choices\":[],\"error\":{\"message\":");
        push_json_string_escaped(&mut out, message);
        out.push_str(",\"type\":\"");
        out.push_str(ERROR_TYPE);
        out.push_str("\",\"code\":");
        match code {
            Some(code) => push_u64_decimal(&mut out, u64::from(code)),
            None => out.push_str("null"),
        }
        out.push_str("}}\n\n");
        Bytes::from(out)
    }

    fn push_prefix(&self, out: &mut String) {
        out.push_str("data: {\"id\":");
        push_json_string_escaped(out, &self.id);
        out.push_str(",\"object\":\"chat.completion.chunk\",\"created\":");
        push_u64_decimal(out, self.created);
        out.push_str(",\"model\":");
        push_json_string_escaped(out, &self.model);
    }
}
