/// Upstream SSE frame reassembly.
///
/// The transport hands over bytes in whatever pieces it likes; frames are only
/// cut from the buffer once their terminating blank line has arrived.
use super::{UpstreamEvent, UpstreamEventType};
use bytes::{Bytes, BytesMut};
use memchr::{memchr_iter, memmem};
use std::sync::LazyLock;

const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// Incremental frame reassembler for one upstream stream.
///
/// Holds every byte not yet claimed by a complete frame. `scan_from` records
/// how much of the buffer is already known not to contain a terminator, so a
/// slow trickle of bytes is not rescanned from the start each time.
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: BytesMut,
    scan_from: usize,
}

impl FrameReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scan_from: 0,
        }
    }

    /// Append raw bytes without parsing anything.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Append raw bytes and collect every event completed by them.
    pub fn feed_into(&mut self, bytes: &[u8], out: &mut Vec<UpstreamEvent>) {
        self.push(bytes);
        while let Some(event) = self.next_event() {
            out.push(event);
        }
    }

    /// Pop the next complete, parseable event. Frames that do not parse are
    /// dropped here; `None` means no complete frame is buffered.
    pub fn next_event(&mut self) -> Option<UpstreamEvent> {
        loop {
            let frame = self.next_frame()?;
            if let Some(event) = parse_frame(&frame) {
                return Some(event);
            }
            tracing::debug!(frame_len = frame.len(), "dropping unparsable upstream frame");
        }
    }

    /// Split the leading complete frame, terminator included, off the buffer.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        match find_frame_terminator_from(&self.buffer, self.scan_from) {
            Some((frame_start, terminator_len)) => {
                let frame = self.buffer.split_to(frame_start + terminator_len).freeze();
                self.scan_from = 0;
                Some(frame)
            }
            None => {
                // Keep a small overlap so a terminator straddling two reads is found.
                self.scan_from = self.buffer.len().saturating_sub(3);
                None
            }
        }
    }

    /// Bytes received but not yet part of a complete frame.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Take every buffered byte, leaving the reassembler empty.
    pub fn take_buffered(&mut self) -> Bytes {
        self.scan_from = 0;
        self.buffer.split().freeze()
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one complete frame into an event.
///
/// Only `event:` and `data:` lines are read; multiple `data:` lines join with
/// `\n`. When no `event:` line is present the payload's `"type"` field names
/// the event. Returns `None` for empty payloads, invalid UTF-8 or JSON, and
/// frames whose type cannot be determined.
#[must_use]
pub fn parse_frame(raw: &[u8]) -> Option<UpstreamEvent> {
    let mut event_name: Option<&str> = None;
    let mut data = String::new();
    let mut has_data = false;
    let mut line_start = 0usize;

    let line_ends = memchr_iter(b'\n', raw).chain(std::iter::once(raw.len()));
    for line_end in line_ends {
        if line_end < line_start {
            continue;
        }
        let mut line = &raw[line_start..line_end];
        line_start = line_end + 1;
        if line.last().copied() == Some(b'\r') {
            line = &line[..line.len() - 1];
        }

        if let Some(value) = line.strip_prefix(b"data:") {
            let value = value.strip_prefix(b" ").unwrap_or(value);
            let value = std::str::from_utf8(value).ok()?;
            if has_data {
                data.push('\n');
            } else {
                has_data = true;
            }
            data.push_str(value);
        } else if let Some(value) = line.strip_prefix(b"event:") {
            let value = value.strip_prefix(b" ").unwrap_or(value);
            event_name = Some(std::str::from_utf8(value).ok()?.trim());
        }
    }

    if data.trim().is_empty() {
        return None;
    }
    let payload: serde_json::Value = serde_json::from_str(&data).ok()?;
    let event_type = match event_name.filter(|name| !name.is_empty()) {
        Some(name) => UpstreamEventType::from_name(name),
        None => UpstreamEventType::from_name(payload.get("type")?.as_str()?),
    };

    Some(UpstreamEvent {
        event_type,
        payload,
    })
}

/// Earliest blank line at or after `scan_from`, as (position, length).
///
/// A blank line is two line breaks in a row, where each break is `\n` or
/// `\r\n`.
#[inline]
fn find_frame_terminator_from(buffer: &[u8], scan_from: usize) -> Option<(usize, usize)> {
    static LF_LF_FINDER: LazyLock<memmem::Finder<'static>> =
        LazyLock::new(|| memmem::Finder::new(b"\n\n"));
    static CRLF_CRLF_FINDER: LazyLock<memmem::Finder<'static>> =
        LazyLock::new(|| memmem::Finder::new(b"\r\n\r\n"));
    static LF_CRLF_FINDER: LazyLock<memmem::Finder<'static>> =
        LazyLock::new(|| memmem::Finder::new(b"\n\r\n"));

    let scan_from = scan_from.min(buffer.len());
    let haystack = &buffer[scan_from..];
    let candidates = [
        (LF_LF_FINDER.find(haystack), 2),
        (CRLF_CRLF_FINDER.find(haystack), 4),
        (LF_CRLF_FINDER.find(haystack), 3),
    ];

    // `\r\n\r\n` contains `\n\r\n` one byte later, so the earliest match wins.
    candidates
        .into_iter()
        .filter_map(|(pos, len)| pos.map(|rel| (scan_from + rel, len)))
        .min_by_key(|&(pos, _)| pos)
}
