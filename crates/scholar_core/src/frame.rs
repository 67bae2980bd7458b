//! Incremental decoder for the job progress stream.
//!
//! The wire format is a sequence of `data: <json>` blocks separated by a blank
//! line, with either `\n` or `\r\n` line endings. Fragments arrive with arbitrary split points, so the decoder keeps the
//! unterminated tail between calls and only emits a frame once its delimiter
//! has been seen.

use engine_logging::engine_warn;
use serde::Deserialize;

pub const FRAME_PREFIX: &str = "data:";
pub const FRAME_DELIMITER: &[u8] = b"\n\n";
const CRLF_DELIMITER: &[u8] = b"\n\r\n";
/// `llm_output` value that opens a generation block.
pub const GENERATION_BEGIN: &str = "$=~=$start$=~=$";
/// `llm_output` value that closes a generation block.
pub const GENERATION_END: &str = "$=~=$end$=~=$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenMarker {
    Begin,
    Content(String),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameMetadata {
    /// Workspace path as reported by the server (may be tenant-scoped).
    pub workspace: Option<String>,
    pub base_name: Option<String>,
    pub translation_exists: Option<bool>,
}

impl FrameMetadata {
    pub fn is_empty(&self) -> bool {
        self.workspace.is_none() && self.base_name.is_none() && self.translation_exists.is_none()
    }
}

/// One decoded frame. A single payload may carry several parts at once
/// (e.g. a status line together with the base file name).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamFrame {
    pub status: Option<String>,
    pub token: Option<TokenMarker>,
    pub metadata: FrameMetadata,
    pub error: Option<String>,
}

impl StreamFrame {
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            status: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn token(marker: TokenMarker) -> Self {
        Self {
            token: Some(marker),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    status: Option<String>,
    llm_output: Option<String>,
    dir_name: Option<String>,
    base_file_name: Option<String>,
    translation_exists: Option<bool>,
    error: Option<String>,
}

impl From<RawPayload> for StreamFrame {
    fn from(raw: RawPayload) -> Self {
        let token = raw
            .llm_output
            .filter(|value| !value.is_empty())
            .map(|value| match value.as_str() {
                GENERATION_BEGIN => TokenMarker::Begin,
                GENERATION_END => TokenMarker::End,
                _ => TokenMarker::Content(value),
            });
        Self {
            status: raw.status.filter(|s| !s.is_empty()),
            token,
            metadata: FrameMetadata {
                workspace: raw.dir_name.filter(|s| !s.is_empty()),
                base_name: raw.base_file_name.filter(|s| !s.is_empty()),
                translation_exists: raw.translation_exists,
            },
            error: raw.error.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
    dropped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment and returns every frame completed by it.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamFrame> {
        self.carry.extend_from_slice(fragment);
        let mut frames = Vec::new();
        while let Some((idx, len)) = find_delimiter(&self.carry) {
            let block: Vec<u8> = self.carry.drain(..idx + len).collect();
            if let Some(frame) = self.decode_block(&block[..idx]) {
                frames.push(frame);
            }
        }
        frames
    }

    pub fn push_str(&mut self, fragment: &str) -> Vec<StreamFrame> {
        self.push(fragment.as_bytes())
    }

    /// Flushes the trailing block once the transport has closed.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let block = std::mem::take(&mut self.carry);
        self.decode_block(&block).into_iter().collect()
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }

    /// Number of malformed blocks dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn decode_block(&mut self, block: &[u8]) -> Option<StreamFrame> {
        let text = match std::str::from_utf8(block) {
            Ok(text) => text,
            Err(err) => {
                self.dropped += 1;
                engine_warn!("Dropping frame with invalid utf-8: {}", err);
                return None;
            }
        };
        if text.trim().is_empty() {
            return None;
        }

        let mut payload: Option<String> = None;
        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let Some(rest) = line.strip_prefix(FRAME_PREFIX) else {
                continue;
            };
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match payload.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(rest);
                }
                None => payload = Some(rest.to_string()),
            }
        }

        let Some(payload) = payload else {
            engine_warn!("Ignoring block without data line ({} bytes)", block.len());
            return None;
        };

        match serde_json::from_str::<RawPayload>(&payload) {
            Ok(raw) => Some(raw.into()),
            Err(err) => {
                self.dropped += 1;
                engine_warn!("Dropping malformed frame: {} (payload_len={})", err, payload.len());
                None
            }
        }
    }
}

/// Position and length of the first blank-line separator. A block ending in
/// `\r` keeps it; line parsing strips it.
fn find_delimiter(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|idx| {
        let rest = &buffer[idx..];
        if rest.starts_with(FRAME_DELIMITER) {
            Some((idx, FRAME_DELIMITER.len()))
        } else if rest.starts_with(CRLF_DELIMITER) {
            Some((idx, CRLF_DELIMITER.len()))
        } else {
            None
        }
    })
}

/// Decodes a complete body in one call, flushing the tail.
pub fn decode_all(text: &str) -> Vec<StreamFrame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push_str(text);
    frames.extend(decoder.finish());
    frames
}
