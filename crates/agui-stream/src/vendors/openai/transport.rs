use crate::errors::SourceError;
use crate::source::{Fragment, SourceId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental server-sent-events decoder. Frames may be split across
/// arbitrary chunk boundaries.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Appends `chunk` and returns every frame it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, terminator)) = frame_end(&self.buf) {
            let raw: Vec<u8> = self.buf.drain(..end + terminator).take(end).collect();
            frames.extend(parse_frame(&raw));
        }
        frames
    }

    /// Flushes a trailing frame left without its blank-line terminator.
    pub fn finish(&mut self) -> Option<SseFrame> {
        parse_frame(&std::mem::take(&mut self.buf))
    }
}

/// Offset and length of the first blank-line terminator (`\n\n` or `\r\n\r\n`).
fn frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    buf.windows(2)
        .enumerate()
        .find_map(|(i, pair)| match pair {
            b"\n\n" => Some((i, 2)),
            b"\r\n" if buf[i + 2..].starts_with(b"\r\n") => Some((i, 4)),
            _ => None,
        })
}

fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        // Lines starting with ':' are comments (keep-alives).
        if line.starts_with(':') {
            continue;
        }
        match line.split_once(':') {
            Some(("event", value)) => event = Some(value.trim_start().to_string()),
            Some(("data", value)) => data.push(value.trim_start()),
            _ => {}
        }
    }
    (event.is_some() || !data.is_empty()).then(|| SseFrame {
        event,
        data: data.join("\n"),
    })
}

/// What one SSE frame of a chat-completions stream means for the fragment stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChunkOutcome {
    /// Text to forward.
    Fragment(Fragment),
    /// Frame carried no text (role preamble, finish chunk, keep-alive).
    Skip,
    /// `[DONE]` sentinel; the stream is complete.
    Done,
}

pub(crate) fn map_chat_frame(
    source_id: &SourceId,
    frame: &SseFrame,
) -> Result<ChunkOutcome, SourceError> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(ChunkOutcome::Skip);
    }
    if data == "[DONE]" {
        return Ok(ChunkOutcome::Done);
    }
    if frame.event.as_deref() == Some("error") && !data.starts_with('{') {
        return Err(SourceError::provider(source_id.clone(), data, None));
    }
    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        SourceError::protocol(source_id.clone(), format!("invalid SSE JSON chunk: {e}"))
    })?;
    map_chat_chunk(source_id, value)
}

pub(crate) fn map_chat_chunk(
    source_id: &SourceId,
    value: serde_json::Value,
) -> Result<ChunkOutcome, SourceError> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .or_else(|| error.as_str())
            .unwrap_or("chat completion stream error");
        return Err(SourceError::provider(source_id.clone(), message, None));
    }

    let content = value
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|v| v.as_str())
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned);

    match content {
        Some(text) => Ok(ChunkOutcome::Fragment(Fragment::text(text).with_raw(value))),
        None => Ok(ChunkOutcome::Skip),
    }
}
