//! Server-sent event framing for streamed completions.

/// Payload carried by one SSE line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseData<'a> {
    Json(&'a str),
    Done,
}

/// Extract the `data:` payload of a line. Comments, blank lines and other
/// fields yield `None`.
#[must_use]
pub fn parse_sse_data(line: &str) -> Option<SseData<'_>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    if data.is_empty() {
        return None;
    }
    Some(SseData::Json(data))
}

/// Reassembles lines from arbitrarily split byte chunks.
///
/// Bytes are buffered until a newline arrives, so multi-byte characters
/// split across chunks decode intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every line completed by them, trimmed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// Remaining partial line once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}
