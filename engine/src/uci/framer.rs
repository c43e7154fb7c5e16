//! Splits raw engine output chunks into complete lines.

/// How a chunk that contains no newline at all is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FramePolicy {
    /// Keep the bytes as a pending fragment until a later chunk ends the line.
    #[default]
    Buffered,
    /// Emit pending fragment plus the whole chunk as one line right away.
    ///
    /// Compatibility mode for callers that depend on the older behaviour. A line
    /// that arrives split over several reads is decoded as several broken lines.
    ChunkAsLine,
}

/// Buffers output bytes and hands out newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    policy: FramePolicy,
    buffer: Vec<u8>,
    /// Bytes at the front of `buffer` already handed out as lines.
    consumed: usize,
}

impl LineFramer {
    pub fn new(policy: FramePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> FramePolicy {
        self.policy
    }

    /// Append a chunk and iterate over the lines it completes.
    ///
    /// Lines are produced lazily; whatever the iterator does not yield stays
    /// buffered for the next call. Trailing `\r` is stripped and invalid UTF-8
    /// is replaced rather than rejected.
    pub fn feed(&mut self, chunk: &[u8]) -> FramedLines<'_> {
        self.compact();
        self.buffer.extend_from_slice(chunk);
        if self.policy == FramePolicy::ChunkAsLine && !chunk.is_empty() && !chunk.contains(&b'\n')
        {
            self.buffer.push(b'\n');
        }
        FramedLines { framer: self }
    }

    /// Length of the partial line waiting for its newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    /// Drop the partial line, returning it if there was one.
    pub fn take_pending(&mut self) -> Option<String> {
        self.compact();
        if self.buffer.is_empty() {
            return None;
        }
        let pending = std::mem::take(&mut self.buffer);
        Some(decode_line(&pending))
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    fn next_line(&mut self) -> Option<String> {
        let rest = &self.buffer[self.consumed..];
        let end = rest.iter().position(|&b| b == b'\n')?;
        let line = decode_line(&rest[..end]);
        self.consumed += end + 1;
        Some(line)
    }
}

/// Iterator over the complete lines available after a [`LineFramer::feed`].
#[derive(Debug)]
pub struct FramedLines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for FramedLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.framer.next_line()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
