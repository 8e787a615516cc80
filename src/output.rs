//! Captured command output.
//!
//! Every command submitted to a run owns an `OutputHistory`: the chunks it
//! produced, in arrival order, closed by an exit marker once it has exited.
//! Histories are keyed by command text, so two handles running the same
//! command share one history.

use strip_ansi_escapes::strip;

/// Indicates the source stream of an output chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Standard Output.
    Stdout,
    /// Standard Error.
    Stderr,
}

/// One entry in a command's output history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    /// A piece of output, as received.
    Text { text: String, stream: StreamKind },
    /// Terminal marker appended when the command exits.
    Exit { exit_code: i32 },
}

/// Ordered output of one command.
#[derive(Debug, Clone, Default)]
pub struct OutputHistory {
    chunks: Vec<OutputChunk>,
}

impl OutputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of output.
    pub fn push_text(&mut self, text: impl Into<String>, stream: StreamKind) {
        self.chunks.push(OutputChunk::Text {
            text: text.into(),
            stream,
        });
    }

    /// Appends the `{exit_code: N}` marker.
    pub fn push_exit(&mut self, exit_code: i32) {
        self.chunks.push(OutputChunk::Exit { exit_code });
    }

    pub fn chunks(&self) -> &[OutputChunk] {
        &self.chunks
    }

    /// Exit code from the most recent marker, if the command has exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.chunks.iter().rev().find_map(|chunk| match chunk {
            OutputChunk::Exit { exit_code } => Some(*exit_code),
            OutputChunk::Text { .. } => None,
        })
    }

    /// Returns an iterator over the text chunks, skipping markers.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().filter_map(|chunk| match chunk {
            OutputChunk::Text { text, .. } => Some(text.as_str()),
            OutputChunk::Exit { .. } => None,
        })
    }

    /// Joins all text chunks with newlines.
    pub fn text(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }

    /// Last `count` text chunks, oldest first.
    pub fn tail(&self, count: usize) -> Vec<&str> {
        let lines: Vec<&str> = self.lines().collect();
        let skip = lines.len().saturating_sub(count);
        lines.into_iter().skip(skip).collect()
    }
}

/// Sanitizes text for display, optionally stripping ANSI escape codes.
///
/// If `strip_ansi` is true, ANSI codes are removed. Invalid UTF-8 sequences are replaced.
pub fn sanitize_text(text: &str, strip_ansi: bool) -> String {
    if !strip_ansi {
        return text.to_string();
    }
    let stripped = strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).to_string()
}
