//! Error kinds shared across the engine.
//!
//! Library crates report failures through these plain value types; the CLI
//! maps them to messages and exit codes. Pass-local failures (sandbox
//! timeouts, non-literalisable results) are not errors at all — they are
//! "skip this candidate" verdicts and never surface here.

/// A syntax error from the initial parse or from reparsing spliced output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset of the offending token.
    pub pos: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: u32, message: impl Into<String>) -> Self {
        ParseError {
            pos,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at byte {}: {}", self.pos, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Failures surfaced by the tree substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// Committed (spliced) source no longer parses. The previous substrate
    /// remains valid; staged marks have been discarded.
    ParseAfterRewrite(ParseError),
}

impl std::fmt::Display for RewriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewriteError::ParseAfterRewrite(err) => {
                write!(f, "rewritten source failed to reparse: {err}")
            }
        }
    }
}

impl std::error::Error for RewriteError {}
