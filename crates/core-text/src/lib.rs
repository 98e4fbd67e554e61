//! Rope-based document buffer.
//!
//! Stores schedule documents for the in-memory editor model. Line access is
//! terminator-agnostic: [`Buffer::line_text`] strips `\n` / `\r\n`, which is
//! the view the duration engine expects.

use anyhow::Result;
use ropey::Rope;

/// A text buffer backed by a `ropey::Rope`.
#[derive(Clone)]
pub struct Buffer {
    rope: Rope,
    pub name: String,
}

/// A position inside a buffer expressed as (line index, byte offset within that line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub byte: usize,
}

impl Position {
    pub fn new(line: usize, byte: usize) -> Self {
        Self { line, byte }
    }
    pub fn origin() -> Self {
        Self { line: 0, byte: 0 }
    }
    /// Clamp into a document of `line_count` lines whose line lengths are
    /// reported by `line_len_fn`.
    pub fn clamp_to<F>(&mut self, line_count: usize, mut line_len_fn: F)
    where
        F: FnMut(usize) -> usize,
    {
        if line_count == 0 {
            self.line = 0;
            self.byte = 0;
            return;
        }
        if self.line >= line_count {
            self.line = line_count - 1;
            self.byte = line_len_fn(self.line);
            return;
        }
        let max_len = line_len_fn(self.line);
        if self.byte > max_len {
            self.byte = max_len;
        }
    }
}

impl Buffer {
    /// Construct a buffer from an in-memory string slice.
    pub fn from_str(name: impl Into<String>, content: &str) -> Result<Self> {
        Ok(Self {
            rope: Rope::from_str(content),
            name: name.into(),
        })
    }

    /// Total number of lines in the buffer. A trailing newline opens one
    /// final empty line (`"a\n"` has two lines).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Return the requested line as an owned `String` (including trailing newline if present).
    pub fn line(&self, idx: usize) -> Option<String> {
        if idx < self.rope.len_lines() {
            Some(self.rope.line(idx).to_string())
        } else {
            None
        }
    }

    /// Line contents without the `\n` or `\r\n` terminator.
    pub fn line_text(&self, idx: usize) -> Option<String> {
        let mut s = self.line(idx)?;
        if s.ends_with('\n') {
            s.pop();
            if s.ends_with('\r') {
                s.pop();
            }
        }
        Some(s)
    }

    /// Byte length of a line excluding its terminator.
    pub fn line_byte_len(&self, idx: usize) -> usize {
        self.line_text(idx).map_or(0, |s| s.len())
    }

    /// Insert `text` at `pos`. The position is clamped into the buffer first,
    /// so a line index past the end appends at the end of the last line.
    /// Returns the clamped position the text was inserted at.
    pub fn insert_text(&mut self, pos: Position, text: &str) -> Position {
        let mut at = pos;
        let line_count = self.line_count();
        at.clamp_to(line_count, |l| self.line_byte_len(l));
        let line_start = self.rope.line_to_byte(at.line);
        let mut byte = line_start + at.byte;
        // Byte offsets from callers are expected on char boundaries; snap back if not.
        while byte > line_start && self.rope.byte_to_char(byte) == self.rope.byte_to_char(byte - 1)
        {
            byte -= 1;
        }
        let char_index = self.rope.byte_to_char(byte);
        self.rope.insert(char_index, text);
        at.byte = byte - line_start;
        at
    }

    /// Insert a newline at the given position, splitting the line there.
    pub fn insert_newline(&mut self, pos: Position) -> Position {
        self.insert_text(pos, "\n")
    }

    /// Full buffer contents.
    pub fn contents(&self) -> String {
        self.rope.to_string()
    }
}
