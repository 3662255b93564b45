//! Line-addressed view of the original proof-script file.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::types::Position;

/// The original source text, split on `\n` only so that `\r` and every other
/// byte survives slicing untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    path: Option<PathBuf>,
    lines: Vec<String>,
}

impl SourceDocument {
    /// Build a document from in-memory text.
    pub fn from_text(text: &str) -> Self {
        Self {
            path: None,
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    /// Read a document from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut doc = Self::from_text(&text);
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The full text, identical to what was read.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Position just past the last character of the document.
    pub fn end_position(&self) -> Position {
        let last = self.lines.len().saturating_sub(1);
        let len = self.lines.get(last).map(|l| utf16_len(l)).unwrap_or(0);
        Position::new(last as u32, len)
    }

    /// Text between two positions, line breaks preserved.
    ///
    /// Lines past the end of the document are ignored and columns past the
    /// end of a line clamp to the line end.
    pub fn slice(&self, start: Position, end: Position) -> String {
        if end <= start {
            return String::new();
        }
        let line = |idx: u32| self.lines.get(idx as usize).map(String::as_str);

        if start.line == end.line {
            let Some(text) = line(start.line) else {
                return String::new();
            };
            let from = utf16_to_byte(text, start.character);
            let to = utf16_to_byte(text, end.character);
            return text[from..to].to_string();
        }

        let mut out = String::new();
        if let Some(first) = line(start.line) {
            out.push_str(&first[utf16_to_byte(first, start.character)..]);
        }
        for idx in start.line + 1..end.line {
            out.push('\n');
            if let Some(middle) = line(idx) {
                out.push_str(middle);
            }
        }
        if let Some(last) = line(end.line) {
            out.push('\n');
            out.push_str(&last[..utf16_to_byte(last, end.character)]);
        }
        out
    }

    /// Everything before `line`; the context a checker may see for a
    /// theorem starting there.
    pub fn prefix_before_line(&self, line: u32) -> String {
        let end = (line as usize).min(self.lines.len());
        self.lines[..end].join("\n")
    }
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Byte offset of the UTF-16 column `character` in `text`, clamped to the
/// end of the text. A column that falls inside a surrogate pair rounds down.
pub fn utf16_to_byte(text: &str, character: u32) -> usize {
    let mut units = 0u32;
    for (idx, c) in text.char_indices() {
        let next = units + c.len_utf16() as u32;
        if next > character {
            return idx;
        }
        units = next;
    }
    text.len()
}
