//! In-memory store for open documents.
//!
//! The server keeps the full text and host-supplied version of every open
//! document, keyed by URI. A document exists exactly while the host keeps
//! it open: created by `didOpen`, mutated only through
//! [`DocumentStore::apply_change`], removed by `didClose`. Positions are
//! zero-based lines with UTF-16 code-unit columns, the protocol's default
//! position encoding.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors from document lifecycle operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// `open` was called for a URI that is already tracked.
    #[error("document already open: {0}")]
    AlreadyOpen(Url),
    /// A change referenced a URI that is not tracked.
    #[error("unknown document: {0}")]
    Unknown(Url),
}

/// Zero-based line and UTF-16 code-unit column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open span between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// One content change from a `didChange` notification. A change without a
/// range replaces the whole document.
#[derive(Debug, Clone, Deserialize)]
pub struct TextChange {
    #[serde(default)]
    pub range: Option<Range>,
    pub text: String,
}

/// Full text and version of one open document.
///
/// Fields are private; mutation goes through the store so the version
/// cannot drift from the host's view.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    version: i32,
    /// Byte offset of each line start; rebuilt on every change.
    line_starts: Vec<usize>,
}

impl Document {
    #[must_use]
    pub fn new(text: String, version: i32) -> Self {
        let line_starts = line_starts(&text);
        Self {
            text,
            version,
            line_starts,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Host-supplied synchronization version.
    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Byte offset of a position, clamped to the position's line content
    /// (a column past the end of the line stops before the terminator).
    #[must_use]
    pub fn offset_at(&self, position: Position) -> usize {
        let Some(&start) = self.line_starts.get(position.line as usize) else {
            return self.text.len();
        };
        let end = self.line_content_end(position.line as usize);
        start + utf16_col_to_byte(&self.text[start..end], position.character)
    }

    /// Position of a byte offset. The offset must lie on a character
    /// boundary; offsets past the end clamp to the final position.
    #[must_use]
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let character = self.text[start..offset].encode_utf16().count() as u32;
        Position {
            line: line as u32,
            character,
        }
    }

    /// Text of the position's line from column zero up to the position.
    /// An out-of-bounds line yields `""`; an overshooting column clamps to
    /// the end of the line.
    #[must_use]
    pub fn line_up_to(&self, position: Position) -> &str {
        let Some(&start) = self.line_starts.get(position.line as usize) else {
            return "";
        };
        let line = &self.text[start..self.line_content_end(position.line as usize)];
        &line[..utf16_col_to_byte(line, position.character)]
    }

    fn apply(&mut self, changes: Vec<TextChange>, version: i32) {
        for change in changes {
            match change.range {
                Some(range) => {
                    let start = self.offset_at(range.start);
                    let end = self.offset_at(range.end).max(start);
                    self.text.replace_range(start..end, &change.text);
                }
                None => self.text = change.text,
            }
            self.line_starts = line_starts(&self.text);
        }
        self.version = version;
    }

    /// End of the line's content, excluding its terminator.
    fn line_content_end(&self, line: usize) -> usize {
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        start + self.text[start..end].trim_end_matches(['\n', '\r']).len()
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

/// Byte offset within `line` of the given UTF-16 column, clamped to the
/// line's end. A column landing inside a surrogate pair resolves to the
/// next character boundary.
fn utf16_col_to_byte(line: &str, character: u32) -> usize {
    let mut units: u32 = 0;
    for (idx, ch) in line.char_indices() {
        if units >= character {
            return idx;
        }
        units += ch.len_utf16() as u32;
    }
    line.len()
}

/// All open documents, keyed by URI.
#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: HashMap<Url, Document>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened document.
    pub fn open(&mut self, uri: Url, text: String, version: i32) -> Result<(), DocumentError> {
        match self.docs.entry(uri) {
            Entry::Occupied(entry) => Err(DocumentError::AlreadyOpen(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(Document::new(text, version));
                Ok(())
            }
        }
    }

    /// Apply a batch of content changes in order. This is the sole
    /// mutation path for document text.
    pub fn apply_change(
        &mut self,
        uri: &Url,
        changes: Vec<TextChange>,
        version: i32,
    ) -> Result<(), DocumentError> {
        let doc = self
            .docs
            .get_mut(uri)
            .ok_or_else(|| DocumentError::Unknown(uri.clone()))?;
        doc.apply(changes, version);
        Ok(())
    }

    /// Stop tracking a document. Returns whether it was open.
    pub fn close(&mut self, uri: &Url) -> bool {
        self.docs.remove(uri).is_some()
    }

    #[must_use]
    pub fn get(&self, uri: &Url) -> Option<&Document> {
        self.docs.get(uri)
    }

    /// Line text up to a position, or `""` when the document (or line) is
    /// not there. Classifier input only; lookups never fail.
    #[must_use]
    pub fn line_up_to(&self, uri: &Url, position: Position) -> &str {
        self.docs
            .get(uri)
            .map(|doc| doc.line_up_to(position))
            .unwrap_or("")
    }

    /// URIs of all open documents.
    pub fn uris(&self) -> impl Iterator<Item = &Url> {
        self.docs.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
