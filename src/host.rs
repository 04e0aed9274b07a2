//! Capabilities the engine needs from its host editor.
//!
//! Commands only talk to a document and a notifier through these traits, so
//! any editor (or the CLI's file adapter) can drive them.

use std::cell::RefCell;

/// Zero-based line and byte column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

/// Read and write access to the active document.
pub trait DocumentAccess {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
    fn selection(&self) -> String;
    /// Start and end of the selection, in document order.
    fn selection_bounds(&self) -> (Position, Position);
    fn replace_selection(&mut self, replacement: &str);
    fn cursor(&self) -> Position;
    fn set_cursor(&mut self, position: Position);
    fn replace_range(&mut self, replacement: &str, from: Position, to: Position);
}

/// User-facing status messages.
pub trait Notifier {
    fn notify(&self, message: &str);
}

/// Reports messages through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Keeps every message; handy for tests and batch runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

/// Converts a position to a byte offset, clamping to the text.
pub fn offset_of(text: &str, position: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..position.line {
        match text[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return text.len(),
        }
    }
    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |i| line_start + i);
    let mut offset = (line_start + position.ch).min(line_end);
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Converts a byte offset to a position.
pub fn position_of(text: &str, offset: usize) -> Position {
    let offset = offset.min(text.len());
    let before = &text[..offset];
    let line = before.matches('\n').count();
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    Position::new(line, offset - line_start)
}

/// An in-memory document with a selection.
///
/// The selection runs from `anchor` to `head`; the cursor is the head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferDocument {
    text: String,
    anchor: usize,
    head: usize,
}

impl BufferDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            anchor: 0,
            head: 0,
        }
    }

    /// Selects the byte range `start..end`.
    pub fn select(&mut self, start: usize, end: usize) {
        self.anchor = self.clamp(start);
        self.head = self.clamp(end);
    }

    pub fn select_all(&mut self) {
        self.select(0, self.text.len());
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn clamp(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }

    fn selection_range(&self) -> (usize, usize) {
        (self.anchor.min(self.head), self.anchor.max(self.head))
    }
}

impl DocumentAccess for BufferDocument {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.anchor = self.clamp(self.anchor);
        self.head = self.clamp(self.head);
    }

    fn selection(&self) -> String {
        let (start, end) = self.selection_range();
        self.text[start..end].to_string()
    }

    fn selection_bounds(&self) -> (Position, Position) {
        let (start, end) = self.selection_range();
        (position_of(&self.text, start), position_of(&self.text, end))
    }

    fn replace_selection(&mut self, replacement: &str) {
        let (start, end) = self.selection_range();
        self.text.replace_range(start..end, replacement);
        self.anchor = start + replacement.len();
        self.head = self.anchor;
    }

    fn cursor(&self) -> Position {
        position_of(&self.text, self.head)
    }

    fn set_cursor(&mut self, position: Position) {
        let offset = offset_of(&self.text, position);
        self.anchor = offset;
        self.head = offset;
    }

    fn replace_range(&mut self, replacement: &str, from: Position, to: Position) {
        let start = offset_of(&self.text, from);
        let end = offset_of(&self.text, to).max(start);
        self.text.replace_range(start..end, replacement);
        let cursor = self.head;
        self.head = if cursor >= end {
            cursor - (end - start) + replacement.len()
        } else {
            cursor.min(start)
        };
        self.anchor = self.head;
    }
}
