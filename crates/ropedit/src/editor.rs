use anyhow::{Context, Result};
use ropecore::{Document, History, OverflowPolicy, RebalanceStrategy};
use std::io::Write;

use crate::config::Config;

/// Cursor position as a line and a byte column inside that line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
    /// Column that vertical moves try to return to.
    pub desired_column: usize,
}

pub struct Editor {
    document: Document,
    history: History,
    cursor: Cursor,
    modified: bool,
    // Tab configuration
    tab_size: usize,
    use_spaces: bool,
}

impl Editor {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            history: History::default(),
            cursor: Cursor::default(),
            modified: false,
            tab_size: 4,
            use_spaces: true,
        }
    }

    pub fn with_config(config: &Config) -> Self {
        let mut editor = Self::new();
        editor.set_tab_config(config.editor.tab_size, config.editor.use_spaces);
        editor.set_history_config(config.history.capacity, config.history.overflow);
        editor.set_rebalance_strategy(config.editor.rebalance);
        editor
    }

    pub fn set_tab_config(&mut self, tab_size: usize, use_spaces: bool) {
        self.tab_size = tab_size;
        self.use_spaces = use_spaces;
    }

    /// Replaces the history with an empty one of the given shape.
    pub fn set_history_config(&mut self, capacity: usize, overflow: OverflowPolicy) {
        self.history = History::new(capacity, overflow);
    }

    pub fn set_rebalance_strategy(&mut self, strategy: RebalanceStrategy) {
        self.document.set_rebalance_strategy(strategy);
    }

    /// Loads new content. History and cursor start over.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.document
            .load_bytes(bytes)
            .context("Failed to load content")?;
        self.history.clear();
        self.cursor = Cursor::default();
        self.modified = false;
        Ok(())
    }

    pub fn set_content(&mut self, content: &str) -> Result<()> {
        self.load_bytes(content.as_bytes())
    }

    pub fn get_content(&self) -> String {
        self.document.rope().to_string()
    }

    pub fn content_bytes(&self) -> Vec<u8> {
        self.document.full_text()
    }

    /// Streams the document to `sink` leaf by leaf.
    pub fn write_to<W: Write>(&self, sink: W) -> Result<()> {
        self.document
            .save_to(sink)
            .context("Failed to write document")
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    pub fn line_count(&self) -> usize {
        self.document.line_count()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn cursor_position(&self) -> (usize, usize) {
        (self.cursor.line, self.cursor.column)
    }

    pub fn cursor_offset(&self) -> usize {
        self.document
            .offset_at(self.cursor.line, self.cursor.column)
            .unwrap_or_else(|_| self.document.len())
    }

    /// Moves the cursor, clamping it into the document and onto a
    /// codepoint boundary.
    pub fn set_cursor(&mut self, line: usize, column: usize) {
        self.place_cursor(line, column);
        self.cursor.desired_column = self.cursor.column;
    }

    pub fn insert(&mut self, offset: usize, text: &[u8]) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let cursor = self.cursor_offset();
        self.record_edit(|document| document.insert(offset, text))
            .with_context(|| format!("Failed to insert {} bytes at {}", text.len(), offset))?;
        let cursor = if cursor >= offset {
            cursor + text.len()
        } else {
            cursor
        };
        self.move_to_offset(cursor);
        Ok(())
    }

    pub fn delete(&mut self, offset: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let cursor = self.cursor_offset();
        self.record_edit(|document| document.delete(offset, len))
            .with_context(|| format!("Failed to delete {} bytes at {}", len, offset))?;
        let cursor = if cursor >= offset + len {
            cursor - len
        } else {
            cursor.min(offset)
        };
        self.move_to_offset(cursor);
        Ok(())
    }

    pub fn split_line_at(&mut self, offset: usize) -> Result<()> {
        let cursor = self.cursor_offset();
        self.record_edit(|document| document.split_line_at(offset))
            .with_context(|| format!("Failed to split line at {}", offset))?;
        self.move_to_offset(if cursor >= offset { cursor + 1 } else { cursor });
        Ok(())
    }

    pub fn insert_str(&mut self, text: &str) -> Result<()> {
        self.insert(self.cursor_offset(), text.as_bytes())
    }

    pub fn insert_newline(&mut self) -> Result<()> {
        self.insert_str("\n")
    }

    pub fn insert_tab(&mut self) -> Result<()> {
        if self.use_spaces {
            let spaces = " ".repeat(self.tab_size);
            self.insert_str(&spaces)
        } else {
            self.insert_str("\t")
        }
    }

    /// Removes the codepoint before the cursor. Returns false at the start
    /// of the document.
    pub fn delete_backward(&mut self) -> Result<bool> {
        let offset = self.cursor_offset();
        if offset == 0 {
            return Ok(false);
        }
        let start = self.document.prev_char_boundary(offset);
        self.delete(start, offset - start)?;
        Ok(true)
    }

    /// Removes the codepoint under the cursor. Returns false at the end of
    /// the document.
    pub fn delete_forward(&mut self) -> Result<bool> {
        let offset = self.cursor_offset();
        let end = self.document.next_char_boundary(offset);
        if end == offset {
            return Ok(false);
        }
        self.delete(offset, end - offset)?;
        Ok(true)
    }

    pub fn move_cursor_left(&mut self) {
        let offset = self.cursor_offset();
        if offset > 0 {
            self.move_to_offset(self.document.prev_char_boundary(offset));
        }
    }

    pub fn move_cursor_right(&mut self) {
        let offset = self.cursor_offset();
        self.move_to_offset(self.document.next_char_boundary(offset));
    }

    pub fn move_cursor_up(&mut self) {
        if self.cursor.line > 0 {
            let desired = self.cursor.desired_column;
            self.place_cursor(self.cursor.line - 1, desired);
        }
    }

    pub fn move_cursor_down(&mut self) {
        if self.cursor.line + 1 < self.document.line_count() {
            let desired = self.cursor.desired_column;
            self.place_cursor(self.cursor.line + 1, desired);
        }
    }

    /// Restores the state before the last edit. Returns false when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        if !self.history.can_undo() {
            return Ok(false);
        }
        let current = self.document.snapshot().context("Failed to snapshot document")?;
        let Some(previous) = self.history.undo(current) else {
            return Ok(false);
        };
        self.document
            .restore(&previous)
            .context("Failed to restore snapshot")?;
        self.after_history_move();
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool> {
        if !self.history.can_redo() {
            return Ok(false);
        }
        let current = self.document.snapshot().context("Failed to snapshot document")?;
        let Some(next) = self.history.redo(current) else {
            return Ok(false);
        };
        self.document
            .restore(&next)
            .context("Failed to restore snapshot")?;
        self.after_history_move();
        Ok(true)
    }

    fn record_edit<F>(&mut self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Document) -> ropecore::Result<()>,
    {
        let before = self.document.snapshot()?;
        apply(&mut self.document)?;
        if self.history.record(before).is_some() {
            log::debug!("Undo history full, one snapshot discarded");
        }
        self.modified = true;
        Ok(())
    }

    fn after_history_move(&mut self) {
        let (line, column) = (self.cursor.line, self.cursor.column);
        self.place_cursor(line, column);
        self.modified = true;
    }

    fn move_to_offset(&mut self, offset: usize) {
        let (line, column) = self.document.position_at(offset.min(self.document.len()));
        self.cursor = Cursor {
            line,
            column,
            desired_column: column,
        };
    }

    fn place_cursor(&mut self, line: usize, column: usize) {
        let line = line.min(self.document.line_count().saturating_sub(1));
        let max_column = self.document.line_content_length(line).unwrap_or(0);
        let mut column = column.min(max_column);
        if let Ok(start) = self.document.offset_at(line, 0) {
            while column > 0
                && self
                    .document
                    .byte_at(start + column)
                    .is_some_and(ropecore::utf8::is_continuation)
            {
                column -= 1;
            }
        }
        self.cursor.line = line;
        self.cursor.column = column;
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}
