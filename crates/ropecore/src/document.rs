//! A rope and its line index edited as one unit.
//!
//! Every edit computes the new line index on a copy first. The rope is only
//! touched once that succeeded, and the copy is committed right after the
//! rope edit, so a failure at any step leaves both halves as they were.

use std::io::Write;

use crate::error::{Result, RopeError};
use crate::line_index::LineIndex;
use crate::memento::Memento;
use crate::rope::{RebalanceStrategy, RopeTree};
use crate::utf8;

#[derive(Debug, Default)]
pub struct Document {
    rope: RopeTree,
    lines: LineIndex,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: RebalanceStrategy) -> Self {
        Self {
            rope: RopeTree::with_strategy(strategy),
            lines: LineIndex::new(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut document = Self::new();
        document.load_bytes(bytes)?;
        Ok(document)
    }

    pub fn rope(&self) -> &RopeTree {
        &self.rope
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn rebalance_strategy(&self) -> RebalanceStrategy {
        self.rope.rebalance_strategy()
    }

    pub fn set_rebalance_strategy(&mut self, strategy: RebalanceStrategy) {
        self.rope.set_rebalance_strategy(strategy);
    }

    pub fn len(&self) -> usize {
        self.rope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.is_empty()
    }

    pub fn insert(&mut self, offset: usize, text: &[u8]) -> Result<()> {
        self.check_offset(offset)?;
        if text.is_empty() {
            return Ok(());
        }
        let mut lines = self.lines.clone();
        lines.apply_insert(offset, text)?;
        self.rope.insert(offset, text)?;
        self.lines = lines;
        Ok(())
    }

    pub fn delete(&mut self, start: usize, len: usize) -> Result<()> {
        self.check_offset(start.saturating_add(len))?;
        if len == 0 {
            return Ok(());
        }
        let mut lines = self.lines.clone();
        lines.apply_delete(start, len)?;
        self.rope.delete(start, len)?;
        self.lines = lines;
        Ok(())
    }

    /// Breaks the line at `offset` by inserting a line feed there.
    pub fn split_line_at(&mut self, offset: usize) -> Result<()> {
        self.insert(offset, b"\n")
    }

    /// Replaces the whole content with `bytes`, chunked for a balanced tree.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut rope = RopeTree::from_bytes(bytes);
        rope.set_rebalance_strategy(self.rope.rebalance_strategy());
        let lines = LineIndex::from_leaves(rope.leaves())?;
        self.rope = rope;
        self.lines = lines;
        log::debug!(
            "Loaded {} bytes, {} lines, rope height {}",
            self.rope.len(),
            self.lines.line_count(),
            self.rope.height()
        );
        Ok(())
    }

    pub fn save_to<W: Write>(&self, sink: W) -> Result<()> {
        self.rope.save(sink)
    }

    pub fn snapshot(&self) -> Result<Memento> {
        Memento::capture(&self.rope, &self.lines)
    }

    /// Swaps in the state held by `memento`. The current rebalance strategy
    /// is kept.
    pub fn restore(&mut self, memento: &Memento) -> Result<()> {
        let (mut rope, lines) = memento.restore()?;
        rope.set_rebalance_strategy(self.rope.rebalance_strategy());
        self.rope = rope;
        self.lines = lines;
        Ok(())
    }

    pub fn full_text(&self) -> Vec<u8> {
        self.rope.to_bytes()
    }

    pub fn line_count(&self) -> usize {
        self.lines.line_count()
    }

    /// Length of `line` including its line feed.
    pub fn line_length(&self, line: usize) -> Result<usize> {
        self.lines.line_len(line)
    }

    /// Length of `line` without its line feed.
    pub fn line_content_length(&self, line: usize) -> Result<usize> {
        let span = self.lines.line(line)?;
        let ends_with_newline = span.len > 0 && self.rope.byte_at(span.end() - 1) == Some(b'\n');
        Ok(if ends_with_newline { span.len - 1 } else { span.len })
    }

    /// Bytes of `line` without its line feed.
    pub fn line_text(&self, line: usize) -> Result<Vec<u8>> {
        let start = self.lines.line_start(line)?;
        let len = self.line_content_length(line)?;
        self.rope.slice(start, start + len)
    }

    pub fn offset_at(&self, line: usize, column: usize) -> Result<usize> {
        self.lines.offset_of(line, column)
    }

    pub fn position_at(&self, offset: usize) -> (usize, usize) {
        self.lines.position_of(offset)
    }

    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        self.rope.byte_at(offset)
    }

    /// Offset just past the codepoint starting at `offset`.
    pub fn next_char_boundary(&self, offset: usize) -> usize {
        match self.rope.byte_at(offset) {
            Some(lead) => (offset + utf8::sequence_len(lead)).min(self.len()),
            None => offset.min(self.len()),
        }
    }

    /// Start of the codepoint that ends at `offset`.
    pub fn prev_char_boundary(&self, offset: usize) -> usize {
        let mut at = offset.min(self.len());
        if at == 0 {
            return 0;
        }
        at -= 1;
        while at > 0 && self.rope.byte_at(at).is_some_and(utf8::is_continuation) {
            at -= 1;
        }
        at
    }

    fn check_offset(&self, offset: usize) -> Result<()> {
        if offset > self.rope.len() {
            return Err(RopeError::OutOfRange {
                offset,
                len: self.rope.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_in_step(document: &Document) {
        let rebuilt = LineIndex::from_leaves(document.rope().leaves()).unwrap();
        assert_eq!(document.lines(), &rebuilt);
        assert!(document.lines().is_consistent(document.len()));
    }

    #[test]
    fn test_new_document_is_one_empty_line() {
        let document = Document::new();
        assert!(document.is_empty());
        assert_eq!(document.line_count(), 1);
        assert_eq!(document.line_length(0).unwrap(), 0);
    }

    #[test]
    fn test_insert_keeps_lines_in_step() {
        let mut document = Document::new();
        document.insert(0, b"Line 1\nLine 3").unwrap();
        document.insert(7, b"Line 2\n").unwrap();
        assert_eq!(document.full_text(), b"Line 1\nLine 2\nLine 3");
        assert_eq!(document.line_count(), 3);
        assert_eq!(document.line_text(1).unwrap(), b"Line 2");
        assert_in_step(&document);
    }

    #[test]
    fn test_delete_joins_lines() {
        let mut document = Document::from_bytes(b"first\nsecond\nthird").unwrap();
        document.delete(5, 8).unwrap();
        assert_eq!(document.full_text(), b"firstthird");
        assert_eq!(document.line_count(), 1);
        assert_in_step(&document);
    }

    #[test]
    fn test_split_line_at() {
        let mut document = Document::from_bytes(b"hello world").unwrap();
        document.split_line_at(5).unwrap();
        assert_eq!(document.line_count(), 2);
        assert_eq!(document.line_text(0).unwrap(), b"hello");
        assert_eq!(document.line_text(1).unwrap(), b" world");
        assert_eq!(document.line_length(0).unwrap(), 6);
        assert_eq!(document.line_content_length(0).unwrap(), 5);
    }

    #[test]
    fn test_failed_edit_changes_nothing() {
        let mut document = Document::from_bytes(b"abc\ndef").unwrap();
        let before = document.lines().clone();
        assert!(document.insert(8, b"x").is_err());
        assert!(document.delete(5, 3).is_err());
        assert_eq!(document.full_text(), b"abc\ndef");
        assert_eq!(document.lines(), &before);
    }

    #[test]
    fn test_offset_position_mapping() {
        let document = Document::from_bytes(b"ab\ncde\n").unwrap();
        assert_eq!(document.offset_at(1, 2).unwrap(), 5);
        assert_eq!(document.position_at(5), (1, 2));
        assert_eq!(document.position_at(7), (2, 0));
        assert!(document.offset_at(3, 0).is_err());
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut document = Document::from_bytes(b"keep me").unwrap();
        let memento = document.snapshot().unwrap();
        document.delete(0, 5).unwrap();
        document.insert(0, b"lost\n").unwrap();
        document.restore(&memento).unwrap();
        assert_eq!(document.full_text(), b"keep me");
        assert_eq!(document.line_count(), 1);
    }

    #[test]
    fn test_restore_keeps_strategy() {
        let mut document = Document::with_strategy(RebalanceStrategy::LegacyChain);
        let memento = document.snapshot().unwrap();
        document.restore(&memento).unwrap();
        assert_eq!(document.rebalance_strategy(), RebalanceStrategy::LegacyChain);
    }

    #[test]
    fn test_legacy_chain_survives_middle_edits_on_large_text() {
        let mut expected = vec![b'a'; 256 * 1024];
        let mut document = Document::with_strategy(RebalanceStrategy::LegacyChain);
        document.load_bytes(&expected).unwrap();
        for i in 0..50 {
            let offset = expected.len() / 2 + i;
            expected.insert(offset, b'x');
            document.insert(offset, b"x").unwrap();
        }
        let start = expected.len() / 2;
        expected.drain(start..start + 10);
        document.delete(start, 10).unwrap();

        assert!(document.rope().height() > 1_000);
        assert_eq!(document.full_text(), expected);
        assert_eq!(document.line_count(), 1);
    }

    #[test]
    fn test_save_streams_text() {
        let text = "a fairly long line that spans several chunks\nand another\n";
        let document = Document::from_bytes(text.as_bytes()).unwrap();
        let mut out = Vec::new();
        document.save_to(&mut out).unwrap();
        assert_eq!(out, text.as_bytes());
        assert_eq!(document.line_count(), 3);
    }

    #[test]
    fn test_char_boundaries() {
        let document = Document::from_bytes("a世b".as_bytes()).unwrap();
        assert_eq!(document.next_char_boundary(0), 1);
        assert_eq!(document.next_char_boundary(1), 4);
        assert_eq!(document.next_char_boundary(5), 5);
        assert_eq!(document.prev_char_boundary(4), 1);
        assert_eq!(document.prev_char_boundary(1), 0);
        assert_eq!(document.prev_char_boundary(0), 0);
    }
}
