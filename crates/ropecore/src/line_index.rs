//! Line number to byte range mapping used for cursor addressing.
//!
//! A line's length includes its terminating `\n`. The index does not watch
//! the rope: every rope edit has to be mirrored here by the caller, which is
//! what [`crate::Document`] does.

use crate::error::{Result, RopeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub len: usize,
}

impl LineSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    lines: Vec<LineSpan>,
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LineIndex {
    /// Index of the empty document: a single `(0, 0)` line.
    pub fn new() -> Self {
        Self {
            lines: vec![LineSpan { start: 0, len: 0 }],
        }
    }

    pub(crate) fn without_lines() -> Self {
        Self { lines: Vec::new() }
    }

    /// Rebuilds the index by scanning leaf bytes for line feeds. The text
    /// after the last `\n` is always recorded, even when empty.
    pub fn from_leaves<'a, I>(leaves: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut index = Self::without_lines();
        let mut start = 0;
        let mut len = 0;
        for leaf in leaves {
            for &byte in leaf {
                len += 1;
                if byte == b'\n' {
                    index.push_line(start, len)?;
                    start += len;
                    len = 0;
                }
            }
        }
        index.push_line(start, len)?;
        Ok(index)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn spans(&self) -> &[LineSpan] {
        &self.lines
    }

    pub fn line(&self, line: usize) -> Result<LineSpan> {
        self.lines
            .get(line)
            .copied()
            .ok_or(RopeError::LineOutOfRange {
                line,
                count: self.lines.len(),
            })
    }

    pub fn line_len(&self, line: usize) -> Result<usize> {
        Ok(self.line(line)?.len)
    }

    pub fn line_start(&self, line: usize) -> Result<usize> {
        Ok(self.line(line)?.start)
    }

    /// Absolute offset of `column` on `line`. The column is not checked
    /// against the line length.
    pub fn offset_of(&self, line: usize, column: usize) -> Result<usize> {
        Ok(self.line_start(line)? + column)
    }

    /// Line and column of `offset`, scanning from the top. The last line is
    /// open ended.
    pub fn position_of(&self, offset: usize) -> (usize, usize) {
        let count = self.lines.len();
        for (i, span) in self.lines.iter().enumerate() {
            let is_last = i + 1 == count;
            if is_last || offset < self.lines[i + 1].start {
                return (i, offset.saturating_sub(span.start));
            }
        }
        (0, offset)
    }

    pub fn push_line(&mut self, start: usize, len: usize) -> Result<()> {
        self.reserve(1)?;
        self.lines.push(LineSpan { start, len });
        Ok(())
    }

    pub fn insert_line(&mut self, at: usize, start: usize, len: usize) -> Result<()> {
        if at > self.lines.len() {
            return Err(RopeError::LineOutOfRange {
                line: at,
                count: self.lines.len(),
            });
        }
        self.reserve(1)?;
        self.lines.insert(at, LineSpan { start, len });
        Ok(())
    }

    /// Removes the record of `line`, shifting the following records down.
    pub fn remove_line(&mut self, line: usize) -> Result<LineSpan> {
        if line >= self.lines.len() {
            return Err(RopeError::LineOutOfRange {
                line,
                count: self.lines.len(),
            });
        }
        Ok(self.lines.remove(line))
    }

    /// Sets the length of `line` and moves the starts of the lines after it.
    pub fn set_line_len(&mut self, line: usize, len: usize) -> Result<()> {
        self.line(line)?;
        self.lines[line].len = len;
        self.restitch(line);
        Ok(())
    }

    /// Mirrors inserting `text` at `offset` into the rope.
    pub fn apply_insert(&mut self, offset: usize, text: &[u8]) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.lines.is_empty() {
            self.push_line(0, 0)?;
        }
        let (line, column) = self.position_of(offset);
        let span = self.lines[line];
        let tail = span.len.saturating_sub(column);

        let pieces: Vec<&[u8]> = text.split(|&byte| byte == b'\n').collect();
        let last = pieces.len() - 1;
        self.reserve(last)?;
        let replacement = pieces.iter().enumerate().map(|(i, piece)| {
            let mut len = piece.len();
            if i == 0 {
                len += column;
            }
            len += if i < last { 1 } else { tail };
            LineSpan {
                start: span.start,
                len,
            }
        });
        self.lines.splice(line..=line, replacement);
        self.restitch(line);
        Ok(())
    }

    /// Mirrors deleting `len` bytes at `start` from the rope.
    pub fn apply_delete(&mut self, start: usize, len: usize) -> Result<()> {
        if len == 0 || self.lines.is_empty() {
            return Ok(());
        }
        let (first, column) = self.position_of(start);
        let (last, end_column) = self.position_of(start + len);
        let merged = column + self.lines[last].len.saturating_sub(end_column);
        self.lines[first].len = merged;
        self.lines.drain(first + 1..=last);
        self.restitch(first);
        Ok(())
    }

    /// Checks `start[i + 1] == start[i] + len[i]` and that the lines cover
    /// exactly `total_len` bytes.
    pub fn is_consistent(&self, total_len: usize) -> bool {
        let Some(first) = self.lines.first() else {
            return false;
        };
        first.start == 0
            && self
                .lines
                .windows(2)
                .all(|pair| pair[1].start == pair[0].end())
            && self.lines.last().map(LineSpan::end) == Some(total_len)
    }

    fn restitch(&mut self, from: usize) {
        for i in from + 1..self.lines.len() {
            self.lines[i].start = self.lines[i - 1].end();
        }
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        self.lines
            .try_reserve(additional)
            .map_err(|_| RopeError::AllocationFailure { what: "line index" })
    }
}
