//! Snapshots of a document state.
//!
//! The tree is written as a pre-order token stream:
//!
//! ```text
//! leaf      = "L " rank " " data " "
//! internal  = "I " rank " " node node
//! absent    = "# "
//! ```
//!
//! A leaf's payload is read back by its rank, so it may contain spaces or
//! newlines. The line index uses a little-endian binary layout: a `u32`
//! line count followed by one `(i32 start, u32 len)` record per line.

use crate::error::{Result, RopeError};
use crate::line_index::LineIndex;
use crate::node::{Link, Node};
use crate::rope::{RebalanceStrategy, RopeTree};

const LINE_HEADER: usize = 4;
const LINE_RECORD: usize = 8;

/// An immutable capture of a rope and its line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memento {
    tree: Box<[u8]>,
    lines: Box<[u8]>,
}

impl Memento {
    pub fn capture(tree: &RopeTree, lines: &LineIndex) -> Result<Self> {
        Ok(Self {
            tree: serialize(tree).into_boxed_slice(),
            lines: serialize_lines(lines)?.into_boxed_slice(),
        })
    }

    /// Rebuilds the captured state. The line index is checked against the
    /// restored text before anything is handed back.
    pub fn restore(&self) -> Result<(RopeTree, LineIndex)> {
        let tree = deserialize(&self.tree)?;
        let lines = deserialize_lines(&self.lines)?;
        if !lines.is_consistent(tree.len()) {
            return Err(RopeError::malformed(
                0,
                format!("line index does not cover {} bytes", tree.len()),
            ));
        }
        Ok((tree, lines))
    }

    pub fn tree_bytes(&self) -> &[u8] {
        &self.tree
    }

    pub fn line_bytes(&self) -> &[u8] {
        &self.lines
    }

    /// Bytes held by this snapshot.
    pub fn size(&self) -> usize {
        self.tree.len() + self.lines.len()
    }
}

pub fn serialize(tree: &RopeTree) -> Vec<u8> {
    let mut out = Vec::with_capacity(tree.len() + 4 * tree.node_count() + 2);
    let mut pending: Vec<Option<&Node>> = vec![tree.root()];
    while let Some(entry) = pending.pop() {
        match entry {
            None => out.extend_from_slice(b"# "),
            Some(Node::Leaf { data }) => {
                write_header(&mut out, b'L', data.len());
                out.extend_from_slice(data);
                out.push(b' ');
            }
            Some(Node::Internal { rank, left, right }) => {
                write_header(&mut out, b'I', *rank);
                pending.push(right.as_deref());
                pending.push(left.as_deref());
            }
        }
    }
    out
}

fn write_header(out: &mut Vec<u8>, tag: u8, rank: usize) {
    out.push(tag);
    out.push(b' ');
    out.extend_from_slice(rank.to_string().as_bytes());
    out.push(b' ');
}

/// Parses a tree written by [`serialize`]. Internal ranks must match the
/// length of their left subtree and no bytes may follow the root.
pub fn deserialize(bytes: &[u8]) -> Result<RopeTree> {
    let root = Parser::new(bytes).parse()?;
    Ok(RopeTree::from_root(root, RebalanceStrategy::default()))
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

/// An internal node waiting for its children.
struct Pending {
    rank: usize,
    at: usize,
    left: Option<(Link, usize)>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(mut self) -> Result<Link> {
        let mut stack: Vec<Pending> = Vec::new();
        loop {
            let at = self.pos;
            let (mut node, mut len) = match self.byte()? {
                b'#' => {
                    self.expect_space()?;
                    (None, 0)
                }
                b'L' => {
                    self.expect_space()?;
                    let rank = self.number()?;
                    if rank == 0 {
                        return Err(RopeError::malformed(at, "empty leaf"));
                    }
                    let data = self.take(rank)?.to_vec();
                    self.expect_space()?;
                    (Some(Box::new(Node::Leaf { data })), rank)
                }
                b'I' => {
                    self.expect_space()?;
                    let rank = self.number()?;
                    stack.push(Pending {
                        rank,
                        at,
                        left: None,
                    });
                    continue;
                }
                other => {
                    return Err(RopeError::malformed(
                        at,
                        format!("unexpected tag {:?}", other as char),
                    ))
                }
            };

            // Hang the finished subtree on its parent, closing every parent
            // whose right child this completes.
            loop {
                let Some(mut parent) = stack.pop() else {
                    if self.pos != self.input.len() {
                        return Err(RopeError::malformed(self.pos, "trailing bytes after root"));
                    }
                    return Ok(node);
                };
                match parent.left.take() {
                    None => {
                        if len != parent.rank {
                            return Err(RopeError::malformed(
                                parent.at,
                                format!(
                                    "rank {} does not match left subtree length {}",
                                    parent.rank, len
                                ),
                            ));
                        }
                        parent.left = Some((node, len));
                        stack.push(parent);
                        break;
                    }
                    Some((left, left_len)) => {
                        if left.is_none() && node.is_none() {
                            return Err(RopeError::malformed(
                                parent.at,
                                "internal node without children",
                            ));
                        }
                        node = Some(Box::new(Node::Internal {
                            rank: parent.rank,
                            left,
                            right: node,
                        }));
                        len += left_len;
                    }
                }
            }
        }
    }

    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| RopeError::malformed(self.pos, "unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect_space(&mut self) -> Result<()> {
        let at = self.pos;
        match self.byte()? {
            b' ' => Ok(()),
            other => Err(RopeError::malformed(
                at,
                format!("expected space, found {:?}", other as char),
            )),
        }
    }

    /// Reads decimal digits up to and including the separating space.
    fn number(&mut self) -> Result<usize> {
        let start = self.pos;
        let mut value: usize = 0;
        loop {
            let at = self.pos;
            match self.byte()? {
                b' ' if at > start => return Ok(value),
                digit @ b'0'..=b'9' => {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(usize::from(digit - b'0')))
                        .ok_or_else(|| RopeError::malformed(start, "rank overflows"))?;
                }
                other => {
                    return Err(RopeError::malformed(
                        at,
                        format!("expected digit, found {:?}", other as char),
                    ))
                }
            }
        }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| RopeError::malformed(self.pos, "leaf payload runs past the end"))?;
        let slice = &self.input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

pub fn serialize_lines(lines: &LineIndex) -> Result<Vec<u8>> {
    let spans = lines.spans();
    let count = u32::try_from(spans.len()).map_err(|_| RopeError::LineOutOfRange {
        line: spans.len(),
        count: u32::MAX as usize,
    })?;
    let mut out = Vec::new();
    out.try_reserve(LINE_HEADER + LINE_RECORD * spans.len())?;
    out.extend_from_slice(&count.to_le_bytes());
    for span in spans {
        let start = i32::try_from(span.start).map_err(|_| RopeError::OutOfRange {
            offset: span.start,
            len: i32::MAX as usize,
        })?;
        let len = u32::try_from(span.len).map_err(|_| RopeError::OutOfRange {
            offset: span.end(),
            len: u32::MAX as usize,
        })?;
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
    }
    Ok(out)
}

/// Reads a line buffer, checking its size against the declared count before
/// any record is touched.
pub fn deserialize_lines(bytes: &[u8]) -> Result<LineIndex> {
    let Some(header) = bytes.get(..LINE_HEADER) else {
        return Err(RopeError::malformed(0, "line buffer shorter than its header"));
    };
    let count = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let expected = count
        .checked_mul(LINE_RECORD)
        .and_then(|body| body.checked_add(LINE_HEADER))
        .ok_or_else(|| RopeError::malformed(0, "line count overflows"))?;
    if bytes.len() != expected {
        return Err(RopeError::malformed(
            bytes.len().min(expected),
            format!(
                "{count} lines need {expected} bytes, buffer has {}",
                bytes.len()
            ),
        ));
    }

    let mut index = LineIndex::without_lines();
    for (i, record) in bytes[LINE_HEADER..].chunks_exact(LINE_RECORD).enumerate() {
        let start = i32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let len = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
        let start = usize::try_from(start).map_err(|_| {
            RopeError::malformed(LINE_HEADER + i * LINE_RECORD, "negative line start")
        })?;
        index.push_line(start, len as usize)?;
    }
    Ok(index)
}
