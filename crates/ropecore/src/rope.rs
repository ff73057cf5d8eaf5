//! The rope tree: a binary tree of byte chunks with cached shape metrics.

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RopeError};
use crate::node::{Leaves, Link, Node};

/// Byte size of bulk-load chunks and the merge limit of the append and
/// prepend fast paths.
pub const CHUNK_SIZE: usize = 16;

/// How the leaf list is reassembled when the balance check fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceStrategy {
    /// Rebuild by recursive bisection, the same way `build` does.
    #[default]
    Bisect,
    /// Fold the leaves left to right through `concat`. Produces a
    /// left-leaning chain.
    LegacyChain,
}

#[derive(Debug, Default)]
pub struct RopeTree {
    root: Link,
    length: usize,
    height: usize,
    nodes_count: usize,
    strategy: RebalanceStrategy,
}

impl RopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: RebalanceStrategy) -> Self {
        Self::from_root(None, strategy)
    }

    /// Builds a minimum-height tree over the given chunks, one leaf each.
    /// Empty chunks are skipped.
    pub fn build<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let leaves: Vec<Box<Node>> = chunks
            .into_iter()
            .filter(|chunk| !chunk.as_ref().is_empty())
            .map(|chunk| Node::leaf(chunk.as_ref()))
            .collect();
        Self::from_root(Node::bisect(leaves), RebalanceStrategy::default())
    }

    /// Splits `bytes` into `CHUNK_SIZE` pieces and builds a tree over them.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::build(bytes.chunks(CHUNK_SIZE))
    }

    pub(crate) fn from_root(root: Link, strategy: RebalanceStrategy) -> Self {
        let mut tree = Self {
            root,
            length: 0,
            height: 0,
            nodes_count: 0,
            strategy,
        };
        tree.refresh();
        tree
    }

    pub(crate) fn root(&self) -> Option<&Node> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn node_count(&self) -> usize {
        self.nodes_count
    }

    pub fn rebalance_strategy(&self) -> RebalanceStrategy {
        self.strategy
    }

    pub fn set_rebalance_strategy(&mut self, strategy: RebalanceStrategy) {
        self.strategy = strategy;
    }

    /// Inserts `text` so that its first byte lands at `offset`.
    pub fn insert(&mut self, offset: usize, text: &[u8]) -> Result<()> {
        if offset > self.length {
            return Err(RopeError::OutOfRange {
                offset,
                len: self.length,
            });
        }
        if text.is_empty() {
            return Ok(());
        }

        if offset == self.length {
            self.append(text);
        } else if offset == 0 {
            self.prepend(text);
        } else {
            let (left, right) = Node::split(self.root.take(), offset);
            let left = Node::concat(left, Some(Node::leaf(text)));
            self.root = Node::concat(left, right);
            self.refresh();
            self.rebalance_if_needed();
        }
        Ok(())
    }

    fn append(&mut self, text: &[u8]) {
        let Some(root) = self.root.as_deref_mut() else {
            self.root = Some(Node::leaf(text));
            self.refresh();
            return;
        };
        let fits = root
            .last_leaf_len()
            .is_some_and(|len| len + text.len() < CHUNK_SIZE);
        if fits && root.extend_last_leaf(text) {
            self.length += text.len();
            return;
        }
        self.root = Node::concat(self.root.take(), Some(Node::leaf(text)));
        self.refresh();
        self.rebalance_if_needed();
    }

    fn prepend(&mut self, text: &[u8]) {
        let Some(root) = self.root.as_deref_mut() else {
            self.root = Some(Node::leaf(text));
            self.refresh();
            return;
        };
        let fits = root
            .first_leaf_len()
            .is_some_and(|len| len + text.len() < CHUNK_SIZE);
        if fits && root.prepend_first_leaf(text) {
            self.length += text.len();
            return;
        }
        self.root = Node::concat(Some(Node::leaf(text)), self.root.take());
        self.refresh();
        self.rebalance_if_needed();
    }

    /// Removes `length` bytes starting at `start`.
    pub fn delete(&mut self, start: usize, length: usize) -> Result<()> {
        let end = start.saturating_add(length);
        if end > self.length {
            return Err(RopeError::OutOfRange {
                offset: end,
                len: self.length,
            });
        }
        if length == 0 {
            return Ok(());
        }

        let (left, rest) = Node::split(self.root.take(), start);
        let (removed, right) = Node::split(rest, length);
        Node::dispose(removed);
        self.root = Node::concat(left, right);
        self.refresh();
        self.rebalance_if_needed();
        Ok(())
    }

    /// Cuts the tree in two; the left tree holds the first `idx` bytes.
    pub fn split(mut self, idx: usize) -> Result<(RopeTree, RopeTree)> {
        if idx > self.length {
            return Err(RopeError::OutOfRange {
                offset: idx,
                len: self.length,
            });
        }
        let (left, right) = Node::split(self.root.take(), idx);
        Ok((
            Self::from_root(left, self.strategy),
            Self::from_root(right, self.strategy),
        ))
    }

    pub fn concat(mut self, mut other: RopeTree) -> RopeTree {
        let root = Node::concat(self.root.take(), other.root.take());
        let mut tree = Self::from_root(root, self.strategy);
        tree.rebalance_if_needed();
        tree
    }

    /// Ordered walk over the leaf payloads.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves::new(self.root.as_deref())
    }

    /// Streams every leaf to `sink` in order without building the full text.
    pub fn save<W: Write>(&self, mut sink: W) -> Result<()> {
        for leaf in self.leaves() {
            sink.write_all(leaf)?;
        }
        sink.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.length);
        for leaf in self.leaves() {
            bytes.extend_from_slice(leaf);
        }
        bytes
    }

    /// Copies the bytes in `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Vec<u8>> {
        if start > end || end > self.length {
            return Err(RopeError::OutOfRange {
                offset: end,
                len: self.length,
            });
        }
        let mut out = Vec::with_capacity(end - start);
        let mut leaf_start = 0;
        for leaf in self.leaves() {
            let leaf_end = leaf_start + leaf.len();
            if leaf_end > start && leaf_start < end {
                let from = start.saturating_sub(leaf_start);
                let to = (end - leaf_start).min(leaf.len());
                out.extend_from_slice(&leaf[from..to]);
            }
            if leaf_end >= end {
                break;
            }
            leaf_start = leaf_end;
        }
        Ok(out)
    }

    /// Finds the leaf holding the byte at `offset` and the index inside it.
    ///
    /// An offset equal to a node's rank is the first byte of its right
    /// subtree, so the search continues to the right.
    pub fn leaf_at(&self, offset: usize) -> Option<(&[u8], usize)> {
        if offset >= self.length {
            return None;
        }
        let mut idx = offset;
        let mut node = self.root.as_deref()?;
        loop {
            match node {
                Node::Leaf { data } => return Some((data.as_slice(), idx)),
                Node::Internal { rank, left, right } => {
                    if idx < *rank {
                        node = left.as_deref()?;
                    } else {
                        idx -= rank;
                        node = right.as_deref()?;
                    }
                }
            }
        }
    }

    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        self.leaf_at(offset)
            .and_then(|(leaf, idx)| leaf.get(idx).copied())
    }

    /// The balance criterion evaluated after every structural change:
    /// height below the smallest Fibonacci number not less than the node
    /// count, and at least `F(height + 2)` bytes stored.
    pub fn is_balanced(&self) -> bool {
        if self.root.is_none() {
            return true;
        }
        let height = self.height as u64;
        height < smallest_fibonacci(self.nodes_count as u64)
            && fibonacci(height + 2) <= self.length as u64
    }

    fn refresh(&mut self) {
        let shape = Node::measure(self.root.as_deref());
        self.length = shape.length;
        self.height = shape.height;
        self.nodes_count = shape.nodes;
    }

    fn rebalance_if_needed(&mut self) {
        if self.is_balanced() {
            return;
        }
        let leaves = Node::into_leaves(self.root.take());
        log::debug!(
            "Rebalancing rope: height {}, {} nodes, {} leaves, strategy {:?}",
            self.height,
            self.nodes_count,
            leaves.len(),
            self.strategy
        );
        self.root = match self.strategy {
            RebalanceStrategy::Bisect => Node::bisect(leaves),
            RebalanceStrategy::LegacyChain => leaves
                .into_iter()
                .fold(None, |chain, leaf| match chain {
                    None => Some(leaf),
                    chain => Node::concat(chain, Some(leaf)),
                }),
        };
        self.refresh();
    }
}

impl Drop for RopeTree {
    fn drop(&mut self) {
        Node::dispose(self.root.take());
    }
}

impl fmt::Display for RopeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// `F(n)` with `F(0) = 0`, `F(1) = 1`, saturating at `u64::MAX`.
pub fn fibonacci(n: u64) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

/// The least Fibonacci number that is `>= n`.
pub fn smallest_fibonacci(n: u64) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    while a < n {
        if a == u64::MAX {
            break;
        }
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}
