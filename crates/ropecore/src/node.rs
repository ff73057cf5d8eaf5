//! Rope nodes and the structural operations on them.
//!
//! A node is either a leaf holding a run of bytes or an internal node whose
//! `rank` is the byte length of its left subtree. Children are optional: an
//! empty half produced by a split is an absent child, never an empty leaf.

pub type Link = Option<Box<Node>>;

#[derive(Debug)]
pub enum Node {
    Leaf { data: Vec<u8> },
    Internal { rank: usize, left: Link, right: Link },
}

/// Cached measurements of a subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shape {
    pub length: usize,
    /// Longest root-to-node path, counted in edges.
    pub height: usize,
    pub nodes: usize,
}

impl Node {
    pub fn leaf(data: &[u8]) -> Box<Node> {
        Box::new(Node::Leaf {
            data: data.to_vec(),
        })
    }

    pub fn rank(&self) -> usize {
        match self {
            Node::Leaf { data } => data.len(),
            Node::Internal { rank, .. } => *rank,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Total byte length of the subtree, walking the right spine.
    pub fn total_len(&self) -> usize {
        let mut total = 0;
        let mut node = self;
        loop {
            match node {
                Node::Leaf { data } => return total + data.len(),
                Node::Internal { rank, right, .. } => {
                    total += rank;
                    match right.as_deref() {
                        Some(next) => node = next,
                        None => return total,
                    }
                }
            }
        }
    }

    /// Joins two subtrees under a fresh internal node.
    ///
    /// Returns `None` only when both sides are absent, so an internal node
    /// always has at least one child.
    pub fn concat(left: Link, right: Link) -> Link {
        if left.is_none() && right.is_none() {
            return None;
        }
        let rank = left.as_deref().map_or(0, Node::total_len);
        Some(Box::new(Node::Internal { rank, left, right }))
    }

    /// Cuts the subtree so that the first `idx` bytes end up on the left.
    ///
    /// Descends with an explicit path and joins the detached siblings back
    /// on the way out.
    pub fn split(link: Link, idx: usize) -> (Link, Link) {
        let mut path: Vec<Detached> = Vec::new();
        let mut current = link;
        let mut idx = idx;

        let (mut head, mut tail) = loop {
            let Some(node) = current else {
                break (None, None);
            };
            match *node {
                Node::Leaf { data } => {
                    if idx >= data.len() {
                        break (Some(Box::new(Node::Leaf { data })), None);
                    }
                    let mut head = data;
                    let tail = head.split_off(idx);
                    break (non_empty_leaf(head), non_empty_leaf(tail));
                }
                Node::Internal { rank, left, right } => {
                    if idx < rank {
                        path.push(Detached::Right(right));
                        current = left;
                    } else {
                        path.push(Detached::Left(left));
                        current = right;
                        idx -= rank;
                    }
                }
            }
        };

        while let Some(sibling) = path.pop() {
            match sibling {
                Detached::Right(right) => tail = Node::concat(tail, right),
                Detached::Left(left) => head = Node::concat(left, head),
            }
        }
        (head, tail)
    }

    /// Builds a minimum-height tree over `leaves` by recursive bisection.
    /// The left half receives the extra leaf when the count is odd.
    pub fn bisect(mut leaves: Vec<Box<Node>>) -> Link {
        match leaves.len() {
            0 => None,
            1 => leaves.pop(),
            count => {
                let right = leaves.split_off(count.div_ceil(2));
                Node::concat(Node::bisect(leaves), Node::bisect(right))
            }
        }
    }

    /// Detaches every leaf in order, discarding the internal nodes.
    pub fn into_leaves(link: Link) -> Vec<Box<Node>> {
        let mut leaves = Vec::new();
        let mut stack: Vec<Box<Node>> = link.into_iter().collect();
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                leaves.push(node);
                continue;
            }
            if let Node::Internal { left, right, .. } = *node {
                stack.extend(right);
                stack.extend(left);
            }
        }
        leaves
    }

    /// Frees a subtree without recursing, so degenerate chains cannot
    /// exhaust the stack.
    pub fn dispose(link: Link) {
        let mut stack: Vec<Box<Node>> = link.into_iter().collect();
        while let Some(node) = stack.pop() {
            if let Node::Internal { left, right, .. } = *node {
                stack.extend(left);
                stack.extend(right);
            }
        }
    }

    pub fn measure(link: Option<&Node>) -> Shape {
        let mut shape = Shape::default();
        let mut stack: Vec<(&Node, usize)> = link.map(|node| (node, 0)).into_iter().collect();
        while let Some((node, depth)) = stack.pop() {
            shape.nodes += 1;
            shape.height = shape.height.max(depth);
            match node {
                Node::Leaf { data } => shape.length += data.len(),
                Node::Internal { left, right, .. } => {
                    if let Some(right) = right.as_deref() {
                        stack.push((right, depth + 1));
                    }
                    if let Some(left) = left.as_deref() {
                        stack.push((left, depth + 1));
                    }
                }
            }
        }
        shape
    }

    /// Length of the leaf reached by following right children only.
    pub(crate) fn last_leaf_len(&self) -> Option<usize> {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { data } => return Some(data.len()),
                Node::Internal { right, .. } => node = right.as_deref()?,
            }
        }
    }

    /// Length of the leaf reached by following left children only.
    pub(crate) fn first_leaf_len(&self) -> Option<usize> {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { data } => return Some(data.len()),
                Node::Internal { left, .. } => node = left.as_deref()?,
            }
        }
    }

    /// Appends to the rightmost leaf. No rank changes along a right-only path.
    pub(crate) fn extend_last_leaf(&mut self, text: &[u8]) -> bool {
        let mut node = self;
        loop {
            match { node } {
                Node::Leaf { data } => {
                    data.extend_from_slice(text);
                    return true;
                }
                Node::Internal { right, .. } => match right.as_deref_mut() {
                    Some(next) => node = next,
                    None => return false,
                },
            }
        }
    }

    /// Prepends to the leftmost leaf, growing the rank of every ancestor on
    /// the way down since each of them has that leaf in its left subtree.
    pub(crate) fn prepend_first_leaf(&mut self, text: &[u8]) -> bool {
        if self.first_leaf_len().is_none() {
            return false;
        }
        let mut node = self;
        loop {
            match { node } {
                Node::Leaf { data } => {
                    data.splice(0..0, text.iter().copied());
                    return true;
                }
                Node::Internal { rank, left, .. } => {
                    *rank += text.len();
                    match left.as_deref_mut() {
                        Some(next) => node = next,
                        None => return false,
                    }
                }
            }
        }
    }
}

/// Sibling left behind while `split` walks down one side of a node.
enum Detached {
    Left(Link),
    Right(Link),
}

fn non_empty_leaf(data: Vec<u8>) -> Link {
    if data.is_empty() {
        None
    } else {
        Some(Box::new(Node::Leaf { data }))
    }
}

/// In-order walk over leaf payloads using an explicit stack.
pub struct Leaves<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Leaves<'a> {
    pub(crate) fn new(root: Option<&'a Node>) -> Self {
        Self {
            stack: root.into_iter().collect(),
        }
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Node::Leaf { data } => return Some(data.as_slice()),
                Node::Internal { left, right, .. } => {
                    if let Some(right) = right.as_deref() {
                        self.stack.push(right);
                    }
                    if let Some(left) = left.as_deref() {
                        self.stack.push(left);
                    }
                }
            }
        }
        None
    }
}
