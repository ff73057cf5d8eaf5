//! Bounded snapshot stacks and the undo/redo pairing built on them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::memento::Memento;

/// What a full [`Caretaker`] does with a new snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest snapshot to make room.
    #[default]
    DiscardOldest,
    /// Refuse the new snapshot and keep the stack as it is.
    DropNewest,
}

/// A LIFO stack of snapshots with a fixed capacity.
#[derive(Debug)]
pub struct Caretaker {
    entries: VecDeque<Memento>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl Caretaker {
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, OverflowPolicy::default())
    }

    pub fn with_policy(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            policy,
        }
    }

    /// Pushes `memento` and returns whichever snapshot did not fit, if any.
    pub fn push(&mut self, memento: Memento) -> Option<Memento> {
        if self.capacity == 0 {
            return Some(memento);
        }
        if self.entries.len() < self.capacity {
            self.entries.push_back(memento);
            return None;
        }
        match self.policy {
            OverflowPolicy::DiscardOldest => {
                let evicted = self.entries.pop_front();
                self.entries.push_back(memento);
                log::trace!("History full ({}), discarded oldest snapshot", self.capacity);
                evicted
            }
            OverflowPolicy::DropNewest => {
                log::trace!("History full ({}), dropped new snapshot", self.capacity);
                Some(memento)
            }
        }
    }

    pub fn pop(&mut self) -> Option<Memento> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&Memento> {
        self.entries.back()
    }

    /// Drops every snapshot; the stack stays usable.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Bytes held across all snapshots.
    pub fn size_in_bytes(&self) -> usize {
        self.entries.iter().map(Memento::size).sum()
    }
}

/// Undo and redo stacks kept in step.
#[derive(Debug)]
pub struct History {
    undo: Caretaker,
    redo: Caretaker,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100, OverflowPolicy::default())
    }
}

impl History {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            undo: Caretaker::with_policy(capacity, policy),
            redo: Caretaker::with_policy(capacity, policy),
        }
    }

    /// Records the state before an edit. Any redo chain is invalidated.
    pub fn record(&mut self, before: Memento) -> Option<Memento> {
        self.redo.clear();
        self.undo.push(before)
    }

    /// Swaps `current` for the most recent undo snapshot. Returns `None`,
    /// and leaves both stacks alone, when there is nothing to undo.
    pub fn undo(&mut self, current: Memento) -> Option<Memento> {
        let previous = self.undo.pop()?;
        self.redo.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: Memento) -> Option<Memento> {
        let next = self.redo.pop()?;
        self.undo.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.undo.size_in_bytes() + self.redo.size_in_bytes()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_index::LineIndex;
    use crate::rope::RopeTree;

    fn snapshot(text: &str) -> Memento {
        let tree = RopeTree::from_bytes(text.as_bytes());
        let lines = LineIndex::from_leaves(tree.leaves()).unwrap();
        Memento::capture(&tree, &lines).unwrap()
    }

    fn text_of(memento: &Memento) -> String {
        memento.restore().unwrap().0.to_string()
    }

    #[test]
    fn test_caretaker_is_lifo() {
        let mut stack = Caretaker::new(4);
        assert!(stack.pop().is_none());
        stack.push(snapshot("a"));
        stack.push(snapshot("b"));
        assert_eq!(stack.peek().map(text_of).as_deref(), Some("b"));
        assert_eq!(text_of(&stack.pop().unwrap()), "b");
        assert_eq!(text_of(&stack.pop().unwrap()), "a");
        assert!(stack.is_empty());
    }

    #[test]
    fn test_discard_oldest_on_overflow() {
        let mut stack = Caretaker::new(2);
        assert!(stack.push(snapshot("1")).is_none());
        assert!(stack.push(snapshot("2")).is_none());
        assert!(stack.is_full());
        let evicted = stack.push(snapshot("3")).unwrap();
        assert_eq!(text_of(&evicted), "1");
        assert_eq!(stack.len(), 2);
        assert_eq!(text_of(&stack.pop().unwrap()), "3");
        assert_eq!(text_of(&stack.pop().unwrap()), "2");
    }

    #[test]
    fn test_drop_newest_on_overflow() {
        let mut stack = Caretaker::with_policy(1, OverflowPolicy::DropNewest);
        stack.push(snapshot("kept"));
        let refused = stack.push(snapshot("refused")).unwrap();
        assert_eq!(text_of(&refused), "refused");
        assert_eq!(text_of(&stack.pop().unwrap()), "kept");
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut stack = Caretaker::new(0);
        assert!(stack.push(snapshot("x")).is_some());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_clear_keeps_stack_usable() {
        let mut stack = Caretaker::new(3);
        stack.push(snapshot("a"));
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.size_in_bytes(), 0);
        stack.push(snapshot("b"));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_undo_redo_pairing() {
        let mut history = History::default();
        assert!(history.undo(snapshot("now")).is_none());
        assert_eq!(history.redo_len(), 0);

        history.record(snapshot("v0"));
        history.record(snapshot("v1"));
        let restored = history.undo(snapshot("v2")).unwrap();
        assert_eq!(text_of(&restored), "v1");
        assert!(history.can_redo());

        let redone = history.redo(snapshot("v1")).unwrap();
        assert_eq!(text_of(&redone), "v2");
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new(10, OverflowPolicy::DiscardOldest);
        history.record(snapshot("v0"));
        history.undo(snapshot("v1")).unwrap();
        assert!(history.can_redo());
        history.record(snapshot("v0"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_policy_deserializes_from_config_names() {
        let policy: OverflowPolicy = serde_json::from_str("\"drop_newest\"").unwrap();
        assert_eq!(policy, OverflowPolicy::DropNewest);
    }
}
