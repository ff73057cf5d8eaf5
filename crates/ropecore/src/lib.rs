//! Rope-based text storage: a balanced byte rope, a line index kept in step
//! with it, and snapshot-based undo history.

pub mod document;
pub mod error;
pub mod history;
pub mod line_index;
pub mod memento;
pub mod node;
pub mod rope;
pub mod utf8;

pub use document::Document;
pub use error::{Result, RopeError};
pub use history::{Caretaker, History, OverflowPolicy};
pub use line_index::{LineIndex, LineSpan};
pub use memento::Memento;
pub use node::Leaves;
pub use rope::{RebalanceStrategy, RopeTree, CHUNK_SIZE};

#[cfg(test)]
mod tests;
