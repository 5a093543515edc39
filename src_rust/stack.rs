//! The parse stack: a single deterministic version of subtrees, each paired
//! with the parser state reached after pushing it.

use super::language::StateId;
use super::length::{length_add, length_sub, length_zero, Length};
use super::subtree::Subtree;

/// Most entries, extras included, that error recovery looks at below the top
/// of the stack.
pub const RECOVERY_LOOKBACK: usize = 64;

#[derive(Clone, Debug)]
pub struct StackEntry {
    pub subtree: Subtree,
    /// The state on top of the stack after this entry was pushed.
    pub state: StateId,
    /// Absolute position of the end of this entry.
    pub position: Length,
    /// The parser's recovery epoch when this entry was pushed.
    pub epoch: u32,
}

/// The subtrees removed by a reduction.
#[derive(Debug, Default)]
pub struct StackSlice {
    pub subtrees: Vec<Subtree>,
    /// Epoch of the bottom-most popped entry.
    pub first_epoch: Option<u32>,
}

/// Where popping down to a given depth would leave the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopSummary {
    /// Number of entries that would remain.
    pub remaining: usize,
    pub state: StateId,
    pub popped_trees: u32,
    pub popped_size: Length,
}

pub struct Stack {
    base_state: StateId,
    entries: Vec<StackEntry>,
}

impl Stack {
    pub fn new(base_state: StateId) -> Self {
        Self {
            base_state,
            entries: Vec::new(),
        }
    }

    pub fn base_state(&self) -> StateId {
        self.base_state
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn top_state(&self) -> StateId {
        self.entries.last().map_or(self.base_state, |entry| entry.state)
    }

    pub fn top_position(&self) -> Length {
        self.entries
            .last()
            .map_or_else(length_zero, |entry| entry.position)
    }

    pub fn push(&mut self, subtree: Subtree, state: StateId, epoch: u32) {
        let position = length_add(self.top_position(), subtree.size);
        self.entries.push(StackEntry {
            subtree,
            state,
            position,
            epoch,
        });
    }

    /// Pop the extras sitting above the topmost structural entry.
    pub fn pop_trailing_extras(&mut self) -> Vec<Subtree> {
        let keep = self
            .entries
            .iter()
            .rposition(|entry| !entry.subtree.extra)
            .map_or(0, |index| index + 1);
        self.entries
            .drain(keep..)
            .map(|entry| entry.subtree)
            .collect()
    }

    /// Pop `count` structural entries, plus the extras between them.
    pub fn pop_count(&mut self, count: u32) -> StackSlice {
        if count == 0 {
            return StackSlice::default();
        }
        let mut found = 0;
        let mut start = self.entries.len();
        while start > 0 && found < count {
            start -= 1;
            if !self.entries[start].subtree.extra {
                found += 1;
            }
        }
        let first_epoch = self.entries.get(start).map(|entry| entry.epoch);
        StackSlice {
            subtrees: self.entries.drain(start..).map(|entry| entry.subtree).collect(),
            first_epoch,
        }
    }

    /// Pop every entry above `remaining`.
    pub fn pop_to(&mut self, remaining: usize) -> Vec<Subtree> {
        let remaining = remaining.min(self.entries.len());
        self.entries
            .drain(remaining..)
            .map(|entry| entry.subtree)
            .collect()
    }

    pub fn pop_all(&mut self) -> Vec<Subtree> {
        self.pop_to(0)
    }

    /// The states after the structural entries among the top
    /// `RECOVERY_LOOKBACK` entries, oldest first, preceded by the base state
    /// when that covers the whole stack. Extras never change the state, so
    /// this is all that a simulated reduction needs.
    pub fn recent_structural_states(&self) -> Vec<StateId> {
        let scanned = self.entries.len().min(RECOVERY_LOOKBACK);
        let recent = &self.entries[self.entries.len() - scanned..];
        let reaches_bottom = scanned == self.entries.len();
        reaches_bottom
            .then_some(self.base_state)
            .into_iter()
            .chain(
                recent
                    .iter()
                    .filter(|entry| !entry.subtree.extra)
                    .map(|entry| entry.state),
            )
            .collect()
    }

    /// Remove the ERROR node nearest the top when nothing but extras sits
    /// above it, along with those extras. Returns the node, the extras and
    /// the epoch the node was pushed in.
    pub fn pop_trailing_error(&mut self) -> Option<(Subtree, Vec<Subtree>, u32)> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .rev()
            .take(RECOVERY_LOOKBACK)
            .take_while(|(_, entry)| entry.subtree.extra)
            .find(|(_, entry)| entry.subtree.is_error() && !entry.subtree.children.is_empty())
            .map(|(index, _)| index)?;
        let mut drained = self.entries.drain(index..);
        let error = drained.next()?;
        let extras = drained.map(|entry| entry.subtree).collect();
        Some((error.subtree, extras, error.epoch))
    }

    /// Candidate cut points from the top down, each just below a structural
    /// entry, covering at most `max_trees` structural entries and at most
    /// `RECOVERY_LOOKBACK` entries in all.
    pub fn pop_summaries(&self, max_trees: usize) -> Vec<PopSummary> {
        let top_position = self.top_position();
        let mut summaries = Vec::new();
        let mut popped_trees = 0;
        for index in (0..self.entries.len()).rev().take(RECOVERY_LOOKBACK) {
            if self.entries[index].subtree.extra {
                continue;
            }
            popped_trees += 1;
            if popped_trees > max_trees {
                break;
            }
            let (state, position) = match index.checked_sub(1) {
                Some(below) => (self.entries[below].state, self.entries[below].position),
                None => (self.base_state, length_zero()),
            };
            summaries.push(PopSummary {
                remaining: index,
                state,
                popped_trees: popped_trees as u32,
                popped_size: length_sub(top_position, position),
            });
        }
        summaries
    }
}
