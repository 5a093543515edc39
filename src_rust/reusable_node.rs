// A cursor over the previous tree, walked left to right in step with the
// parser, that offers subtrees which can be pushed without reparsing.

use super::language::{LexMode, StateId};
use super::subtree::Subtree;

#[derive(Clone)]
struct StackEntry {
    tree: Subtree,
    child_index: usize,
    byte_offset: u32,
}

pub struct ReusableNode {
    stack: Vec<StackEntry>,
}

/// What the previous tree offers at the parser's position.
pub enum Reuse {
    /// An internal node to push as a whole.
    Node(Subtree),
    /// A token to use as the next lookahead.
    Leaf(Subtree),
}

impl ReusableNode {
    pub fn new(tree: Subtree) -> Self {
        Self {
            stack: vec![StackEntry {
                tree,
                child_index: 0,
                byte_offset: 0,
            }],
        }
    }

    pub fn empty() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn tree(&self) -> Option<&Subtree> {
        self.stack.last().map(|entry| &entry.tree)
    }

    pub fn byte_offset(&self) -> u32 {
        self.stack.last().map_or(u32::MAX, |entry| entry.byte_offset)
    }

    /// Move past the current subtree.
    pub fn advance(&mut self) {
        let Some(last) = self.stack.last() else {
            return;
        };
        let byte_offset = last.byte_offset + last.tree.size.bytes;
        let mut next_index;
        loop {
            let Some(popped) = self.stack.pop() else {
                return;
            };
            next_index = popped.child_index + 1;
            match self.stack.last() {
                None => return,
                Some(parent) if parent.tree.children.len() > next_index => break,
                Some(_) => {}
            }
        }
        let Some(parent) = self.stack.last() else {
            return;
        };
        let tree = parent.tree.children[next_index].clone();
        self.stack.push(StackEntry {
            tree,
            child_index: next_index,
            byte_offset,
        });
    }

    /// Move to the first child of the current subtree, if it has one.
    pub fn descend(&mut self) -> bool {
        let Some(last) = self.stack.last() else {
            return false;
        };
        let Some(first) = last.tree.children.first() else {
            return false;
        };
        let entry = StackEntry {
            tree: first.clone(),
            child_index: 0,
            byte_offset: last.byte_offset,
        };
        self.stack.push(entry);
        true
    }

    /// Find a subtree starting at `position` that the parser can take as-is
    /// in `state`, whose first token would be lexed in `lex_mode`.
    pub fn find(&mut self, position: u32, state: StateId, lex_mode: LexMode) -> Option<Reuse> {
        loop {
            let tree = self.tree()?.clone();
            let offset = self.byte_offset();
            let end = offset + tree.size.bytes;

            if offset < position {
                if end > position && self.descend() {
                    continue;
                }
                self.advance();
                continue;
            }
            if offset > position {
                return None;
            }

            if tree.children.is_empty() {
                if tree.size.bytes == 0 {
                    self.advance();
                    continue;
                }
                let usable = !tree.has_changes
                    && !tree.is_error()
                    && !tree.is_missing
                    && tree.lex_mode == lex_mode;
                return usable.then(|| Reuse::Leaf(tree));
            }

            if tree.is_reusable()
                && tree.parse_state == state
                && tree.first_leaf().lex_mode == lex_mode
            {
                return Some(Reuse::Node(tree));
            }
            if !self.descend() {
                self.advance();
            }
        }
    }
}
