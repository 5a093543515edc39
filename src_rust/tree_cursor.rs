//! Stateful navigation over the visible nodes of a tree.
//!
//! The cursor keeps a stack of every subtree from its starting node down to
//! the current one, hidden ones included. Hidden subtrees are passed through
//! on the way down, so their visible descendants appear in their place.

use super::language::FieldId;
use super::length::{length_add, Length};
use super::node::Node;
use super::subtree::Subtree;
use super::tree::Tree;

#[derive(Clone, Copy)]
struct TreeCursorEntry<'tree> {
    subtree: &'tree Subtree,
    position: Length,
    child_index: u32,
    structural_child_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TreeCursorStep {
    None,
    Hidden,
    Visible,
}

struct CursorChildIterator<'tree> {
    parent: &'tree Subtree,
    position: Length,
    child_index: u32,
    structural_child_index: u32,
}

impl<'tree> CursorChildIterator<'tree> {
    fn next(&mut self) -> Option<(TreeCursorEntry<'tree>, bool)> {
        let parent: &'tree Subtree = self.parent;
        let child = parent.children.get(self.child_index as usize)?;
        let entry = TreeCursorEntry {
            subtree: child,
            position: self.position,
            child_index: self.child_index,
            structural_child_index: self.structural_child_index,
        };
        if !child.extra {
            self.structural_child_index += 1;
        }
        self.position = length_add(self.position, child.size);
        self.child_index += 1;
        Some((entry, child.visible))
    }
}

#[derive(Clone)]
pub struct TreeCursor<'tree> {
    tree: &'tree Tree,
    stack: Vec<TreeCursorEntry<'tree>>,
}

impl<'tree> TreeCursor<'tree> {
    pub(crate) fn new(node: Node<'tree>) -> Self {
        let mut cursor = Self {
            tree: node.tree(),
            stack: Vec::with_capacity(8),
        };
        cursor.reset(node);
        cursor
    }

    /// Move back to `node`, which becomes the cursor's new root.
    pub fn reset(&mut self, node: Node<'tree>) {
        self.tree = node.tree();
        self.stack.clear();
        self.stack.push(TreeCursorEntry {
            subtree: node.subtree(),
            position: node.position(),
            child_index: 0,
            structural_child_index: 0,
        });
    }

    /// Copy the position of another cursor over the same tree.
    pub fn reset_to(&mut self, other: &TreeCursor<'tree>) {
        self.tree = other.tree;
        self.stack.clone_from(&other.stack);
    }

    #[must_use]
    pub fn node(&self) -> Node<'tree> {
        let entry = self.current();
        Node::new(self.tree, entry.subtree, entry.position)
    }

    fn current(&self) -> TreeCursorEntry<'tree> {
        // The stack always holds at least the root entry.
        self.stack[self.stack.len() - 1]
    }

    fn is_entry_visible(&self, index: usize) -> bool {
        index == 0 || self.stack[index].subtree.visible
    }

    fn iterate_children(&self) -> CursorChildIterator<'tree> {
        let last = self.current();
        CursorChildIterator {
            parent: last.subtree,
            position: last.position,
            child_index: 0,
            structural_child_index: 0,
        }
    }

    /// Depth of the current node below the cursor's root, counting only
    /// visible nodes.
    #[must_use]
    pub fn depth(&self) -> u32 {
        (1..self.stack.len())
            .filter(|&index| self.is_entry_visible(index))
            .count() as u32
    }

    // -----------------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn field_id(&self) -> Option<FieldId> {
        let language = self.tree.language();
        for index in (1..self.stack.len()).rev() {
            let entry = &self.stack[index];
            let parent = &self.stack[index - 1];
            if index != self.stack.len() - 1 && self.is_entry_visible(index) {
                break;
            }
            if entry.subtree.extra {
                break;
            }
            if let Some(map) = language
                .field_map(parent.subtree.production_id)
                .iter()
                .find(|map| {
                    !map.inherited && map.child_index as u32 == entry.structural_child_index
                })
            {
                return Some(map.field_id);
            }
        }
        None
    }

    #[must_use]
    pub fn field_name(&self) -> Option<&'tree str> {
        let tree: &'tree Tree = self.tree;
        self.field_id()
            .and_then(|field_id| tree.language().field_name_for_id(field_id))
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn goto_first_child_internal(&mut self) -> TreeCursorStep {
        let mut iterator = self.iterate_children();
        while let Some((entry, visible)) = iterator.next() {
            if visible {
                self.stack.push(entry);
                return TreeCursorStep::Visible;
            }
            if entry.subtree.visible_child_count > 0 {
                self.stack.push(entry);
                return TreeCursorStep::Hidden;
            }
        }
        TreeCursorStep::None
    }

    /// Move to the first visible child. Returns false if there is none.
    pub fn goto_first_child(&mut self) -> bool {
        loop {
            match self.goto_first_child_internal() {
                TreeCursorStep::Hidden => continue,
                TreeCursorStep::Visible => return true,
                TreeCursorStep::None => return false,
            }
        }
    }

    fn goto_next_sibling_internal(&mut self) -> TreeCursorStep {
        let initial_size = self.stack.len();
        let mut popped = Vec::new();

        while self.stack.len() > 1 {
            let Some(entry) = self.stack.pop() else {
                break;
            };
            popped.push(entry);
            let mut iterator = self.iterate_children();
            iterator.child_index = entry.child_index;
            iterator.structural_child_index = entry.structural_child_index;
            iterator.position = entry.position;

            let visible = iterator.next().is_some_and(|(_, visible)| visible);
            if visible && self.stack.len() + 1 < initial_size {
                break;
            }

            while let Some((sibling, visible)) = iterator.next() {
                if visible {
                    self.stack.push(sibling);
                    return TreeCursorStep::Visible;
                }
                if sibling.subtree.visible_child_count > 0 {
                    self.stack.push(sibling);
                    return TreeCursorStep::Hidden;
                }
            }
        }

        while let Some(entry) = popped.pop() {
            self.stack.push(entry);
        }
        debug_assert_eq!(self.stack.len(), initial_size);
        TreeCursorStep::None
    }

    /// Move to the next visible sibling. Returns false if there is none.
    pub fn goto_next_sibling(&mut self) -> bool {
        match self.goto_next_sibling_internal() {
            TreeCursorStep::Hidden => {
                self.goto_first_child();
                true
            }
            TreeCursorStep::Visible => true,
            TreeCursorStep::None => false,
        }
    }

    /// Move to the closest visible ancestor. Returns false at the root.
    pub fn goto_parent(&mut self) -> bool {
        for index in (0..self.stack.len().saturating_sub(1)).rev() {
            if self.is_entry_visible(index) {
                self.stack.truncate(index + 1);
                return true;
            }
        }
        false
    }

    /// Move to the first visible child that extends beyond `goal_byte`,
    /// returning its index among the visible children.
    pub fn goto_first_child_for_byte(&mut self, goal_byte: usize) -> Option<usize> {
        let initial_size = self.stack.len();
        let mut visible_child_index = 0;

        loop {
            let mut did_descend = false;
            let mut iterator = self.iterate_children();
            while let Some((entry, visible)) = iterator.next() {
                let entry_end = length_add(entry.position, entry.subtree.size);
                let visible_child_count = entry.subtree.visible_child_count as usize;
                if entry_end.bytes as usize > goal_byte {
                    if visible {
                        self.stack.push(entry);
                        return Some(visible_child_index);
                    }
                    if visible_child_count > 0 {
                        self.stack.push(entry);
                        did_descend = true;
                        break;
                    }
                } else if visible {
                    visible_child_index += 1;
                } else {
                    visible_child_index += visible_child_count;
                }
            }
            if !did_descend {
                break;
            }
        }

        self.stack.truncate(initial_size);
        None
    }

    /// Move to the smallest visible node that contains `start..end`.
    pub fn goto_descendant_for_byte_range(&mut self, start: usize, end: usize) -> Node<'tree> {
        self.goto_descendant_internal(start, end, true)
    }

    pub(crate) fn goto_descendant_internal(
        &mut self,
        range_start: usize,
        range_end: usize,
        include_anonymous: bool,
    ) -> Node<'tree> {
        let mut last_relevant_size = self.stack.len();
        loop {
            let mut did_descend = false;
            let mut iterator = self.iterate_children();
            while let Some((entry, visible)) = iterator.next() {
                let node_start = entry.position.bytes as usize;
                let node_end = node_start + entry.subtree.size.bytes as usize;

                // The node must reach the end of the range...
                if node_end < range_end {
                    continue;
                }
                // ...and pass its start, unless the node is empty, in which
                // case it may sit exactly on it.
                let is_empty = node_start == node_end;
                if if is_empty {
                    node_end < range_start
                } else {
                    node_end <= range_start
                } {
                    continue;
                }
                if range_start < node_start {
                    break;
                }

                self.stack.push(entry);
                if visible && (include_anonymous || entry.subtree.named) {
                    last_relevant_size = self.stack.len();
                }
                did_descend = true;
                break;
            }
            if !did_descend {
                break;
            }
        }
        self.stack.truncate(last_relevant_size);
        self.node()
    }
}
