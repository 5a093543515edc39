//! Syntax trees, document edits and whole-tree traversal.

use std::fmt;

use streaming_iterator::StreamingIterator;

use super::get_changed_ranges::get_changed_ranges;
use super::language::Language;
use super::length::{length_min, length_zero, Length};
use super::node::Node;
use super::point::Point;
use super::subtree::{self, to_sexp, Subtree, SubtreeEdit};
use super::tree_cursor::TreeCursor;

/// A change to the text of a document, in both bytes and points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_position: Point,
    pub old_end_position: Point,
    pub new_end_position: Point,
}

/// A span of a document in bytes and points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Range {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_point: Point,
    pub end_point: Point,
}

/// An immutable syntax tree. Cloning is cheap: subtrees are shared.
#[derive(Clone)]
pub struct Tree {
    root: Subtree,
    language: Language,
    revision: u64,
}

impl Tree {
    pub(crate) fn new(root: Subtree, language: Language, revision: u64) -> Self {
        Self {
            root,
            language,
            revision,
        }
    }

    pub(crate) fn root_subtree(&self) -> &Subtree {
        &self.root
    }

    #[must_use]
    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root, length_zero())
    }

    #[must_use]
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Starts at zero for a fresh parse and increases with every edit and
    /// every reparse based on this tree.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the tree has been edited since it was parsed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.root.has_changes
    }

    /// Adjust the tree to describe the document after `edit`.
    ///
    /// The tree should then be passed to `Parser::parse` along with the new
    /// text; until then, nodes touching the edit report `has_changes`.
    ///
    /// A node touches the edit when the edit overlaps its text or the bytes
    /// the lexer examined past its end while the node was being built. That
    /// includes the lookahead token that triggered its reduction, so the
    /// statement just before an edited one is usually marked too.
    pub fn edit(&mut self, edit: &InputEdit) {
        let size = self.root.size;
        let start = length_min(
            Length {
                bytes: edit.start_byte as u32,
                extent: edit.start_position,
            },
            size,
        );
        let mut old_end = length_min(
            Length {
                bytes: edit.old_end_byte as u32,
                extent: edit.old_end_position,
            },
            size,
        );
        if old_end.bytes < start.bytes {
            old_end = start;
        }
        let mut new_end = Length {
            bytes: edit.new_end_byte as u32,
            extent: edit.new_end_position,
        };
        if new_end.bytes < start.bytes {
            new_end = start;
        }

        tracing::debug!(
            "edit {}..{} -> {}..{}",
            start.bytes,
            old_end.bytes,
            start.bytes,
            new_end.bytes
        );
        self.root = subtree::edit(
            &self.root,
            SubtreeEdit {
                start,
                old_end,
                new_end,
            },
        );
        self.revision += 1;
    }

    #[must_use]
    pub fn walk(&self) -> TreeCursor<'_> {
        self.root_node().walk()
    }

    /// Ranges whose syntactic structure differs between `self` (edited to
    /// match the new text) and `other`, a reparse of that text.
    pub fn changed_ranges(&self, other: &Tree) -> impl ExactSizeIterator<Item = Range> {
        get_changed_ranges(&self.root, &other.root).into_iter()
    }

    /// Every visible node, parents before children.
    #[must_use]
    pub fn preorder(&self) -> PreorderNodes<'_> {
        PreorderNodes {
            cursor: self.walk(),
            current: None,
            started: false,
        }
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{Tree {}}}", to_sexp(&self.root, &self.language))
    }
}

/// A pre-order walk over a tree's visible nodes.
pub struct PreorderNodes<'tree> {
    cursor: TreeCursor<'tree>,
    current: Option<Node<'tree>>,
    started: bool,
}

impl<'tree> StreamingIterator for PreorderNodes<'tree> {
    type Item = Node<'tree>;

    fn advance(&mut self) {
        if !self.started {
            self.started = true;
            self.current = Some(self.cursor.node());
            return;
        }
        if self.current.is_none() {
            return;
        }
        if self.cursor.goto_first_child() {
            self.current = Some(self.cursor.node());
            return;
        }
        loop {
            if self.cursor.goto_next_sibling() {
                self.current = Some(self.cursor.node());
                return;
            }
            if !self.cursor.goto_parent() {
                self.current = None;
                return;
            }
        }
    }

    fn get(&self) -> Option<&Self::Item> {
        self.current.as_ref()
    }
}
