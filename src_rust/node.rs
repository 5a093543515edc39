//! Read-only views of the visible nodes of a [`Tree`].

use std::fmt;
use std::sync::Arc;

use super::language::{FieldId, Symbol};
use super::length::{length_add, Length};
use super::point::{point_add, Point};
use super::subtree::{to_sexp, Subtree};
use super::tree::{Range, Tree};
use super::tree_cursor::TreeCursor;

/// A single node within a syntax tree.
///
/// Nodes are small copyable handles. They borrow the tree they belong to and
/// know their own absolute position, which subtrees do not.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    position: Length,
}

struct NodeChildIterator<'tree> {
    tree: &'tree Tree,
    parent: &'tree Subtree,
    position: Length,
    child_index: usize,
    structural_child_index: u32,
}

impl<'tree> NodeChildIterator<'tree> {
    /// The next child, along with its index among the non-extra children.
    fn next(&mut self) -> Option<(Node<'tree>, u32)> {
        let parent: &'tree Subtree = self.parent;
        let child = parent.children.get(self.child_index)?;
        let node = Node::new(self.tree, child, self.position);
        let structural_child_index = self.structural_child_index;
        if !child.extra {
            self.structural_child_index += 1;
        }
        self.position = length_add(self.position, child.size);
        self.child_index += 1;
        Some((node, structural_child_index))
    }
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(tree: &'tree Tree, subtree: &'tree Subtree, position: Length) -> Self {
        Self {
            tree,
            subtree,
            position,
        }
    }

    pub(crate) fn tree(&self) -> &'tree Tree {
        self.tree
    }

    pub(crate) fn subtree(&self) -> &'tree Subtree {
        self.subtree
    }

    pub(crate) fn position(&self) -> Length {
        self.position
    }

    fn iterate_children(&self) -> NodeChildIterator<'tree> {
        NodeChildIterator {
            tree: self.tree,
            parent: self.subtree,
            position: self.position,
            child_index: 0,
            structural_child_index: 0,
        }
    }

    fn is_relevant(&self, include_anonymous: bool) -> bool {
        self.subtree.visible && (include_anonymous || self.subtree.named)
    }

    fn relevant_child_count(&self, include_anonymous: bool) -> u32 {
        if include_anonymous {
            self.subtree.visible_child_count
        } else {
            self.subtree.named_child_count
        }
    }

    /// A number that is unique among the nodes of one tree, stable across
    /// reparses for nodes that were reused.
    #[must_use]
    pub fn id(&self) -> usize {
        Arc::as_ptr(self.subtree) as usize
    }

    // -----------------------------------------------------------------------
    // Kind and flags
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn kind_id(&self) -> Symbol {
        self.subtree.symbol
    }

    #[must_use]
    pub fn kind(&self) -> &'tree str {
        let tree: &'tree Tree = self.tree;
        tree.language().symbol_name(self.subtree.symbol).unwrap_or("")
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        self.subtree.named
    }

    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.subtree.extra
    }

    /// Whether the node was inserted by error recovery without consuming
    /// any text.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.subtree.is_missing
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.subtree.is_error()
    }

    /// Whether the node is an error or contains one.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.subtree.has_error()
    }

    /// Whether the node was touched by an edit since the tree was parsed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.subtree.has_changes
    }

    // -----------------------------------------------------------------------
    // Position
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.position.bytes as usize
    }

    #[must_use]
    pub fn end_byte(&self) -> usize {
        (self.position.bytes + self.subtree.size.bytes) as usize
    }

    #[must_use]
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start_byte()..self.end_byte()
    }

    #[must_use]
    pub fn start_position(&self) -> Point {
        self.position.extent
    }

    #[must_use]
    pub fn end_position(&self) -> Point {
        point_add(self.position.extent, self.subtree.size.extent)
    }

    #[must_use]
    pub fn range(&self) -> Range {
        Range {
            start_byte: self.start_byte(),
            end_byte: self.end_byte(),
            start_point: self.start_position(),
            end_point: self.end_position(),
        }
    }

    // -----------------------------------------------------------------------
    // Children
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.subtree.visible_child_count as usize
    }

    #[must_use]
    pub fn named_child_count(&self) -> usize {
        self.subtree.named_child_count as usize
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<Node<'tree>> {
        self.child_impl(index as u32, true)
    }

    #[must_use]
    pub fn named_child(&self, index: usize) -> Option<Node<'tree>> {
        self.child_impl(index as u32, false)
    }

    fn child_impl(&self, child_index: u32, include_anonymous: bool) -> Option<Node<'tree>> {
        let mut result = *self;
        let mut index = child_index;
        let mut did_descend = true;

        while did_descend {
            did_descend = false;
            let mut current_index = 0;
            let mut iterator = result.iterate_children();
            while let Some((child, _)) = iterator.next() {
                if child.is_relevant(include_anonymous) {
                    if current_index == index {
                        return Some(child);
                    }
                    current_index += 1;
                } else {
                    let grandchild_index = index - current_index;
                    let grandchild_count = child.relevant_child_count(include_anonymous);
                    if grandchild_index < grandchild_count {
                        did_descend = true;
                        result = child;
                        index = grandchild_index;
                        break;
                    }
                    current_index += grandchild_count;
                }
            }
        }
        None
    }

    /// Iterate over the visible children, using `cursor` for the walk.
    pub fn children<'cursor>(
        &self,
        cursor: &'cursor mut TreeCursor<'tree>,
    ) -> impl ExactSizeIterator<Item = Node<'tree>> + 'cursor {
        cursor.reset(*self);
        cursor.goto_first_child();
        (0..self.child_count()).map(move |_| {
            let result = cursor.node();
            cursor.goto_next_sibling();
            result
        })
    }

    pub fn named_children<'cursor>(
        &self,
        cursor: &'cursor mut TreeCursor<'tree>,
    ) -> impl Iterator<Item = Node<'tree>> + 'cursor {
        self.children(cursor).filter(Node::is_named)
    }

    #[must_use]
    pub fn walk(&self) -> TreeCursor<'tree> {
        TreeCursor::new(*self)
    }

    // -----------------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------------

    /// The first child stored under `field_id`, looking through hidden
    /// children whose own fields are inherited.
    #[must_use]
    pub fn child_by_field_id(&self, field_id: FieldId) -> Option<Node<'tree>> {
        if field_id == 0 {
            return None;
        }
        let language = self.tree.language();
        let mut parent = *self;
        'search: loop {
            let field_map = language.field_map(parent.subtree.production_id);
            if field_map.iter().all(|entry| entry.field_id != field_id) {
                return None;
            }
            let mut iterator = parent.iterate_children();
            while let Some((child, structural_child_index)) = iterator.next() {
                if child.subtree.extra {
                    continue;
                }
                for entry in field_map {
                    if entry.field_id != field_id
                        || u32::from(entry.child_index) != structural_child_index
                    {
                        continue;
                    }
                    if child.subtree.visible {
                        return Some(child);
                    }
                    if entry.inherited {
                        parent = child;
                        continue 'search;
                    }
                    return child.child_impl(0, true);
                }
            }
            return None;
        }
    }

    #[must_use]
    pub fn child_by_field_name(&self, field_name: &str) -> Option<Node<'tree>> {
        self.tree
            .language()
            .field_id_for_name(field_name)
            .and_then(|field_id| self.child_by_field_id(field_id))
    }

    /// The field name of the visible child at `child_index`, if it has one.
    #[must_use]
    pub fn field_name_for_child(&self, child_index: usize) -> Option<&'tree str> {
        let mut cursor = self.walk();
        if !cursor.goto_first_child() {
            return None;
        }
        for _ in 0..child_index {
            if !cursor.goto_next_sibling() {
                return None;
            }
        }
        cursor.field_name()
    }

    // -----------------------------------------------------------------------
    // Relatives
    // -----------------------------------------------------------------------

    /// The closest visible ancestor.
    #[must_use]
    pub fn parent(&self) -> Option<Node<'tree>> {
        let tree: &'tree Tree = self.tree;
        let root = tree.root_node();
        if self.is_same(&root) {
            return None;
        }

        let mut pending = vec![(root, root)];
        while let Some((node, visible_ancestor)) = pending.pop() {
            let mut iterator = node.iterate_children();
            while let Some((child, _)) = iterator.next() {
                if child.is_same(self) {
                    return Some(visible_ancestor);
                }
                if child.subtree.children.is_empty()
                    || child.start_byte() > self.start_byte()
                    || child.end_byte() < self.end_byte()
                {
                    continue;
                }
                let ancestor = if child.subtree.visible {
                    child
                } else {
                    visible_ancestor
                };
                pending.push((child, ancestor));
            }
        }
        None
    }

    /// The visible child of this node that is `descendant` or contains it.
    #[must_use]
    pub fn child_with_descendant(&self, descendant: Node<'tree>) -> Option<Node<'tree>> {
        let mut current = descendant;
        loop {
            let parent = current.parent()?;
            if parent.is_same(self) {
                return Some(current);
            }
            current = parent;
        }
    }

    #[must_use]
    pub fn next_sibling(&self) -> Option<Node<'tree>> {
        self.sibling_impl(true, true)
    }

    #[must_use]
    pub fn prev_sibling(&self) -> Option<Node<'tree>> {
        self.sibling_impl(true, false)
    }

    #[must_use]
    pub fn next_named_sibling(&self) -> Option<Node<'tree>> {
        self.sibling_impl(false, true)
    }

    #[must_use]
    pub fn prev_named_sibling(&self) -> Option<Node<'tree>> {
        self.sibling_impl(false, false)
    }

    fn sibling_impl(&self, include_anonymous: bool, forward: bool) -> Option<Node<'tree>> {
        let parent = self.parent()?;
        let mut cursor = parent.walk();
        if !cursor.goto_first_child() {
            return None;
        }
        let mut previous = None;
        let mut found = false;
        loop {
            let node = cursor.node();
            if found {
                if node.is_relevant(include_anonymous) {
                    return Some(node);
                }
            } else if node.is_same(self) {
                if !forward {
                    return previous;
                }
                found = true;
            } else if node.is_relevant(include_anonymous) {
                previous = Some(node);
            }
            if !cursor.goto_next_sibling() {
                return None;
            }
        }
    }

    /// The smallest node within this one that spans `start..end`.
    #[must_use]
    pub fn descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
        Some(self.walk().goto_descendant_internal(start, end, true))
    }

    /// The smallest named node within this one that spans `start..end`.
    #[must_use]
    pub fn named_descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
        Some(self.walk().goto_descendant_internal(start, end, false))
    }

    // -----------------------------------------------------------------------
    // Text
    // -----------------------------------------------------------------------

    pub fn utf8_text<'a>(&self, source: &'a [u8]) -> Result<&'a str, std::str::Utf8Error> {
        std::str::from_utf8(source.get(self.byte_range()).unwrap_or_default())
    }

    #[must_use]
    pub fn to_sexp(&self) -> String {
        to_sexp(self.subtree, self.tree.language())
    }

    fn is_same(&self, other: &Node<'_>) -> bool {
        Arc::ptr_eq(self.subtree, other.subtree) && self.position.bytes == other.position.bytes
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{Node {} {} - {}}}",
            self.kind(),
            self.start_position(),
            self.end_position()
        )
    }
}
