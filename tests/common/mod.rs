#![allow(dead_code)]

use morf::{morpho, InputEdit, Language, Node, Parser, Point, Tree};
use streaming_iterator::StreamingIterator;

pub fn language() -> Language {
    morpho::language().expect("the bundled grammar loads")
}

pub fn parser() -> Parser {
    let mut parser = Parser::new();
    parser.set_language(&language());
    parser
}

pub fn parse(source: &str) -> Tree {
    parser().parse(source, None).expect("a language is set")
}

/// What a node looks like, minus its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_point: Point,
    pub end_point: Point,
    pub is_named: bool,
    pub is_extra: bool,
    pub is_error: bool,
    pub is_missing: bool,
    pub field_name: Option<String>,
}

/// Every visible node in pre-order.
pub fn dump(tree: &Tree) -> Vec<NodeRecord> {
    let mut records = Vec::new();
    let mut cursor = tree.walk();
    loop {
        let node = cursor.node();
        records.push(NodeRecord {
            kind: node.kind().to_string(),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_point: node.start_position(),
            end_point: node.end_position(),
            is_named: node.is_named(),
            is_extra: node.is_extra(),
            is_error: node.is_error(),
            is_missing: node.is_missing(),
            field_name: cursor.field_name().map(str::to_string),
        });
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return records;
            }
        }
    }
}

/// The visible nodes without visible children, in document order.
pub fn leaves(tree: &Tree) -> Vec<Node<'_>> {
    let mut leaves = Vec::new();
    let mut nodes = tree.preorder();
    while let Some(node) = nodes.next() {
        if node.child_count() == 0 {
            leaves.push(*node);
        }
    }
    leaves
}

pub fn nodes_of_kind<'tree>(tree: &'tree Tree, kind: &str) -> Vec<Node<'tree>> {
    let mut found = Vec::new();
    let mut nodes = tree.preorder();
    while let Some(node) = nodes.next() {
        if node.kind() == kind {
            found.push(*node);
        }
    }
    found
}

pub fn point_at(text: &str, byte: usize) -> Point {
    let before = &text.as_bytes()[..byte];
    let row = before.iter().filter(|&&b| b == b'\n').count();
    let column = before.iter().rev().take_while(|&&b| b != b'\n').count();
    Point::new(row as u32, column as u32)
}

/// Replace `start..old_end` of `text` with `replacement`.
pub fn splice(text: &str, start: usize, old_end: usize, replacement: &str) -> (String, InputEdit) {
    let mut new_text = String::with_capacity(text.len() + replacement.len());
    new_text.push_str(&text[..start]);
    new_text.push_str(replacement);
    new_text.push_str(&text[old_end..]);
    let new_end = start + replacement.len();
    let edit = InputEdit {
        start_byte: start,
        old_end_byte: old_end,
        new_end_byte: new_end,
        start_position: point_at(text, start),
        old_end_position: point_at(text, old_end),
        new_end_position: point_at(&new_text, new_end),
    };
    (new_text, edit)
}

/// Assert the structural guarantees every parse must give.
pub fn assert_total(tree: &Tree, source: &str) {
    let root = tree.root_node();
    assert_eq!(root.start_byte(), 0, "root starts late for {source:?}");
    assert_eq!(root.end_byte(), source.len(), "root ends early for {source:?}");

    let mut offset = 0;
    let mut text = Vec::new();
    for leaf in leaves(tree) {
        assert_eq!(leaf.start_byte(), offset, "gap before {leaf:?} in {source:?}");
        offset = leaf.end_byte();
        text.extend_from_slice(&source.as_bytes()[leaf.byte_range()]);
    }
    assert_eq!(offset, source.len(), "leaves stop short in {source:?}");
    assert_eq!(text, source.as_bytes());
}
