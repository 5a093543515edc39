mod common;

use morf::Point;
use streaming_iterator::StreamingIterator;

use common::{nodes_of_kind, parse};

const SOURCE: &str = "var a = 1 + 2;\nprint a;\n{ a; }\n";

#[test]
fn test_hidden_nodes_are_hoisted() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    assert_eq!(root.kind(), "source_file");
    assert_eq!(root.child_count(), 6);
    assert_eq!(root.named_child_count(), 3);

    let mut cursor = tree.walk();
    let kinds: Vec<_> = root.children(&mut cursor).map(|node| node.kind()).collect();
    assert_eq!(
        kinds,
        [
            "declaration_statement",
            "whitespace",
            "print_statement",
            "whitespace",
            "block",
            "whitespace",
        ]
    );
    let named: Vec<_> = root.named_children(&mut cursor).map(|node| node.kind()).collect();
    assert_eq!(named, ["declaration_statement", "print_statement", "block"]);

    assert_eq!(root.child(1).unwrap().byte_range(), 14..15);
    assert_eq!(root.named_child(2).unwrap().byte_range(), 24..30);
    assert!(root.child(6).is_none());
    assert!(root.named_child(3).is_none());
}

#[test]
fn test_node_positions() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    let print = root.named_child(1).unwrap();
    assert_eq!(print.start_position(), Point::new(1, 0));
    assert_eq!(print.end_position(), Point::new(1, 8));
    let block = root.named_child(2).unwrap();
    assert_eq!(block.end_position(), Point::new(2, 6));
    assert_eq!(block.range().start_byte, 24);
    assert_eq!(block.range().end_point, Point::new(2, 6));
    assert_eq!(root.end_position(), Point::new(3, 0));
    assert_eq!(print.utf8_text(SOURCE.as_bytes()).unwrap(), "print a;");
}

#[test]
fn test_fields() {
    let tree = parse(SOURCE);
    let declaration = tree.root_node().named_child(0).unwrap();
    let variable = declaration.named_child(0).unwrap();
    assert_eq!(variable.kind(), "variable_declaration");

    let name = variable.child_by_field_name("name").unwrap();
    assert_eq!(name.kind(), "identifier");
    assert_eq!(name.utf8_text(SOURCE.as_bytes()).unwrap(), "a");

    let value = variable.child_by_field_name("value").unwrap();
    assert_eq!(value.kind(), "binary_expression");
    assert_eq!(value.child_by_field_name("left").unwrap().byte_range(), 8..9);
    assert_eq!(value.child_by_field_name("operator").unwrap().kind(), "+");
    assert_eq!(value.child_by_field_name("right").unwrap().byte_range(), 12..13);
    assert!(value.child_by_field_name("name").is_none());
    assert!(value.child_by_field_name("nonsense").is_none());

    assert_eq!(value.field_name_for_child(0), Some("left"));
    assert_eq!(value.field_name_for_child(1), None);
    assert_eq!(value.field_name_for_child(2), Some("operator"));
    assert_eq!(value.field_name_for_child(4), Some("right"));
    assert_eq!(value.field_name_for_child(5), None);

    let language = tree.language();
    let right = language.field_id_for_name("right").unwrap();
    assert_eq!(value.child_by_field_id(right).unwrap().byte_range(), 12..13);
    assert!(value.child_by_field_id(0).is_none());
}

#[test]
fn test_cursor_walk() {
    let tree = parse(SOURCE);
    let mut cursor = tree.walk();
    assert_eq!(cursor.node().kind(), "source_file");
    assert_eq!(cursor.depth(), 0);
    assert!(!cursor.goto_parent());
    assert!(!cursor.goto_next_sibling());

    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "declaration_statement");
    assert_eq!(cursor.depth(), 1);
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), "whitespace");
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), "print_statement");

    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "print");
    assert!(cursor.goto_next_sibling());
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), "identifier");
    assert_eq!(cursor.depth(), 2);
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), ";");
    assert!(!cursor.goto_next_sibling());

    let saved = cursor.clone();
    assert!(cursor.goto_parent());
    assert_eq!(cursor.node().kind(), "print_statement");
    assert!(cursor.goto_parent());
    assert_eq!(cursor.node().kind(), "source_file");

    cursor.reset_to(&saved);
    assert_eq!(cursor.node().kind(), ";");
    cursor.reset(tree.root_node().named_child(2).unwrap());
    assert_eq!(cursor.node().kind(), "block");
    assert_eq!(cursor.depth(), 0);
    assert!(!cursor.goto_parent());
}

#[test]
fn test_cursor_field_names() {
    let tree = parse("x * (y + 1);");
    let mut cursor = tree.walk();
    assert!(cursor.goto_first_child());
    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "binary_expression");
    assert_eq!(cursor.field_name(), None);

    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "identifier");
    assert_eq!(cursor.field_name(), Some("left"));
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), "whitespace");
    assert_eq!(cursor.field_id(), None);
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.field_name(), Some("operator"));
    assert!(cursor.goto_next_sibling());
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), "parenthesized_expression");
    assert_eq!(cursor.field_name(), Some("right"));

    // Fields do not leak into the children of a visible node.
    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "(");
    assert_eq!(cursor.field_name(), None);
}

#[test]
fn test_goto_first_child_for_byte() {
    let tree = parse(SOURCE);
    let mut cursor = tree.walk();
    assert_eq!(cursor.goto_first_child_for_byte(15), Some(2));
    assert_eq!(cursor.node().kind(), "print_statement");

    cursor.reset(tree.root_node());
    assert_eq!(cursor.goto_first_child_for_byte(0), Some(0));
    assert_eq!(cursor.node().kind(), "declaration_statement");

    cursor.reset(tree.root_node());
    assert_eq!(cursor.goto_first_child_for_byte(31), None);
    assert_eq!(cursor.node().kind(), "source_file");
}

#[test]
fn test_parents_and_siblings() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    assert!(root.parent().is_none());

    let declaration = root.named_child(0).unwrap();
    let print = root.named_child(1).unwrap();
    let block = root.named_child(2).unwrap();
    assert_eq!(print.parent(), Some(root));
    assert_eq!(declaration.next_sibling().unwrap().kind(), "whitespace");
    assert_eq!(declaration.next_named_sibling(), Some(print));
    assert_eq!(declaration.prev_sibling(), None);
    assert_eq!(block.prev_named_sibling(), Some(print));
    assert_eq!(block.next_named_sibling(), None);
    assert_eq!(block.next_sibling().unwrap().kind(), "whitespace");

    let identifiers = nodes_of_kind(&tree, "identifier");
    assert_eq!(identifiers.len(), 3);
    assert_eq!(identifiers[1].parent(), Some(print));
    assert_eq!(identifiers[2].parent().unwrap().kind(), "expression_statement");
    assert_eq!(root.child_with_descendant(identifiers[2]), Some(block));
    assert_eq!(print.child_with_descendant(identifiers[1]), Some(identifiers[1]));
    assert_eq!(block.child_with_descendant(identifiers[1]), None);
}

#[test]
fn test_descendant_for_byte_range() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    assert_eq!(root.descendant_for_byte_range(8, 9).unwrap().kind(), "integer");
    assert_eq!(root.descendant_for_byte_range(10, 11).unwrap().kind(), "+");
    assert_eq!(
        root.named_descendant_for_byte_range(10, 11).unwrap().kind(),
        "binary_expression"
    );
    assert_eq!(
        root.descendant_for_byte_range(8, 13).unwrap().kind(),
        "binary_expression"
    );
    assert_eq!(root.descendant_for_byte_range(14, 15).unwrap().kind(), "whitespace");
    assert_eq!(
        root.named_descendant_for_byte_range(14, 15).unwrap().kind(),
        "source_file"
    );
    assert_eq!(root.descendant_for_byte_range(0, 31).unwrap(), root);

    let mut cursor = tree.walk();
    let node = cursor.goto_descendant_for_byte_range(26, 27);
    assert_eq!(node.kind(), "identifier");
    assert_eq!(cursor.node(), node);
    assert!(cursor.goto_parent());
    assert_eq!(cursor.node().kind(), "expression_statement");
}

#[test]
fn test_preorder_visits_every_visible_node() {
    let tree = parse(SOURCE);
    let mut nodes = tree.preorder();
    let first = nodes.next().unwrap();
    assert_eq!(first.kind(), "source_file");

    let mut count = 1;
    let mut last_start = 0;
    while let Some(node) = nodes.next() {
        assert!(node.start_byte() >= last_start);
        last_start = node.start_byte();
        count += 1;
    }
    // The root, three statements with their insides, and the three
    // top-level newlines.
    assert_eq!(count, 1 + 15 + 5 + 8 + 3);
    assert!(nodes.next().is_none());
}

#[test]
fn test_node_identity() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    assert_eq!(root, tree.root_node());
    assert_eq!(root.id(), tree.root_node().id());
    let first = root.named_child(0).unwrap();
    let second = root.named_child(1).unwrap();
    assert_ne!(first, second);
    assert_ne!(first.id(), second.id());
    assert_eq!(
        format!("{first:?}"),
        "{Node declaration_statement (0, 0) - (0, 14)}"
    );
}

#[test]
fn test_tree_debug_shows_the_sexp() {
    let tree = parse("x;");
    assert_eq!(
        format!("{tree:?}"),
        "{Tree (source_file (expression_statement (identifier)))}"
    );
    assert_eq!(tree.language().name(), Some("morpho"));
}
