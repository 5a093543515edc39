// The parsing runtime: grammar tables, lexing, the LR engine with error
// recovery, and the trees it produces.

// Plain value types
pub mod error_costs;
pub mod length;
pub mod point;

// Grammar tables
pub mod language;
pub mod reduce_action;
pub mod table_writer;

// Syntax tree storage
pub mod subtree;

// Parsing
pub mod lexer;
pub mod parser;
pub mod reusable_node;
pub mod stack;

// Trees and navigation
pub mod get_changed_ranges;
pub mod node;
pub mod tree;
pub mod tree_cursor;
