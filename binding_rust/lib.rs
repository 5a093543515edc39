//! An incremental, table-driven parsing runtime.
//!
//! A compiled grammar is loaded into a [`Language`], which a [`Parser`] uses
//! to turn source text into a concrete syntax [`Tree`]. After the text
//! changes, [`Tree::edit`] describes the change and the next
//! [`Parser::parse`] reuses every subtree the edit could not have affected.
//!
//! ```
//! use morf::{morpho, Parser};
//!
//! let language = morpho::language().unwrap();
//! let mut parser = Parser::new();
//! parser.set_language(&language);
//!
//! let tree = parser.parse("var x = 1 + 2;", None).unwrap();
//! assert_eq!(
//!     tree.root_node().to_sexp(),
//!     "(source_file (declaration_statement (variable_declaration \
//!      name: (identifier) value: (binary_expression left: (integer) right: (integer)))))",
//! );
//! ```

#[path = "../src_rust/mod.rs"]
mod runtime;

pub mod morpho;

pub use runtime::error_costs::ERROR_STATE;
pub use runtime::language::{
    FieldId, FieldMapEntry, GrammarTable, Language, LexAccept, LexMode, LexState,
    LexTransition, LoadError, ParseAction, StateId, Symbol, SymbolInfo, SymbolMetadata,
    BUILTIN_SYM_END, BUILTIN_SYM_ERROR, HEADER_SIZE, LANGUAGE_VERSION,
    MIN_COMPATIBLE_LANGUAGE_VERSION, START_STATE, TABLE_MAGIC,
};
pub use runtime::lexer::{ExternalScanner, ExternalToken, ScanInput};
pub use runtime::node::Node;
pub use runtime::parser::{LogType, Logger, Parser, ParserOptions};
pub use runtime::point::Point;
pub use runtime::reduce_action::ReduceAction;
pub use runtime::tree::{InputEdit, PreorderNodes, Range, Tree};
pub use runtime::tree_cursor::TreeCursor;
