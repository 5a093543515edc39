//! Compiled tables for a subset of the Morpho language.
//!
//! The grammar covered here:
//!
//! ```text
//! source_file           := _statement*
//! _statement            := expression_statement | declaration_statement
//!                        | print_statement | block
//! expression_statement  := _expression ";"
//! declaration_statement := "var" variable_declaration ("," variable_declaration)* ";"
//! variable_declaration  := name: identifier ("=" value: _expression)?
//! print_statement       := "print" _expression ";"
//! block                 := "{" _statement* "}"
//! _expression           := identifier | integer | binary_expression
//!                        | parenthesized_expression
//! binary_expression     := left: _expression operator: ("+" | "*") right: _expression
//! parenthesized_expression := "(" _expression ")"
//! ```
//!
//! `*` binds tighter than `+` and both associate to the left. Whitespace and
//! `//` line comments are extras. The parse table is SLR(1).

use crate::{
    FieldId, FieldMapEntry, GrammarTable, Language, LexAccept, LexMode, LexState,
    LexTransition, LoadError, ParseAction, ReduceAction, StateId, Symbol, SymbolMetadata,
    LANGUAGE_VERSION,
};

pub const GRAMMAR_NAME: &str = "morpho";

// Terminals
const END: Symbol = 0;
const IDENTIFIER: Symbol = 1;
const INTEGER: Symbol = 2;
const VAR: Symbol = 3;
const PRINT: Symbol = 4;
const EQUAL: Symbol = 5;
const COMMA: Symbol = 6;
const SEMICOLON: Symbol = 7;
const PLUS: Symbol = 8;
const STAR: Symbol = 9;
const LPAREN: Symbol = 10;
const RPAREN: Symbol = 11;
const LBRACE: Symbol = 12;
const RBRACE: Symbol = 13;
const COMMENT: Symbol = 14;
const WHITESPACE: Symbol = 15;
const TOKEN_COUNT: usize = 16;

// Nonterminals
const SOURCE_FILE: Symbol = 16;
const STATEMENT: Symbol = 17;
const EXPRESSION_STATEMENT: Symbol = 18;
const DECLARATION_STATEMENT: Symbol = 19;
const VARIABLE_DECLARATION: Symbol = 20;
const PRINT_STATEMENT: Symbol = 21;
const BLOCK: Symbol = 22;
const EXPRESSION: Symbol = 23;
const BINARY_EXPRESSION: Symbol = 24;
const PARENTHESIZED_EXPRESSION: Symbol = 25;
const SOURCE_FILE_REPEAT: Symbol = 26;
const BLOCK_REPEAT: Symbol = 27;
const VARIABLE_DECLARATION_LIST: Symbol = 28;

const STATE_COUNT: usize = 41;

/// Tokens that can begin a statement.
const STATEMENT_START: [Symbol; 6] = [IDENTIFIER, INTEGER, LPAREN, VAR, PRINT, LBRACE];
/// Tokens that can follow a complete statement.
const AFTER_STATEMENT: [Symbol; 8] = [
    IDENTIFIER, INTEGER, LPAREN, VAR, PRINT, LBRACE, RBRACE, END,
];
/// Tokens that can follow a complete expression.
const AFTER_EXPRESSION: [Symbol; 5] = [SEMICOLON, COMMA, PLUS, STAR, RPAREN];
/// Tokens that can follow a variable declaration.
const AFTER_DECLARATION: [Symbol; 2] = [SEMICOLON, COMMA];

/// The loaded language.
pub fn language() -> Result<Language, LoadError> {
    Language::load(&table_bytes())
}

/// The tables in their binary form.
#[must_use]
pub fn table_bytes() -> Vec<u8> {
    table().to_bytes()
}

/// The tables, before encoding.
#[must_use]
pub fn table() -> GrammarTable {
    let mut table = GrammarTable::new(LANGUAGE_VERSION);
    table.name = Some(GRAMMAR_NAME.to_string());
    add_symbols(&mut table);
    add_fields(&mut table);
    add_lex_states(&mut table);
    table.set_state_count(
        STATE_COUNT,
        LexMode {
            lex_state: LEX_START,
            external_lex_state: 0,
        },
    );
    add_parse_actions(&mut table);
    table
}

fn add_symbols(table: &mut GrammarTable) {
    let token = SymbolMetadata::new(true, false);
    let named = SymbolMetadata::new(true, true);
    let hidden = SymbolMetadata::new(false, false);
    let supertype = SymbolMetadata {
        supertype: true,
        ..hidden
    };
    let symbols = [
        ("end", SymbolMetadata::default()),
        ("identifier", named),
        ("integer", named),
        ("var", token),
        ("print", token),
        ("=", token),
        (",", token),
        (";", token),
        ("+", token),
        ("*", token),
        ("(", token),
        (")", token),
        ("{", token),
        ("}", token),
        ("comment", SymbolMetadata { extra: true, ..named }),
        ("whitespace", SymbolMetadata { extra: true, ..token }),
        ("source_file", named),
        ("_statement", supertype),
        ("expression_statement", named),
        ("declaration_statement", named),
        ("variable_declaration", named),
        ("print_statement", named),
        ("block", named),
        ("_expression", supertype),
        ("binary_expression", named),
        ("parenthesized_expression", named),
        ("source_file_repeat1", hidden),
        ("block_repeat1", hidden),
        ("_variable_declaration_list", hidden),
    ];
    for (name, metadata) in symbols {
        table.add_symbol(name, metadata);
    }
    table.token_count = TOKEN_COUNT;
}

// Production ids, i.e. indices into the field maps.
const NO_FIELDS: u16 = 0;
const BINARY_FIELDS: u16 = 1;
const DECLARATION_NAME_FIELDS: u16 = 2;
const DECLARATION_VALUE_FIELDS: u16 = 3;

fn add_fields(table: &mut GrammarTable) {
    let left = table.add_field("left");
    let name = table.add_field("name");
    let operator = table.add_field("operator");
    let right = table.add_field("right");
    let value = table.add_field("value");

    let field = |field_id: FieldId, child_index: u8| FieldMapEntry {
        field_id,
        child_index,
        inherited: false,
    };
    table.add_production(Vec::new());
    table.add_production(vec![field(left, 0), field(operator, 1), field(right, 2)]);
    table.add_production(vec![field(name, 0)]);
    table.add_production(vec![field(name, 0), field(value, 2)]);
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

const LEX_START: u16 = 0;
const LEX_WHITESPACE: u16 = 1;
const LEX_SLASH: u16 = 2;
const LEX_COMMENT: u16 = 3;
const LEX_INTEGER: u16 = 4;
const LEX_IDENTIFIER: u16 = 5;
/// First state of the single-character punctuation tokens.
const LEX_PUNCTUATION: u16 = 6;
const PUNCTUATION: [(u8, Symbol); 9] = [
    (b'=', EQUAL),
    (b',', COMMA),
    (b';', SEMICOLON),
    (b'+', PLUS),
    (b'*', STAR),
    (b'(', LPAREN),
    (b')', RPAREN),
    (b'{', LBRACE),
    (b'}', RBRACE),
];
const KEYWORDS: [(&str, Symbol); 2] = [("var", VAR), ("print", PRINT)];

const KEYWORD_PRIORITY: u16 = 0;
const IDENTIFIER_PRIORITY: u16 = 1;

fn range(min: u8, max: u8, next_state: u16) -> LexTransition {
    LexTransition {
        min,
        max,
        next_state,
    }
}

fn accept(symbol: Symbol, priority: u16) -> LexAccept {
    LexAccept { symbol, priority }
}

fn identifier_transitions() -> Vec<LexTransition> {
    vec![
        range(b'0', b'9', LEX_IDENTIFIER),
        range(b'A', b'Z', LEX_IDENTIFIER),
        range(b'_', b'_', LEX_IDENTIFIER),
        range(b'a', b'z', LEX_IDENTIFIER),
    ]
}

fn add_lex_states(table: &mut GrammarTable) {
    let keyword_base = LEX_PUNCTUATION + PUNCTUATION.len() as u16;

    // Keyword prefixes get their own chains of states, ahead of the general
    // identifier ranges.
    let mut start_transitions = vec![
        range(b'\t', b'\r', LEX_WHITESPACE),
        range(b' ', b' ', LEX_WHITESPACE),
        range(b'/', b'/', LEX_SLASH),
        range(b'0', b'9', LEX_INTEGER),
    ];
    for (index, (byte, _)) in PUNCTUATION.iter().enumerate() {
        start_transitions.push(range(*byte, *byte, LEX_PUNCTUATION + index as u16));
    }
    let mut keyword_states = Vec::new();
    for (word, symbol) in KEYWORDS {
        let first = keyword_base + keyword_states.len() as u16;
        let bytes = word.as_bytes();
        start_transitions.push(range(bytes[0], bytes[0], first));
        for (index, _) in bytes.iter().enumerate() {
            let mut state = LexState {
                accept: vec![accept(IDENTIFIER, IDENTIFIER_PRIORITY)],
                transitions: Vec::new(),
            };
            match bytes.get(index + 1) {
                Some(&next) => state
                    .transitions
                    .push(range(next, next, first + index as u16 + 1)),
                None => state.accept.insert(0, accept(symbol, KEYWORD_PRIORITY)),
            }
            state.transitions.extend(identifier_transitions());
            keyword_states.push(state);
        }
    }
    start_transitions.extend(identifier_transitions().into_iter().skip(1));

    table.add_lex_state(LexState {
        accept: Vec::new(),
        transitions: start_transitions,
    });
    table.add_lex_state(LexState {
        accept: vec![accept(WHITESPACE, 0)],
        transitions: vec![
            range(b'\t', b'\r', LEX_WHITESPACE),
            range(b' ', b' ', LEX_WHITESPACE),
        ],
    });
    table.add_lex_state(LexState {
        accept: Vec::new(),
        transitions: vec![range(b'/', b'/', LEX_COMMENT)],
    });
    table.add_lex_state(LexState {
        accept: vec![accept(COMMENT, 0)],
        transitions: vec![
            range(0, b'\n' - 1, LEX_COMMENT),
            range(b'\n' + 1, u8::MAX, LEX_COMMENT),
        ],
    });
    table.add_lex_state(LexState {
        accept: vec![accept(INTEGER, 0)],
        transitions: vec![range(b'0', b'9', LEX_INTEGER)],
    });
    table.add_lex_state(LexState {
        accept: vec![accept(IDENTIFIER, IDENTIFIER_PRIORITY)],
        transitions: identifier_transitions(),
    });
    for (_, symbol) in PUNCTUATION {
        table.add_lex_state(LexState {
            accept: vec![accept(symbol, 0)],
            transitions: Vec::new(),
        });
    }
    for state in keyword_states {
        table.add_lex_state(state);
    }
}

// ---------------------------------------------------------------------------
// Parse table
// ---------------------------------------------------------------------------

fn shift(table: &mut GrammarTable, state: StateId, symbol: Symbol, next_state: StateId) {
    table.set_action(state, symbol, ParseAction::Shift { state: next_state });
}

fn reduce(
    table: &mut GrammarTable,
    state: StateId,
    lookaheads: &[Symbol],
    symbol: Symbol,
    count: u32,
    production_id: u16,
) {
    let action = ParseAction::Reduce(ReduceAction::new(symbol, count, production_id));
    for &lookahead in lookaheads {
        table.set_action(state, lookahead, action);
    }
}

/// Actions shared by every state where an expression may begin.
fn expression_start(table: &mut GrammarTable, state: StateId, expression_goto: StateId) {
    shift(table, state, IDENTIFIER, 13);
    shift(table, state, INTEGER, 14);
    shift(table, state, LPAREN, 17);
    shift(table, state, EXPRESSION, expression_goto);
    shift(table, state, BINARY_EXPRESSION, 15);
    shift(table, state, PARENTHESIZED_EXPRESSION, 16);
}

/// Actions shared by every state where a statement may begin.
fn statement_start(table: &mut GrammarTable, state: StateId, statement_goto: StateId) {
    expression_start(table, state, 9);
    shift(table, state, VAR, 10);
    shift(table, state, PRINT, 11);
    shift(table, state, LBRACE, 12);
    shift(table, state, STATEMENT, statement_goto);
    shift(table, state, EXPRESSION_STATEMENT, 5);
    shift(table, state, DECLARATION_STATEMENT, 6);
    shift(table, state, PRINT_STATEMENT, 7);
    shift(table, state, BLOCK, 8);
}

fn add_parse_actions(table: &mut GrammarTable) {
    let after_repeat = {
        let mut symbols = STATEMENT_START.to_vec();
        symbols.push(END);
        symbols
    };
    let after_block_repeat = {
        let mut symbols = STATEMENT_START.to_vec();
        symbols.push(RBRACE);
        symbols
    };

    // 1: start of the file
    statement_start(table, 1, 4);
    reduce(table, 1, &[END], SOURCE_FILE, 0, NO_FIELDS);
    shift(table, 1, SOURCE_FILE, 2);
    shift(table, 1, SOURCE_FILE_REPEAT, 3);

    // 2: source_file .
    table.set_action(2, END, ParseAction::Accept);

    // 3: source_file_repeat1 . _statement
    statement_start(table, 3, 18);
    reduce(table, 3, &[END], SOURCE_FILE, 1, NO_FIELDS);

    // 4: _statement . (first in the file)
    reduce(table, 4, &after_repeat, SOURCE_FILE_REPEAT, 1, NO_FIELDS);

    // 5..8: a complete statement of each kind
    for state in 5..=8 {
        reduce(table, state, &AFTER_STATEMENT, STATEMENT, 1, NO_FIELDS);
    }

    // 9: _expression . ";"
    shift(table, 9, SEMICOLON, 19);
    shift(table, 9, PLUS, 20);
    shift(table, 9, STAR, 21);

    // 10: "var" . declarations
    shift(table, 10, IDENTIFIER, 24);
    shift(table, 10, VARIABLE_DECLARATION, 23);
    shift(table, 10, VARIABLE_DECLARATION_LIST, 22);

    // 11: "print" . _expression ";"
    expression_start(table, 11, 25);

    // 12: "{" . statements "}"
    statement_start(table, 12, 28);
    shift(table, 12, RBRACE, 26);
    shift(table, 12, BLOCK_REPEAT, 27);

    // 13..16: an expression made of a single child
    reduce(table, 13, &AFTER_EXPRESSION, EXPRESSION, 1, NO_FIELDS);
    reduce(table, 14, &AFTER_EXPRESSION, EXPRESSION, 1, NO_FIELDS);
    reduce(table, 15, &AFTER_EXPRESSION, EXPRESSION, 1, NO_FIELDS);
    reduce(table, 16, &AFTER_EXPRESSION, EXPRESSION, 1, NO_FIELDS);

    // 17: "(" . _expression ")"
    expression_start(table, 17, 29);

    // 18: source_file_repeat1 _statement .
    reduce(table, 18, &after_repeat, SOURCE_FILE_REPEAT, 2, NO_FIELDS);

    // 19: _expression ";" .
    reduce(table, 19, &AFTER_STATEMENT, EXPRESSION_STATEMENT, 2, NO_FIELDS);

    // 20, 21: _expression operator . _expression
    expression_start(table, 20, 30);
    expression_start(table, 21, 31);

    // 22: "var" declarations . ";"
    shift(table, 22, SEMICOLON, 32);
    shift(table, 22, COMMA, 33);

    // 23: variable_declaration . (first in the list)
    reduce(table, 23, &AFTER_DECLARATION, VARIABLE_DECLARATION_LIST, 1, NO_FIELDS);

    // 24: identifier . ("=" _expression)?
    reduce(table, 24, &AFTER_DECLARATION, VARIABLE_DECLARATION, 1, DECLARATION_NAME_FIELDS);
    shift(table, 24, EQUAL, 34);

    // 25: "print" _expression . ";"
    shift(table, 25, SEMICOLON, 35);
    shift(table, 25, PLUS, 20);
    shift(table, 25, STAR, 21);

    // 26: "{" "}" .
    reduce(table, 26, &AFTER_STATEMENT, BLOCK, 2, NO_FIELDS);

    // 27: "{" block_repeat1 . "}"
    statement_start(table, 27, 37);
    shift(table, 27, RBRACE, 36);

    // 28: _statement . (first in a block)
    reduce(table, 28, &after_block_repeat, BLOCK_REPEAT, 1, NO_FIELDS);

    // 29: "(" _expression . ")"
    shift(table, 29, RPAREN, 38);
    shift(table, 29, PLUS, 20);
    shift(table, 29, STAR, 21);

    // 30: _expression "+" _expression .
    reduce(table, 30, &AFTER_EXPRESSION, BINARY_EXPRESSION, 3, BINARY_FIELDS);
    shift(table, 30, STAR, 21);

    // 31: _expression "*" _expression .
    reduce(table, 31, &AFTER_EXPRESSION, BINARY_EXPRESSION, 3, BINARY_FIELDS);

    // 32: "var" declarations ";" .
    reduce(table, 32, &AFTER_STATEMENT, DECLARATION_STATEMENT, 3, NO_FIELDS);

    // 33: declarations "," . variable_declaration
    shift(table, 33, IDENTIFIER, 24);
    shift(table, 33, VARIABLE_DECLARATION, 39);

    // 34: identifier "=" . _expression
    expression_start(table, 34, 40);

    // 35: "print" _expression ";" .
    reduce(table, 35, &AFTER_STATEMENT, PRINT_STATEMENT, 3, NO_FIELDS);

    // 36: "{" block_repeat1 "}" .
    reduce(table, 36, &AFTER_STATEMENT, BLOCK, 3, NO_FIELDS);

    // 37: block_repeat1 _statement .
    reduce(table, 37, &after_block_repeat, BLOCK_REPEAT, 2, NO_FIELDS);

    // 38: "(" _expression ")" .
    reduce(table, 38, &AFTER_EXPRESSION, PARENTHESIZED_EXPRESSION, 3, NO_FIELDS);

    // 39: declarations "," variable_declaration .
    reduce(table, 39, &AFTER_DECLARATION, VARIABLE_DECLARATION_LIST, 3, NO_FIELDS);

    // 40: identifier "=" _expression .
    reduce(table, 40, &AFTER_DECLARATION, VARIABLE_DECLARATION, 3, DECLARATION_VALUE_FIELDS);
    shift(table, 40, PLUS, 20);
    shift(table, 40, STAR, 21);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_chains_follow_the_punctuation_states() {
        let table = table();
        let keyword_base = (LEX_PUNCTUATION as usize) + PUNCTUATION.len();
        assert_eq!(table.lex_states.len(), keyword_base + "var".len() + "print".len());
        let var_state = &table.lex_states[keyword_base + 2];
        assert_eq!(var_state.accepted_symbol(), Some(VAR));
        let prefix_state = &table.lex_states[keyword_base + 1];
        assert_eq!(prefix_state.accepted_symbol(), Some(IDENTIFIER));
    }

    #[test]
    fn every_state_but_the_error_state_has_an_action() {
        let table = table();
        assert!((0..table.symbol_count() as Symbol)
            .all(|symbol| table.action(0, symbol).is_none()));
        for state in 1..STATE_COUNT as StateId {
            assert!(
                (0..TOKEN_COUNT as Symbol).any(|symbol| table.action(state, symbol).is_some()),
                "state {state} has no terminal actions"
            );
        }
    }

    #[test]
    fn table_validates() {
        table().validate().unwrap();
    }
}
