mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use morf::{
    ExternalScanner, ExternalToken, GrammarTable, Language, LexAccept, LexMode, LexState,
    LexTransition, ParseAction, Parser, ReduceAction, ScanInput, SymbolMetadata, Tree,
    BUILTIN_SYM_END, LANGUAGE_VERSION,
};
use rstest::rstest;

use common::{assert_total, dump, nodes_of_kind, splice};

const WORD: u16 = 1;
const STRING: u16 = 2;
const WHITESPACE: u16 = 3;
const SOURCE_FILE: u16 = 4;
const REPEAT: u16 = 5;

/// Double-quoted strings, which the lex table cannot express.
#[derive(Default)]
struct QuotedStrings {
    calls: AtomicUsize,
}

impl ExternalScanner for QuotedStrings {
    fn scan(&self, input: &ScanInput<'_>, valid_symbols: &[bool]) -> Option<ExternalToken> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !valid_symbols.first().copied().unwrap_or(false) || input.peek(0) != Some(b'"') {
            return None;
        }
        let mut length = 1;
        while input.peek(length)? != b'"' {
            length += 1;
        }
        Some(ExternalToken {
            index: 0,
            length: length + 1,
        })
    }
}

// source_file: (word | string)*
fn table() -> GrammarTable {
    let token = SymbolMetadata::new(true, false);
    let mut table = GrammarTable::new(LANGUAGE_VERSION);
    table.name = Some("quoted".to_string());
    table.add_symbol("end", SymbolMetadata::default());
    table.add_symbol("word", SymbolMetadata::new(true, true));
    table.add_symbol("string", SymbolMetadata::new(true, true));
    table.add_symbol("whitespace", SymbolMetadata { extra: true, ..token });
    table.token_count = 4;
    table.add_symbol("source_file", SymbolMetadata::new(true, true));
    table.add_symbol("source_file_repeat1", SymbolMetadata::new(false, false));

    table.add_lex_state(LexState {
        accept: Vec::new(),
        transitions: vec![
            LexTransition {
                min: b'\t',
                max: b'\r',
                next_state: 1,
            },
            LexTransition {
                min: b' ',
                max: b' ',
                next_state: 1,
            },
            LexTransition {
                min: b'a',
                max: b'z',
                next_state: 2,
            },
        ],
    });
    table.add_lex_state(LexState {
        accept: vec![LexAccept {
            symbol: WHITESPACE,
            priority: 0,
        }],
        transitions: vec![
            LexTransition {
                min: b'\t',
                max: b'\r',
                next_state: 1,
            },
            LexTransition {
                min: b' ',
                max: b' ',
                next_state: 1,
            },
        ],
    });
    table.add_lex_state(LexState {
        accept: vec![LexAccept {
            symbol: WORD,
            priority: 0,
        }],
        transitions: vec![LexTransition {
            min: b'a',
            max: b'z',
            next_state: 2,
        }],
    });

    table.add_external_token(STRING);
    let external_lex_state = table.add_external_scanner_state(vec![true]);
    table.set_state_count(
        6,
        LexMode {
            lex_state: 0,
            external_lex_state,
        },
    );

    let reduce = |symbol, count| ParseAction::Reduce(ReduceAction::new(symbol, count, 0));
    for item in [WORD, STRING] {
        table.set_action(1, item, ParseAction::Shift { state: 2 });
        table.set_action(3, item, ParseAction::Shift { state: 5 });
    }
    table.set_action(1, BUILTIN_SYM_END, reduce(SOURCE_FILE, 0));
    table.set_action(1, SOURCE_FILE, ParseAction::Shift { state: 4 });
    table.set_action(1, REPEAT, ParseAction::Shift { state: 3 });
    table.set_action(3, BUILTIN_SYM_END, reduce(SOURCE_FILE, 1));
    table.set_action(4, BUILTIN_SYM_END, ParseAction::Accept);
    for lookahead in [WORD, STRING, BUILTIN_SYM_END] {
        table.set_action(2, lookahead, reduce(REPEAT, 1));
        table.set_action(5, lookahead, reduce(REPEAT, 2));
    }
    table
}

fn language(scanner: Arc<QuotedStrings>) -> Language {
    Language::load_with_scanner(&table().to_bytes(), scanner).unwrap()
}

fn parse(language: &Language, source: &str, old_tree: Option<&Tree>) -> Tree {
    let mut parser = Parser::new();
    parser.set_language(language);
    parser.parse(source, old_tree).unwrap()
}

const SOURCE: &str = "say \"hello world\" twice\n\"a\" b";

#[test]
fn test_scanner_tokens_appear_in_the_tree() {
    let language = language(Arc::default());
    let tree = parse(&language, SOURCE, None);
    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (word) (string) (word) (string) (word))"
    );
    let strings = nodes_of_kind(&tree, "string");
    assert_eq!(strings.len(), 2);
    assert_eq!(strings[0].byte_range(), 4..17);
    assert_eq!(strings[1].byte_range(), 24..27);
    assert!(strings[0].is_named());
    assert_total(&tree, SOURCE);
}

#[test]
fn test_unterminated_string_is_an_error() {
    let source = "say \"oops";
    let language = language(Arc::default());
    let tree = parse(&language, source, None);
    assert!(tree.root_node().has_error());
    assert!(nodes_of_kind(&tree, "string").is_empty());
    assert_total(&tree, source);
}

#[rstest]
#[case::inside_string(11, 16, "there")]
#[case::after_string(17, 17, "x")]
#[case::before_string(4, 4, "x")]
#[case::delete_closing_quote(16, 17, "")]
#[case::open_new_string(18, 18, "\"")]
fn test_edits_around_scanner_tokens_match_fresh_parse(
    #[case] start: usize,
    #[case] old_end: usize,
    #[case] replacement: &str,
) {
    let language = language(Arc::default());
    let mut old_tree = parse(&language, SOURCE, None);
    let (new_source, edit) = splice(SOURCE, start, old_end, replacement);
    old_tree.edit(&edit);
    let tree = parse(&language, &new_source, Some(&old_tree));

    let fresh = parse(&language, &new_source, None);
    assert_eq!(tree.root_node().to_sexp(), fresh.root_node().to_sexp());
    assert_eq!(dump(&tree), dump(&fresh));
    assert_total(&tree, &new_source);
}

#[test]
fn test_edit_inside_string_rescans_only_nearby_tokens() {
    let scanner = Arc::new(QuotedStrings::default());
    let language = language(Arc::clone(&scanner));
    let mut old_tree = parse(&language, SOURCE, None);
    let (new_source, edit) = splice(SOURCE, 11, 16, "there");
    old_tree.edit(&edit);

    scanner.calls.store(0, Ordering::Relaxed);
    let tree = parse(&language, &new_source, Some(&old_tree));
    let incremental_calls = scanner.calls.load(Ordering::Relaxed);

    scanner.calls.store(0, Ordering::Relaxed);
    let fresh = parse(&language, &new_source, None);
    let fresh_calls = scanner.calls.load(Ordering::Relaxed);

    assert!(incremental_calls > 0);
    assert!(
        incremental_calls < fresh_calls,
        "{incremental_calls} scans after the edit, {fresh_calls} from scratch"
    );
    assert_eq!(dump(&tree), dump(&fresh));
}

#[test]
fn test_strings_after_an_insertion_shift() {
    let source = "a \"b\" c";
    let language = language(Arc::default());
    let mut old_tree = parse(&language, source, None);
    let (new_source, edit) = splice(source, 0, 0, "zz ");
    old_tree.edit(&edit);
    let tree = parse(&language, &new_source, Some(&old_tree));

    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (word) (word) (string) (word))"
    );
    let strings = nodes_of_kind(&tree, "string");
    assert_eq!(strings[0].byte_range(), 5..8);
    assert_eq!(dump(&tree), dump(&parse(&language, &new_source, None)));
}
