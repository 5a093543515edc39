mod common;

use morf::{
    morpho, GrammarTable, Language, LexAccept, LexState, LoadError, ParseAction, ReduceAction,
    BUILTIN_SYM_END, BUILTIN_SYM_ERROR, LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION,
    START_STATE,
};
use rstest::rstest;

#[test]
fn test_can_load_grammar() {
    let language = morpho::language();
    assert!(language.is_ok(), "error loading Morpho grammar: {language:?}");
}

#[test]
fn test_morpho_header() {
    let language = common::language();
    assert_eq!(language.name(), Some("morpho"));
    assert_eq!(language.version(), LANGUAGE_VERSION);
    assert_eq!(language.symbol_count(), 29);
    assert_eq!(language.token_count(), 16);
    assert_eq!(language.state_count(), 41);
    assert_eq!(language.field_count(), 5);
}

#[test]
fn test_symbol_lookups() {
    let language = common::language();
    let identifier = language.symbol_for_name("identifier", true).unwrap();
    assert_eq!(language.symbol_name(identifier), Some("identifier"));
    assert!(language.node_kind_is_named(identifier));

    let semicolon = language.symbol_for_name(";", false).unwrap();
    assert!(!language.node_kind_is_named(semicolon));
    assert!(language.node_kind_is_visible(semicolon));
    assert_eq!(language.symbol_for_name(";", true), None);

    // Hidden symbols cannot be looked up by name.
    assert_eq!(language.symbol_for_name("_statement", true), None);
    assert_eq!(language.symbol_for_name("_statement", false), None);

    assert_eq!(language.symbol_name(BUILTIN_SYM_ERROR), Some("ERROR"));
    assert_eq!(language.symbol_for_name("ERROR", true), Some(BUILTIN_SYM_ERROR));
    assert!(language.node_kind_is_named(BUILTIN_SYM_ERROR));

    let comment = language.symbol_for_name("comment", true).unwrap();
    assert!(language.symbol_metadata(comment).extra);
}

#[test]
fn test_field_lookups() {
    let language = common::language();
    let names: Vec<_> = (1..=language.field_count() as u16)
        .map(|id| language.field_name_for_id(id).unwrap())
        .collect();
    assert_eq!(names, ["left", "name", "operator", "right", "value"]);
    assert_eq!(language.field_id_for_name("value"), Some(5));
    assert_eq!(language.field_id_for_name("missing"), None);
    assert_eq!(language.field_name_for_id(0), None);
    assert_eq!(language.field_name_for_id(6), None);
}

#[test]
fn test_table_lookups() {
    let language = common::language();
    let source_file = language.symbol_for_name("source_file", true).unwrap();
    assert_ne!(language.next_state(START_STATE, source_file), 0);
    assert!(matches!(
        language.action(START_STATE, BUILTIN_SYM_END),
        Some(ParseAction::Reduce(ReduceAction { symbol, count: 0, .. })) if symbol == source_file
    ));
    let accept_state = language.next_state(START_STATE, source_file);
    assert_eq!(
        language.action(accept_state, BUILTIN_SYM_END),
        Some(ParseAction::Accept)
    );
    // Out-of-range lookups are simply empty.
    assert_eq!(language.action(500, 1), None);
    assert_eq!(language.next_state(START_STATE, 900), 0);
}

#[test]
fn test_loading_twice_gives_independent_handles() {
    let bytes = morpho::table_bytes();
    let first = Language::load(&bytes).unwrap();
    let second = Language::load(&bytes).unwrap();
    assert!(!Language::ptr_eq(&first, &second));
    assert!(Language::ptr_eq(&first, &first.clone()));
    assert_eq!(first.table(), second.table());
    assert_eq!(bytes, morpho::table_bytes());
}

#[test]
fn test_encoding_reproduces_the_table() {
    let table = morpho::table();
    let decoded = GrammarTable::from_bytes(&table.to_bytes()).unwrap();
    assert_eq!(decoded, table);
}

#[rstest]
#[case(MIN_COMPATIBLE_LANGUAGE_VERSION)]
#[case(LANGUAGE_VERSION)]
fn test_supported_versions_load(#[case] version: u32) {
    let mut table = morpho::table();
    table.version = version;
    let language = Language::load(&table.to_bytes()).unwrap();
    assert_eq!(language.version(), version);
    if version < 2 {
        assert_eq!(language.name(), None);
    } else {
        assert_eq!(language.name(), Some("morpho"));
    }
}

#[rstest]
#[case(0)]
#[case(3)]
#[case(99)]
fn test_unsupported_versions_are_rejected(#[case] version: u32) {
    let mut table = morpho::table();
    table.version = version;
    assert_eq!(
        Language::load(&table.to_bytes()).unwrap_err(),
        LoadError::IncompatibleVersion {
            version,
            min: MIN_COMPATIBLE_LANGUAGE_VERSION,
            max: LANGUAGE_VERSION,
        }
    );
}

#[test]
fn test_every_truncation_is_corrupt() {
    let bytes = morpho::table_bytes();
    for length in 0..bytes.len() {
        match Language::load(&bytes[..length]) {
            Err(LoadError::CorruptTable(_)) => {}
            other => panic!("prefix of {length} bytes gave {other:?}"),
        }
    }
}

#[test]
fn test_trailing_bytes_are_corrupt() {
    let mut bytes = morpho::table_bytes();
    bytes.push(0);
    assert!(matches!(Language::load(&bytes), Err(LoadError::CorruptTable(_))));
}

#[test]
fn test_bad_magic_is_corrupt() {
    let mut bytes = morpho::table_bytes();
    bytes[0] = b'X';
    assert!(matches!(Language::load(&bytes), Err(LoadError::CorruptTable(_))));
}

#[test]
fn test_reduction_to_an_unknown_symbol() {
    let mut table = morpho::table();
    table.set_action(
        START_STATE,
        BUILTIN_SYM_END,
        ParseAction::Reduce(ReduceAction::new(200, 0, 0)),
    );
    assert_eq!(
        Language::load(&table.to_bytes()).unwrap_err(),
        LoadError::UnknownSymbol {
            symbol: 200,
            symbol_count: 29,
        }
    );
}

#[test]
fn test_lexer_accepting_an_unknown_symbol() {
    let mut table = morpho::table();
    table.lex_states.push(LexState {
        accept: vec![LexAccept {
            symbol: 77,
            priority: 0,
        }],
        transitions: Vec::new(),
    });
    assert!(matches!(
        Language::load(&table.to_bytes()),
        Err(LoadError::UnknownSymbol { symbol: 77, .. })
    ));
}

#[test]
fn test_shift_to_a_missing_state_is_corrupt() {
    let mut table = morpho::table();
    table.set_action(START_STATE, 1, ParseAction::Shift { state: 1000 });
    let error = Language::load(&table.to_bytes()).unwrap_err();
    assert!(matches!(error, LoadError::CorruptTable(_)));
    assert!(error.to_string().contains("1000"), "{error}");
}
