//! Table-driven tokenization.
//!
//! The lexer is a longest-match walk over the grammar's byte automaton,
//! starting from the lex state of the current parse state. Grammars with
//! context-sensitive tokens can plug in an `ExternalScanner`, which is asked
//! first whenever the parse state enables any external token.

use std::cell::Cell;
use std::ops::Range;

use super::language::{Language, LexMode, Symbol, BUILTIN_SYM_END, BUILTIN_SYM_ERROR};

// ---------------------------------------------------------------------------
// External scanners
// ---------------------------------------------------------------------------

/// A read-only view of the input handed to an external scanner.
///
/// Every byte the scanner looks at through `peek` is recorded, so that the
/// resulting token can be invalidated by edits to those bytes.
pub struct ScanInput<'a> {
    bytes: &'a [u8],
    start: usize,
    furthest: Cell<usize>,
}

impl<'a> ScanInput<'a> {
    fn new(bytes: &'a [u8], start: usize) -> Self {
        Self {
            bytes,
            start,
            furthest: Cell::new(start),
        }
    }

    /// The absolute byte offset where scanning starts.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The byte `offset` bytes after the start, or `None` at end of input.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        let index = self.start + offset;
        self.furthest.set(self.furthest.get().max(index + 1));
        self.bytes.get(index).copied()
    }

    fn window_end(&self) -> usize {
        self.furthest.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExternalToken {
    /// Index into the grammar's external tokens.
    pub index: usize,
    /// Length in bytes; must be positive.
    pub length: usize,
}

pub trait ExternalScanner: Send + Sync {
    /// Try to recognize one of the tokens marked `true` in `valid_symbols`.
    fn scan(&self, input: &ScanInput<'_>, valid_symbols: &[bool]) -> Option<ExternalToken>;
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub symbol: Symbol,
    pub start_byte: usize,
    pub end_byte: usize,
    /// One past the furthest byte examined while producing this token.
    pub lookahead_end: usize,
}

impl Token {
    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte..self.end_byte
    }

    pub fn lookahead_bytes(&self) -> u32 {
        self.lookahead_end.saturating_sub(self.end_byte) as u32
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

pub struct Lexer<'a> {
    language: &'a Language,
    input: &'a [u8],
}

impl<'a> Lexer<'a> {
    pub fn new(language: &'a Language, input: &'a [u8]) -> Self {
        Self { language, input }
    }

    /// Produce the token starting at `offset` in the given lex mode.
    ///
    /// Always returns a token: the end token at end of input, otherwise a
    /// one-byte ERROR token when nothing matches.
    pub fn next_token(&self, mode: LexMode, offset: usize) -> Token {
        if offset >= self.input.len() {
            return Token {
                symbol: BUILTIN_SYM_END,
                start_byte: self.input.len(),
                end_byte: self.input.len(),
                lookahead_end: self.input.len() + 1,
            };
        }

        let mut external_window_end = offset;
        if mode.external_lex_state != 0 {
            if let Some(scanner) = self.language.external_scanner() {
                let valid_symbols = self.language.enabled_external_tokens(mode.external_lex_state);
                let input = ScanInput::new(self.input, offset);
                let result = scanner.scan(&input, valid_symbols);
                external_window_end = input.window_end();
                let accepted =
                    result.and_then(|token| self.accept_external(token, valid_symbols, offset));
                if let Some(token) = accepted {
                    tracing::trace!(
                        "external token {} at {}..{}",
                        self.language.symbol_name(token.symbol).unwrap_or("?"),
                        token.start_byte,
                        token.end_byte
                    );
                    return Token {
                        lookahead_end: token.lookahead_end.max(external_window_end),
                        ..token
                    };
                }
            }
        }

        let mut token = self.scan_table(mode.lex_state, offset);
        token.lookahead_end = token.lookahead_end.max(external_window_end);
        token
    }

    fn accept_external(
        &self,
        token: ExternalToken,
        valid_symbols: &[bool],
        offset: usize,
    ) -> Option<Token> {
        if token.length == 0 || offset + token.length > self.input.len() {
            return None;
        }
        if !valid_symbols.get(token.index).copied().unwrap_or(false) {
            return None;
        }
        let symbol = self.language.external_symbol(token.index)?;
        Some(Token {
            symbol,
            start_byte: offset,
            end_byte: offset + token.length,
            lookahead_end: offset + token.length + 1,
        })
    }

    fn scan_table(&self, lex_state: u16, offset: usize) -> Token {
        let mut state = lex_state;
        let mut position = offset;
        let mut accepted: Option<(Symbol, usize)> = None;

        while let Some(&byte) = self.input.get(position) {
            let Some(next) = self
                .language
                .lex_state(state)
                .and_then(|current| current.next_state(byte))
            else {
                break;
            };
            state = next;
            position += 1;
            if let Some(symbol) = self
                .language
                .lex_state(state)
                .and_then(|current| current.accepted_symbol())
            {
                accepted = Some((symbol, position));
            }
        }

        // The byte at `position` (or the end of input) was examined too.
        let lookahead_end = position + 1;
        match accepted {
            Some((symbol, end_byte)) => Token {
                symbol,
                start_byte: offset,
                end_byte,
                lookahead_end,
            },
            None => {
                tracing::trace!("no token matches at byte {offset}");
                Token {
                    symbol: BUILTIN_SYM_ERROR,
                    start_byte: offset,
                    end_byte: offset + 1,
                    lookahead_end: lookahead_end.max(offset + 2),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::runtime::language::{
        GrammarTable, LexAccept, LexState, LexTransition, SymbolMetadata,
    };

    // Tokens: 1 = "a"+, 2 = "ab" keyword (wins over the word), 3 = external.
    fn table() -> GrammarTable {
        let mut table = GrammarTable::new(1);
        table.add_symbol("end", SymbolMetadata::default());
        table.add_symbol("word", SymbolMetadata::new(true, true));
        table.add_symbol("ab", SymbolMetadata::new(true, false));
        table.add_symbol("marker", SymbolMetadata::new(true, true));
        table.token_count = 4;
        let range = |min, max, next_state| LexTransition {
            min,
            max,
            next_state,
        };
        let accept = |symbol, priority| LexAccept { symbol, priority };
        table.add_lex_state(LexState {
            accept: vec![],
            transitions: vec![range(b'a', b'a', 1), range(b'b', b'z', 3)],
        });
        table.add_lex_state(LexState {
            accept: vec![accept(1, 1)],
            transitions: vec![range(b'b', b'b', 2), range(b'a', b'z', 3)],
        });
        table.add_lex_state(LexState {
            accept: vec![accept(1, 1), accept(2, 0)],
            transitions: vec![range(b'a', b'z', 3)],
        });
        table.add_lex_state(LexState {
            accept: vec![accept(1, 1)],
            transitions: vec![range(b'a', b'z', 3)],
        });
        table.add_external_token(3);
        let external = table.add_external_scanner_state(vec![true]);
        table.set_state_count(2, LexMode::default());
        table.lex_modes[1].external_lex_state = external;
        table
    }

    struct Marker;

    impl ExternalScanner for Marker {
        fn scan(&self, input: &ScanInput<'_>, valid_symbols: &[bool]) -> Option<ExternalToken> {
            if valid_symbols.first() == Some(&true) && input.peek(0) == Some(b'#') {
                Some(ExternalToken {
                    index: 0,
                    length: 1,
                })
            } else {
                None
            }
        }
    }

    #[test]
    fn keyword_beats_word_at_equal_length() {
        let language = Language::load(&table().to_bytes()).unwrap();
        let lexer = Lexer::new(&language, b"ab abc");
        let token = lexer.next_token(LexMode::default(), 0);
        assert_eq!((token.symbol, token.byte_range()), (2, 0..2));
        assert_eq!(token.lookahead_end, 3);
        let token = lexer.next_token(LexMode::default(), 3);
        assert_eq!((token.symbol, token.byte_range()), (1, 3..6));
        assert_eq!(token.lookahead_end, 7);
    }

    #[test]
    fn end_of_input_and_unmatched_bytes() {
        let language = Language::load(&table().to_bytes()).unwrap();
        let lexer = Lexer::new(&language, b"a?");
        let token = lexer.next_token(LexMode::default(), 1);
        assert_eq!((token.symbol, token.byte_range()), (BUILTIN_SYM_ERROR, 1..2));
        let token = lexer.next_token(LexMode::default(), 2);
        assert_eq!((token.symbol, token.byte_range()), (BUILTIN_SYM_END, 2..2));
    }

    #[test]
    fn external_scanner_runs_only_when_enabled() {
        let language = Language::load_with_scanner(&table().to_bytes(), Arc::new(Marker)).unwrap();
        let lexer = Lexer::new(&language, b"#a");
        let external_mode = language.lex_mode(1);
        let token = lexer.next_token(external_mode, 0);
        assert_eq!((token.symbol, token.byte_range()), (3, 0..1));

        let token = lexer.next_token(LexMode::default(), 0);
        assert_eq!(token.symbol, BUILTIN_SYM_ERROR);

        // The scanner declines "a", so the automaton takes over.
        let token = lexer.next_token(external_mode, 1);
        assert_eq!((token.symbol, token.byte_range()), (1, 1..2));
    }
}
