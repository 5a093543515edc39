//! Building grammar tables in memory and encoding them in the binary format
//! that `GrammarTable::from_bytes` reads.
//!
//! Symbols must all be added before `set_state_count`, since the parse table
//! is laid out by symbol count.

use super::language::{
    FieldId, FieldMapEntry, GrammarTable, LexMode, LexState, ParseAction, StateId, Symbol,
    SymbolInfo, SymbolMetadata, ACTION_ACCEPT, ACTION_NONE, ACTION_REDUCE, ACTION_SHIFT,
    HEADER_SIZE, LANGUAGE_VERSION_WITH_NAME, TABLE_MAGIC,
};

impl GrammarTable {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn add_symbol(&mut self, name: &str, metadata: SymbolMetadata) -> Symbol {
        self.symbols.push(SymbolInfo {
            name: name.to_string(),
            metadata,
        });
        (self.symbols.len() - 1) as Symbol
    }

    pub fn add_field(&mut self, name: &str) -> FieldId {
        self.field_names.push(name.to_string());
        self.field_names.len() as FieldId
    }

    /// Register a production's field map and return its id.
    pub fn add_production(&mut self, entries: Vec<FieldMapEntry>) -> u16 {
        self.field_maps.push(entries);
        (self.field_maps.len() - 1) as u16
    }

    pub fn add_lex_state(&mut self, state: LexState) -> u16 {
        self.lex_states.push(state);
        (self.lex_states.len() - 1) as u16
    }

    /// Resize the parse table, giving new states `lex_mode`.
    pub fn set_state_count(&mut self, count: usize, lex_mode: LexMode) {
        self.lex_modes.resize(count, lex_mode);
        self.parse_table.resize(count * self.symbols.len(), None);
    }

    pub fn set_action(&mut self, state: StateId, symbol: Symbol, action: ParseAction) {
        let index = state as usize * self.symbols.len() + symbol as usize;
        if let Some(cell) = self.parse_table.get_mut(index) {
            *cell = Some(action);
        }
    }

    pub fn add_external_token(&mut self, symbol: Symbol) -> usize {
        self.external_tokens.push(symbol);
        self.external_tokens.len() - 1
    }

    /// Register a set of valid external tokens; the first call also
    /// reserves index zero for "no external tokens".
    pub fn add_external_scanner_state(&mut self, valid: Vec<bool>) -> u16 {
        if self.external_scanner_states.is_empty() {
            self.external_scanner_states
                .push(vec![false; self.external_tokens.len()]);
        }
        self.external_scanner_states.push(valid);
        (self.external_scanner_states.len() - 1) as u16
    }

    /// Encode the table. The output always carries the header for
    /// `self.version`; a name is written only for versions that have one.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = TableWriter::default();
        for symbol in &self.symbols {
            body.string(&symbol.name);
            body.u8(symbol.metadata.to_flags());
        }
        for name in &self.field_names {
            body.string(name);
        }
        for entries in &self.field_maps {
            body.u16(entries.len() as u16);
            for entry in entries {
                body.u16(entry.field_id);
                body.u8(entry.child_index);
                body.u8(entry.inherited.into());
            }
        }
        for state in &self.lex_states {
            body.u16(state.accept.len() as u16);
            for accept in &state.accept {
                body.u16(accept.symbol);
                body.u16(accept.priority);
            }
            body.u16(state.transitions.len() as u16);
            for transition in &state.transitions {
                body.u8(transition.min);
                body.u8(transition.max);
                body.u16(transition.next_state);
            }
        }
        for mode in &self.lex_modes {
            body.u16(mode.lex_state);
            body.u16(mode.external_lex_state);
        }
        for index in 0..self.state_count() * self.symbol_count() {
            body.action(self.parse_table.get(index).copied().flatten());
        }
        for symbol in &self.external_tokens {
            body.u16(*symbol);
        }
        body.u16(self.external_scanner_states.len() as u16);
        for valid in &self.external_scanner_states {
            for index in 0..self.external_tokens.len() {
                body.u8(valid.get(index).copied().unwrap_or(false).into());
            }
        }
        if self.version >= LANGUAGE_VERSION_WITH_NAME {
            body.string(self.name.as_deref().unwrap_or_default());
        }

        let mut out = TableWriter::default();
        out.bytes.extend_from_slice(&TABLE_MAGIC);
        out.u32(self.version);
        out.u32(self.symbols.len() as u32);
        out.u32(self.token_count as u32);
        out.u32(self.field_names.len() as u32);
        out.u32(self.state_count() as u32);
        out.u32(self.lex_states.len() as u32);
        out.u32(self.field_maps.len() as u32);
        out.u32(self.external_tokens.len() as u32);
        out.u32(body.bytes.len() as u32);
        debug_assert_eq!(out.bytes.len(), HEADER_SIZE);
        out.bytes.extend_from_slice(&body.bytes);
        out.bytes
    }
}

#[derive(Default)]
struct TableWriter {
    bytes: Vec<u8>,
}

impl TableWriter {
    fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn string(&mut self, value: &str) {
        self.u16(value.len() as u16);
        self.bytes.extend_from_slice(value.as_bytes());
    }

    fn action(&mut self, action: Option<ParseAction>) {
        match action {
            None => self.u8(ACTION_NONE),
            Some(ParseAction::Shift { state }) => {
                self.u8(ACTION_SHIFT);
                self.u16(state);
            }
            Some(ParseAction::Reduce(reduce)) => {
                self.u8(ACTION_REDUCE);
                self.u16(reduce.symbol);
                self.u16(reduce.count as u16);
                self.u16(reduce.production_id);
                self.u16(reduce.dynamic_precedence as i16 as u16);
            }
            Some(ParseAction::Accept) => self.u8(ACTION_ACCEPT),
        }
    }
}
