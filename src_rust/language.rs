//! Grammar tables and the `Language` handle.
//!
//! A `GrammarTable` is the decoded form of a compiled grammar: symbol names
//! and metadata, field maps, the lexer automaton, one lex mode per parse
//! state, the dense parse table and the external-token descriptors.
//! `Language` wraps a validated table (and optionally an external scanner)
//! behind an `Arc` so that any number of parsers can share it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::error_costs::ERROR_STATE;
use super::lexer::ExternalScanner;
use super::reduce_action::ReduceAction;

pub type Symbol = u16;
pub type StateId = u16;
pub type FieldId = u16;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const BUILTIN_SYM_END: Symbol = 0;
pub const BUILTIN_SYM_ERROR: Symbol = u16::MAX;
pub const START_STATE: StateId = 1;

pub const TABLE_MAGIC: [u8; 4] = *b"MORF";
pub const MIN_COMPATIBLE_LANGUAGE_VERSION: u32 = 1;
pub const LANGUAGE_VERSION: u32 = 2;
pub const LANGUAGE_VERSION_WITH_NAME: u32 = 2;
pub const HEADER_SIZE: usize = 40;

const FLAG_VISIBLE: u8 = 1;
const FLAG_NAMED: u8 = 1 << 1;
const FLAG_EXTRA: u8 = 1 << 2;
const FLAG_SUPERTYPE: u8 = 1 << 3;

pub(crate) const ACTION_NONE: u8 = 0;
pub(crate) const ACTION_SHIFT: u8 = 1;
pub(crate) const ACTION_REDUCE: u8 = 2;
pub(crate) const ACTION_ACCEPT: u8 = 3;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a compiled grammar table could not be loaded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("incompatible grammar table version {version}, expected {min} through {max}")]
    IncompatibleVersion { version: u32, min: u32, max: u32 },
    #[error("corrupt grammar table: {0}")]
    CorruptTable(String),
    #[error("grammar table references symbol {symbol}, but only {symbol_count} symbols exist")]
    UnknownSymbol { symbol: Symbol, symbol_count: usize },
}

fn corrupt(reason: impl Into<String>) -> LoadError {
    LoadError::CorruptTable(reason.into())
}

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymbolMetadata {
    pub visible: bool,
    pub named: bool,
    /// The symbol may appear anywhere in the input (whitespace, comments).
    pub extra: bool,
    pub supertype: bool,
}

impl SymbolMetadata {
    pub const fn new(visible: bool, named: bool) -> Self {
        Self {
            visible,
            named,
            extra: false,
            supertype: false,
        }
    }

    pub(crate) fn to_flags(self) -> u8 {
        let mut flags = 0;
        if self.visible {
            flags |= FLAG_VISIBLE;
        }
        if self.named {
            flags |= FLAG_NAMED;
        }
        if self.extra {
            flags |= FLAG_EXTRA;
        }
        if self.supertype {
            flags |= FLAG_SUPERTYPE;
        }
        flags
    }

    pub(crate) fn from_flags(flags: u8) -> Self {
        Self {
            visible: flags & FLAG_VISIBLE != 0,
            named: flags & FLAG_NAMED != 0,
            extra: flags & FLAG_EXTRA != 0,
            supertype: flags & FLAG_SUPERTYPE != 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    pub metadata: SymbolMetadata,
}

/// Associates a field with the structural (non-extra) child at `child_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldMapEntry {
    pub field_id: FieldId,
    pub child_index: u8,
    pub inherited: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexAccept {
    pub symbol: Symbol,
    /// Lower wins when one lexer state accepts several symbols.
    pub priority: u16,
}

/// Transition on any byte in `min..=max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexTransition {
    pub min: u8,
    pub max: u8,
    pub next_state: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LexState {
    pub accept: Vec<LexAccept>,
    pub transitions: Vec<LexTransition>,
}

impl LexState {
    pub fn next_state(&self, byte: u8) -> Option<u16> {
        self.transitions
            .iter()
            .find(|transition| transition.min <= byte && byte <= transition.max)
            .map(|transition| transition.next_state)
    }

    /// The symbol this state accepts: lowest priority, then earliest entry.
    pub fn accepted_symbol(&self) -> Option<Symbol> {
        let mut best: Option<&LexAccept> = None;
        for accept in &self.accept {
            if best.map_or(true, |b| accept.priority < b.priority) {
                best = Some(accept);
            }
        }
        best.map(|accept| accept.symbol)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LexMode {
    pub lex_state: u16,
    /// Index into the external scanner states; zero disables the scanner.
    pub external_lex_state: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseAction {
    Shift { state: StateId },
    Reduce(ReduceAction),
    Accept,
}

/// The decoded contents of a compiled grammar.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrammarTable {
    pub version: u32,
    pub name: Option<String>,
    pub symbols: Vec<SymbolInfo>,
    /// Symbols below this id are terminals.
    pub token_count: usize,
    /// `field_names[i]` is the name of field id `i + 1`.
    pub field_names: Vec<String>,
    pub field_maps: Vec<Vec<FieldMapEntry>>,
    pub lex_states: Vec<LexState>,
    pub lex_modes: Vec<LexMode>,
    /// Dense `state_count × symbol_count` table, indexed by
    /// `state * symbol_count + symbol`. Nonterminal cells hold goto states.
    pub parse_table: Vec<Option<ParseAction>>,
    /// Symbol produced by each external token.
    pub external_tokens: Vec<Symbol>,
    /// Valid-token sets indexed by `LexMode::external_lex_state`.
    pub external_scanner_states: Vec<Vec<bool>>,
}

impl GrammarTable {
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn state_count(&self) -> usize {
        self.lex_modes.len()
    }

    pub fn action(&self, state: StateId, symbol: Symbol) -> Option<ParseAction> {
        let symbol_count = self.symbol_count();
        if symbol as usize >= symbol_count {
            return None;
        }
        self.parse_table
            .get(state as usize * symbol_count + symbol as usize)
            .copied()
            .flatten()
    }

    /// Decode and validate a compiled table.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let mut reader = TableReader::new(bytes);
        if bytes.len() < 8 {
            return Err(corrupt(format!(
                "{} bytes is too short for a table header",
                bytes.len()
            )));
        }
        let magic = reader.take(4, "magic")?;
        if magic != TABLE_MAGIC {
            return Err(corrupt("missing MORF signature"));
        }
        let version = reader.u32("version")?;
        if !(MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version) {
            return Err(LoadError::IncompatibleVersion {
                version,
                min: MIN_COMPATIBLE_LANGUAGE_VERSION,
                max: LANGUAGE_VERSION,
            });
        }
        if bytes.len() < HEADER_SIZE {
            return Err(corrupt(format!(
                "header needs {HEADER_SIZE} bytes, found {}",
                bytes.len()
            )));
        }
        let symbol_count = reader.u32("symbol count")? as usize;
        let token_count = reader.u32("token count")? as usize;
        let field_count = reader.u32("field count")? as usize;
        let state_count = reader.u32("state count")? as usize;
        let lex_state_count = reader.u32("lex state count")? as usize;
        let production_count = reader.u32("production count")? as usize;
        let external_token_count = reader.u32("external token count")? as usize;
        let body_length = reader.u32("body length")? as usize;
        if body_length != bytes.len() - HEADER_SIZE {
            return Err(corrupt(format!(
                "header declares a {body_length} byte body, found {}",
                bytes.len() - HEADER_SIZE
            )));
        }
        if symbol_count >= BUILTIN_SYM_ERROR as usize {
            return Err(corrupt(format!("{symbol_count} symbols do not fit in a symbol id")));
        }
        if token_count == 0 || token_count > symbol_count {
            return Err(corrupt(format!(
                "token count {token_count} is out of range for {symbol_count} symbols"
            )));
        }
        let cell_count = state_count
            .checked_mul(symbol_count)
            .filter(|count| *count <= body_length)
            .ok_or_else(|| corrupt("parse table is larger than the table body"))?;

        let mut table = GrammarTable {
            version,
            token_count,
            ..GrammarTable::default()
        };

        for _ in 0..symbol_count {
            let name = reader.string("symbol name")?;
            let metadata = SymbolMetadata::from_flags(reader.u8("symbol metadata")?);
            table.symbols.push(SymbolInfo { name, metadata });
        }
        for _ in 0..field_count {
            table.field_names.push(reader.string("field name")?);
        }
        for _ in 0..production_count {
            let entry_count = reader.u16("field map length")?;
            let mut entries = Vec::with_capacity(entry_count.into());
            for _ in 0..entry_count {
                entries.push(FieldMapEntry {
                    field_id: reader.u16("field id")?,
                    child_index: reader.u8("field child index")?,
                    inherited: reader.u8("field inheritance")? != 0,
                });
            }
            table.field_maps.push(entries);
        }
        for _ in 0..lex_state_count {
            let mut state = LexState::default();
            for _ in 0..reader.u16("accept count")? {
                state.accept.push(LexAccept {
                    symbol: reader.u16("accepted symbol")?,
                    priority: reader.u16("accept priority")?,
                });
            }
            for _ in 0..reader.u16("transition count")? {
                state.transitions.push(LexTransition {
                    min: reader.u8("transition range")?,
                    max: reader.u8("transition range")?,
                    next_state: reader.u16("transition target")?,
                });
            }
            table.lex_states.push(state);
        }
        for _ in 0..state_count {
            table.lex_modes.push(LexMode {
                lex_state: reader.u16("lex mode")?,
                external_lex_state: reader.u16("lex mode")?,
            });
        }
        table.parse_table.reserve(cell_count);
        for _ in 0..cell_count {
            table.parse_table.push(reader.action()?);
        }
        for _ in 0..external_token_count {
            table.external_tokens.push(reader.u16("external token")?);
        }
        let external_state_count = reader.u16("external state count")?;
        for _ in 0..external_state_count {
            let mut valid = Vec::with_capacity(external_token_count);
            for _ in 0..external_token_count {
                valid.push(reader.u8("external token set")? != 0);
            }
            table.external_scanner_states.push(valid);
        }
        if version >= LANGUAGE_VERSION_WITH_NAME {
            table.name = Some(reader.string("language name")?);
        }
        if !reader.is_done() {
            return Err(corrupt(format!(
                "{} unexpected bytes after the last section",
                reader.remaining()
            )));
        }

        table.validate()?;
        Ok(table)
    }

    /// Check every cross-reference inside the table.
    pub fn validate(&self) -> Result<(), LoadError> {
        let symbol_count = self.symbol_count();
        let check_symbol = |symbol: Symbol| {
            if symbol as usize >= symbol_count {
                Err(LoadError::UnknownSymbol {
                    symbol,
                    symbol_count,
                })
            } else {
                Ok(())
            }
        };

        if self.state_count() <= START_STATE as usize {
            return Err(corrupt("a table needs an error state and a start state"));
        }
        if self.parse_table.len() != self.state_count() * symbol_count {
            return Err(corrupt("parse table dimensions do not match the header"));
        }

        for (index, state) in self.lex_states.iter().enumerate() {
            for accept in &state.accept {
                check_symbol(accept.symbol)?;
                if accept.symbol as usize >= self.token_count {
                    return Err(corrupt(format!(
                        "lex state {index} accepts nonterminal {}",
                        accept.symbol
                    )));
                }
            }
            for transition in &state.transitions {
                if transition.next_state as usize >= self.lex_states.len() {
                    return Err(corrupt(format!(
                        "lex state {index} jumps to missing state {}",
                        transition.next_state
                    )));
                }
            }
        }

        for (state, mode) in self.lex_modes.iter().enumerate() {
            if mode.lex_state as usize >= self.lex_states.len() {
                return Err(corrupt(format!(
                    "parse state {state} uses missing lex state {}",
                    mode.lex_state
                )));
            }
            if mode.external_lex_state != 0
                && mode.external_lex_state as usize >= self.external_scanner_states.len()
            {
                return Err(corrupt(format!(
                    "parse state {state} uses missing external lex state {}",
                    mode.external_lex_state
                )));
            }
        }

        for entries in &self.field_maps {
            for entry in entries {
                if entry.field_id == 0 || entry.field_id as usize > self.field_names.len() {
                    return Err(corrupt(format!("field id {} is out of range", entry.field_id)));
                }
            }
        }

        for action in self.parse_table.iter().flatten() {
            match action {
                ParseAction::Shift { state } => {
                    if *state as usize >= self.state_count() {
                        return Err(corrupt(format!("shift to missing state {state}")));
                    }
                }
                ParseAction::Reduce(reduce) => {
                    check_symbol(reduce.symbol)?;
                    if (reduce.symbol as usize) < self.token_count {
                        return Err(corrupt(format!("reduction to terminal {}", reduce.symbol)));
                    }
                    if reduce.production_id != 0
                        && reduce.production_id as usize >= self.field_maps.len()
                    {
                        return Err(corrupt(format!(
                            "missing production {}",
                            reduce.production_id
                        )));
                    }
                }
                ParseAction::Accept => {}
            }
        }

        for symbol in &self.external_tokens {
            check_symbol(*symbol)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Binary decoding
// ---------------------------------------------------------------------------

struct TableReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> TableReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn is_done(&self) -> bool {
        self.offset == self.bytes.len()
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], LoadError> {
        if self.remaining() < len {
            return Err(corrupt(format!("truncated {what} at byte {}", self.offset)));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8, LoadError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16, LoadError> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32, LoadError> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self, what: &str) -> Result<String, LoadError> {
        let len = self.u16(what)? as usize;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| corrupt(format!("{what} is not UTF-8")))
    }

    fn action(&mut self) -> Result<Option<ParseAction>, LoadError> {
        match self.u8("parse action")? {
            ACTION_NONE => Ok(None),
            ACTION_SHIFT => Ok(Some(ParseAction::Shift {
                state: self.u16("shift state")?,
            })),
            ACTION_REDUCE => {
                let symbol = self.u16("reduce symbol")?;
                let count = self.u16("reduce child count")?;
                let production_id = self.u16("reduce production")?;
                let dynamic_precedence = self.u16("reduce precedence")? as i16;
                Ok(Some(ParseAction::Reduce(ReduceAction {
                    symbol,
                    count: count.into(),
                    production_id,
                    dynamic_precedence: dynamic_precedence.into(),
                })))
            }
            ACTION_ACCEPT => Ok(Some(ParseAction::Accept)),
            tag => Err(corrupt(format!(
                "unknown parse action tag {tag} at byte {}",
                self.offset - 1
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Language handle
// ---------------------------------------------------------------------------

struct LanguageData {
    table: GrammarTable,
    scanner: Option<Arc<dyn ExternalScanner>>,
}

/// A loaded grammar. Cloning is cheap; every `load` call creates a new,
/// independent handle.
#[derive(Clone)]
pub struct Language(Arc<LanguageData>);

impl Language {
    /// Validate and load a compiled grammar table.
    pub fn load(bytes: &[u8]) -> Result<Self, LoadError> {
        let table = GrammarTable::from_bytes(bytes)?;
        Ok(Self(Arc::new(LanguageData {
            table,
            scanner: None,
        })))
    }

    /// Load a table whose external tokens are produced by `scanner`.
    pub fn load_with_scanner(
        bytes: &[u8],
        scanner: Arc<dyn ExternalScanner>,
    ) -> Result<Self, LoadError> {
        let table = GrammarTable::from_bytes(bytes)?;
        Ok(Self(Arc::new(LanguageData {
            table,
            scanner: Some(scanner),
        })))
    }

    /// Whether two handles come from the same `load` call.
    pub fn ptr_eq(a: &Language, b: &Language) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn table(&self) -> &GrammarTable {
        &self.0.table
    }

    pub fn version(&self) -> u32 {
        self.0.table.version
    }

    pub fn name(&self) -> Option<&str> {
        self.0.table.name.as_deref()
    }

    pub fn symbol_count(&self) -> usize {
        self.0.table.symbol_count()
    }

    pub fn token_count(&self) -> usize {
        self.0.table.token_count
    }

    pub fn state_count(&self) -> usize {
        self.0.table.state_count()
    }

    pub fn field_count(&self) -> usize {
        self.0.table.field_names.len()
    }

    pub fn symbol_name(&self, symbol: Symbol) -> Option<&str> {
        if symbol == BUILTIN_SYM_ERROR {
            return Some("ERROR");
        }
        self.0
            .table
            .symbols
            .get(symbol as usize)
            .map(|info| info.name.as_str())
    }

    pub fn symbol_for_name(&self, name: &str, is_named: bool) -> Option<Symbol> {
        if is_named && name == "ERROR" {
            return Some(BUILTIN_SYM_ERROR);
        }
        self.0
            .table
            .symbols
            .iter()
            .position(|info| {
                info.name == name && info.metadata.visible && info.metadata.named == is_named
            })
            .map(|index| index as Symbol)
    }

    pub fn symbol_metadata(&self, symbol: Symbol) -> SymbolMetadata {
        if symbol == BUILTIN_SYM_ERROR {
            return SymbolMetadata::new(true, true);
        }
        self.0
            .table
            .symbols
            .get(symbol as usize)
            .map(|info| info.metadata)
            .unwrap_or_default()
    }

    pub fn node_kind_is_named(&self, symbol: Symbol) -> bool {
        self.symbol_metadata(symbol).named
    }

    pub fn node_kind_is_visible(&self, symbol: Symbol) -> bool {
        self.symbol_metadata(symbol).visible
    }

    pub fn field_name_for_id(&self, field_id: FieldId) -> Option<&str> {
        let index = (field_id as usize).checked_sub(1)?;
        self.0.table.field_names.get(index).map(String::as_str)
    }

    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.0
            .table
            .field_names
            .iter()
            .position(|field| field == name)
            .map(|index| (index + 1) as FieldId)
    }

    pub fn field_map(&self, production_id: u16) -> &[FieldMapEntry] {
        self.0
            .table
            .field_maps
            .get(production_id as usize)
            .map_or(&[], Vec::as_slice)
    }

    pub fn action(&self, state: StateId, symbol: Symbol) -> Option<ParseAction> {
        self.0.table.action(state, symbol)
    }

    /// The goto (or shift) target for `symbol`, or `ERROR_STATE`.
    pub fn next_state(&self, state: StateId, symbol: Symbol) -> StateId {
        match self.action(state, symbol) {
            Some(ParseAction::Shift { state }) => state,
            _ => ERROR_STATE,
        }
    }

    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.0
            .table
            .lex_modes
            .get(state as usize)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn lex_state(&self, id: u16) -> Option<&LexState> {
        self.0.table.lex_states.get(id as usize)
    }

    pub(crate) fn external_scanner(&self) -> Option<&dyn ExternalScanner> {
        self.0.scanner.as_deref()
    }

    pub(crate) fn enabled_external_tokens(&self, external_lex_state: u16) -> &[bool] {
        if external_lex_state == 0 {
            return &[];
        }
        self.0
            .table
            .external_scanner_states
            .get(external_lex_state as usize)
            .map_or(&[], Vec::as_slice)
    }

    pub(crate) fn external_symbol(&self, index: usize) -> Option<Symbol> {
        self.0.table.external_tokens.get(index).copied()
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("symbol_count", &self.symbol_count())
            .field("state_count", &self.state_count())
            .finish()
    }
}
