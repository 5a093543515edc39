//! The LR parsing engine: shift/reduce over a single stack, reuse of
//! subtrees from a previous tree, and cost-ranked error recovery.
//!
//! Parsing never fails. Input the grammar cannot explain ends up inside
//! `ERROR` nodes or is patched with zero-width MISSING tokens, and the root
//! always spans the whole input.

use std::fmt;
use std::sync::Arc;

use super::error_costs::{missing_cost, skipped_cost, ERROR_STATE};
use super::language::{
    Language, LexMode, ParseAction, StateId, Symbol, BUILTIN_SYM_END, BUILTIN_SYM_ERROR,
    START_STATE,
};
use super::length::{length_add, length_zero, Length};
use super::lexer::{Lexer, Token};
use super::reduce_action::ReduceAction;
use super::reusable_node::{ReusableNode, Reuse};
use super::stack::{PopSummary, Stack};
use super::subtree::{with_parse_state, Subtree, SubtreeData};
use super::tree::Tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogType {
    Parse,
    Lex,
}

pub type Logger = Box<dyn FnMut(LogType, &str) + Send>;

/// Bounds on the work error recovery may do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserOptions {
    /// Most tokens one recovery may skip.
    pub max_skipped_tokens: usize,
    /// Most stack entries one recovery may discard.
    pub max_popped_entries: usize,
    /// Recoveries allowed at one byte offset before tokens are skipped
    /// unconditionally.
    pub max_recovery_attempts: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_skipped_tokens: 8,
            max_popped_entries: 8,
            max_recovery_attempts: 16,
        }
    }
}

pub struct Parser {
    language: Option<Language>,
    logger: Option<Logger>,
    options: ParserOptions,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Parser")
            .field("language", &self.language)
            .field("has_logger", &self.logger.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: None,
            logger: None,
            options: ParserOptions::default(),
        }
    }

    pub fn set_language(&mut self, language: &Language) {
        self.language = Some(language.clone());
    }

    #[must_use]
    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    pub fn set_logger(&mut self, logger: Option<Logger>) {
        self.logger = logger;
    }

    #[must_use]
    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    pub fn set_options(&mut self, options: ParserOptions) {
        self.options = options;
    }

    #[must_use]
    pub fn options(&self) -> ParserOptions {
        self.options
    }

    /// Parse `text`, reusing unchanged parts of `old_tree`.
    ///
    /// `old_tree` must have been edited to describe `text`; a tree for a
    /// different language or of a different length is ignored. Returns
    /// `None` only when no language has been set.
    pub fn parse(&mut self, text: impl AsRef<[u8]>, old_tree: Option<&Tree>) -> Option<Tree> {
        let language = self.language.as_ref()?;
        let input = text.as_ref();

        let old_tree = old_tree.filter(|tree| {
            let compatible = Language::ptr_eq(tree.language(), language)
                && tree.root_subtree().size.bytes as usize == input.len();
            if !compatible {
                tracing::warn!("ignoring a previous tree that does not describe this input");
            }
            compatible
        });
        let reusable = old_tree.map_or_else(ReusableNode::empty, |tree| {
            ReusableNode::new(Arc::clone(tree.root_subtree()))
        });
        let revision = old_tree.map_or(0, |tree| tree.revision() + 1);

        let session = ParseSession {
            language,
            lexer: Lexer::new(language, input),
            input,
            stack: Stack::new(START_STATE),
            reusable,
            lookahead: None,
            max_seen: 0,
            epoch: 0,
            recovery_position: None,
            recovery_attempts: 0,
            reductions_since_shift: 0,
            token_cache: None,
            options: self.options,
            logger: self.logger.as_mut(),
        };
        let root = session.run();
        Some(Tree::new(root, language.clone(), revision))
    }
}

// ---------------------------------------------------------------------------
// Parse session
// ---------------------------------------------------------------------------

enum Recovery {
    Skip(Vec<Subtree>),
    Missing(Symbol),
    Pop(PopSummary),
}

struct ParseSession<'a> {
    language: &'a Language,
    lexer: Lexer<'a>,
    input: &'a [u8],
    stack: Stack,
    reusable: ReusableNode,
    lookahead: Option<Subtree>,
    /// One past the furthest byte examined so far.
    max_seen: u32,
    /// Bumped by every error recovery.
    epoch: u32,
    recovery_position: Option<u32>,
    recovery_attempts: usize,
    reductions_since_shift: usize,
    token_cache: Option<(usize, LexMode, Token)>,
    options: ParserOptions,
    logger: Option<&'a mut Logger>,
}

impl<'a> ParseSession<'a> {
    fn run(mut self) -> Subtree {
        let length = self.input.len();
        self.log(LogType::Parse, || format!("new_parse length:{length}"));
        loop {
            let state = self.stack.top_state();
            let lookahead = match self.lookahead.take() {
                Some(lookahead) => lookahead,
                None => match self.next_lookahead(state) {
                    Some(lookahead) => lookahead,
                    None => continue,
                },
            };

            let symbol = lookahead.symbol;
            match self.action(state, symbol) {
                Some(ParseAction::Shift { state: next_state }) => {
                    self.shift(state, next_state, lookahead, false);
                }
                Some(ParseAction::Reduce(action)) => {
                    self.reduce(action);
                    self.lookahead = Some(lookahead);
                }
                Some(ParseAction::Accept) => return self.accept(),
                None if symbol != BUILTIN_SYM_ERROR
                    && self.language.symbol_metadata(symbol).extra =>
                {
                    self.shift(state, state, lookahead, true);
                }
                None => {
                    if let Some(root) = self.recover(state, lookahead) {
                        return root;
                    }
                }
            }
        }
    }

    /// The table action, minus actions that could never make progress.
    fn action(&self, state: StateId, symbol: Symbol) -> Option<ParseAction> {
        let action = self.language.action(state, symbol)?;
        match action {
            ParseAction::Shift { .. } if symbol == BUILTIN_SYM_END => None,
            ParseAction::Accept if symbol != BUILTIN_SYM_END => None,
            ParseAction::Reduce(_)
                if self.reductions_since_shift
                    > self.stack.len() + self.language.state_count() =>
            {
                None
            }
            _ => Some(action),
        }
    }

    fn log(&mut self, log_type: LogType, message: impl FnOnce() -> String) {
        if self.logger.is_none() && !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }
        let message = message();
        tracing::trace!("{log_type:?} {message}");
        if let Some(logger) = self.logger.as_deref_mut() {
            logger(log_type, &message);
        }
    }

    fn symbol_name(&self, symbol: Symbol) -> &'a str {
        self.language.symbol_name(symbol).unwrap_or("?")
    }

    fn note_window(&mut self, start: u32, tree: &SubtreeData) {
        let window_end = start + tree.size.bytes + tree.lookahead_bytes;
        self.max_seen = self.max_seen.max(window_end);
    }

    // -----------------------------------------------------------------------
    // Lookahead
    // -----------------------------------------------------------------------

    /// Reuse or lex the next token. Returns `None` after pushing a whole
    /// reused subtree instead.
    fn next_lookahead(&mut self, state: StateId) -> Option<Subtree> {
        let position = self.stack.top_position();
        let lex_mode = self.language.lex_mode(state);
        match self.reusable.find(position.bytes, state, lex_mode) {
            Some(Reuse::Node(node)) => {
                let name = self.symbol_name(node.symbol);
                self.log(LogType::Parse, || format!("reuse_node symbol:{name}"));
                self.note_window(position.bytes, &node);
                let next_state = self.language.next_state(state, node.symbol);
                self.stack.push(node, next_state, self.epoch);
                self.reductions_since_shift = 0;
                None
            }
            Some(Reuse::Leaf(leaf)) => {
                let name = self.symbol_name(leaf.symbol);
                self.log(LogType::Parse, || format!("reuse_lookahead symbol:{name}"));
                self.note_window(position.bytes, &leaf);
                Some(leaf)
            }
            None => {
                let leaf = self.lex(state, lex_mode, position);
                self.note_window(position.bytes, &leaf);
                Some(leaf)
            }
        }
    }

    fn lex_token(&mut self, lex_mode: LexMode, offset: usize) -> Token {
        if let Some((cached_offset, cached_mode, token)) = self.token_cache {
            if cached_offset == offset && cached_mode == lex_mode {
                return token;
            }
        }
        let token = self.lexer.next_token(lex_mode, offset);
        self.token_cache = Some((offset, lex_mode, token));
        token
    }

    fn lex(&mut self, state: StateId, lex_mode: LexMode, position: Length) -> Subtree {
        let token = self.lex_token(lex_mode, position.bytes as usize);
        let name = self.symbol_name(token.symbol);
        self.log(LogType::Lex, || {
            format!(
                "lexed_lookahead sym:{name}, size:{}, lex_state:{}",
                token.end_byte - token.start_byte,
                lex_mode.lex_state
            )
        });
        self.leaf_for_token(token, state, lex_mode)
    }

    fn leaf_for_token(&self, token: Token, state: StateId, lex_mode: LexMode) -> Subtree {
        let text = self.input.get(token.byte_range()).unwrap_or_default();
        SubtreeData::new_leaf(
            self.language,
            token.symbol,
            Length::of_text(text),
            token.lookahead_bytes(),
            state,
            lex_mode,
        )
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    fn shift(&mut self, state: StateId, next_state: StateId, lookahead: Subtree, extra: bool) {
        let name = self.symbol_name(lookahead.symbol);
        self.log(LogType::Parse, || {
            if extra {
                format!("shift_extra symbol:{name}")
            } else {
                format!("shift state:{next_state}")
            }
        });
        let subtree = with_parse_state(&lookahead, state, extra);
        self.stack.push(subtree, next_state, self.epoch);
        self.reductions_since_shift = 0;
    }

    fn reduce(&mut self, action: ReduceAction) {
        let trailing_extras = self.stack.pop_trailing_extras();
        let slice = self.stack.pop_count(action.count);
        let parent_state = self.stack.top_state();
        let next_state = self.language.next_state(parent_state, action.symbol);

        let child_count = slice.subtrees.len();
        let mut node = SubtreeData::new_node(
            self.language,
            action.symbol,
            slice.subtrees,
            action.production_id,
            parent_state,
        );
        node.dynamic_precedence += action.dynamic_precedence;
        node.fragile = slice.first_epoch.is_some_and(|epoch| epoch != self.epoch);
        let end = self.stack.top_position().bytes + node.size.bytes;
        node.lookahead_bytes = node.lookahead_bytes.max(self.max_seen.saturating_sub(end));

        let name = self.symbol_name(action.symbol);
        self.log(LogType::Parse, || {
            format!("reduce sym:{name}, child_count:{child_count}")
        });
        let epoch = slice.first_epoch.unwrap_or(self.epoch);
        self.stack.push(Arc::new(node), next_state, epoch);
        for extra in trailing_extras {
            self.stack.push(extra, next_state, self.epoch);
        }
        self.reductions_since_shift += 1;
    }

    fn accept(mut self) -> Subtree {
        self.log(LogType::Parse, || "accept".to_string());
        let trailing_extras = self.stack.pop_trailing_extras();
        let mut entries = self.stack.pop_all();
        let Some(root_index) = entries.iter().rposition(|tree| !tree.extra) else {
            entries.extend(trailing_extras);
            return self.error_root(entries);
        };
        let root = entries.remove(root_index);
        if entries.is_empty() && trailing_extras.is_empty() {
            return root;
        }

        let mut children = entries;
        children.extend(root.children.iter().cloned());
        children.extend(trailing_extras);
        let mut node = SubtreeData::new_node(
            self.language,
            root.symbol,
            children,
            root.production_id,
            root.parse_state,
        );
        node.fragile = root.fragile;
        node.lookahead_bytes = node
            .lookahead_bytes
            .max(self.max_seen.saturating_sub(node.size.bytes));
        Arc::new(node)
    }

    fn error_root(&self, children: Vec<Subtree>) -> Subtree {
        let mut root = SubtreeData::new_node(
            self.language,
            BUILTIN_SYM_ERROR,
            children,
            0,
            self.stack.base_state(),
        );
        root.lookahead_bytes = root
            .lookahead_bytes
            .max(self.max_seen.saturating_sub(root.size.bytes));
        Arc::new(root)
    }

    // -----------------------------------------------------------------------
    // Error recovery
    // -----------------------------------------------------------------------

    /// Handle a lookahead with no action. Returns the finished root when
    /// recovery had to give up on the grammar altogether.
    fn recover(&mut self, state: StateId, lookahead: Subtree) -> Option<Subtree> {
        let position = self.stack.top_position().bytes;
        let is_eof = lookahead.symbol == BUILTIN_SYM_END;
        self.epoch += 1;
        if self.recovery_position == Some(position) {
            self.recovery_attempts += 1;
        } else {
            self.recovery_position = Some(position);
            self.recovery_attempts = 1;
        }
        let name = self.symbol_name(lookahead.symbol);
        self.log(LogType::Parse, || {
            format!("detect_error state:{state}, lookahead:{name}")
        });

        if self.recovery_attempts > self.options.max_recovery_attempts {
            let attempts = self.recovery_attempts;
            let limit = self.options.max_recovery_attempts;
            tracing::debug!("giving up on recovery at byte {position} after {limit} attempts");
            if is_eof {
                return self.wrap_stack(attempts > limit + 1);
            }
            self.skip_tokens(state, vec![lookahead]);
            return None;
        }

        let mut best: Option<(u32, Recovery)> = None;
        let mut consider = |cost: u32, recovery: Recovery| {
            if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
                best = Some((cost, recovery));
            }
        };
        if !is_eof {
            if let Some((cost, tokens)) = self.evaluate_skip(state, &lookahead) {
                consider(cost, Recovery::Skip(tokens));
            }
        }
        if let Some(symbol) = self.find_missing_token(lookahead.symbol) {
            consider(missing_cost(), Recovery::Missing(symbol));
        }
        if let Some(summary) = self.evaluate_pop(&lookahead) {
            let cost = skipped_cost(summary.popped_trees, summary.popped_size);
            consider(cost, Recovery::Pop(summary));
        }

        if let Some((cost, _)) = &best {
            tracing::debug!("recovering at byte {position} with cost {cost}");
        }
        match best {
            Some((cost, Recovery::Skip(tokens))) => {
                self.log(LogType::Parse, || {
                    format!("recover_by_skipping count:{}, cost:{cost}", tokens.len())
                });
                self.skip_tokens(state, tokens);
            }
            Some((cost, Recovery::Missing(symbol))) => {
                let name = self.symbol_name(symbol);
                self.log(LogType::Parse, || {
                    format!("recover_with_missing symbol:{name}, cost:{cost}")
                });
                self.insert_missing(symbol);
            }
            Some((cost, Recovery::Pop(summary))) => {
                self.log(LogType::Parse, || {
                    format!(
                        "recover_to_previous state:{}, depth:{}, cost:{cost}",
                        summary.state, summary.popped_trees
                    )
                });
                self.pop_into_error(summary);
            }
            None if is_eof => return self.wrap_stack(false),
            None => self.skip_tokens(state, vec![lookahead]),
        }
        None
    }

    /// Skip tokens, starting with `first`, until a token with an action in
    /// `state` comes up.
    fn evaluate_skip(&mut self, state: StateId, first: &Subtree) -> Option<(u32, Vec<Subtree>)> {
        let lex_mode = self.language.lex_mode(state);
        let mut position = length_add(self.stack.top_position(), first.size);
        let mut skipped = vec![Arc::clone(first)];
        let mut skipped_trees = 1;
        let mut pending_extras = Vec::new();

        loop {
            let token = self.lex_token(lex_mode, position.bytes as usize);
            let leaf = self.leaf_for_token(token, state, lex_mode);
            self.note_window(position.bytes, &leaf);

            if leaf.symbol == BUILTIN_SYM_END {
                if self.action(state, BUILTIN_SYM_END).is_none() {
                    return None;
                }
                break;
            }
            if self.action(state, leaf.symbol).is_some() {
                break;
            }
            position = length_add(position, leaf.size);
            if leaf.symbol != BUILTIN_SYM_ERROR && leaf.extra {
                pending_extras.push(leaf);
                continue;
            }
            skipped_trees += 1;
            if skipped_trees > self.options.max_skipped_tokens {
                return None;
            }
            skipped.append(&mut pending_extras);
            skipped.push(leaf);
        }

        let size = skipped
            .iter()
            .fold(length_zero(), |size, tree| length_add(size, tree.size));
        Some((skipped_cost(skipped_trees as u32, size), skipped))
    }

    fn skip_tokens(&mut self, state: StateId, tokens: Vec<Subtree>) {
        // Consecutive skips grow the ERROR node already on top.
        let (error, epoch) = match self.stack.pop_trailing_error() {
            Some((error, extras, epoch)) => {
                let mut error =
                    Arc::try_unwrap(error).unwrap_or_else(|shared| SubtreeData::clone(&shared));
                error.append_children(extras.into_iter().chain(tokens));
                (Arc::new(error), epoch)
            }
            None => (
                SubtreeData::new_error_node(self.language, tokens, state),
                self.epoch,
            ),
        };
        self.stack.push(error, state, epoch);
        self.reductions_since_shift = 0;
    }

    /// The first terminal that, once shifted, lets `lookahead` continue.
    fn find_missing_token(&self, lookahead: Symbol) -> Option<Symbol> {
        let states = self.stack.recent_structural_states();
        let mut pushed = Vec::new();
        (1..self.language.token_count() as Symbol).find(|&symbol| {
            !self.language.symbol_metadata(symbol).extra
                && self
                    .simulate_shift(&states, &mut pushed, symbol)
                    .is_some_and(|top| self.language.action(top, lookahead).is_some())
        })
    }

    /// Apply the reductions `symbol` triggers to a state-only view of the
    /// stack, then shift it. Returns the state after the shift.
    ///
    /// The view is `states[..kept]` followed by `pushed`, so `states` itself
    /// is never copied.
    fn simulate_shift(
        &self,
        states: &[StateId],
        pushed: &mut Vec<StateId>,
        symbol: Symbol,
    ) -> Option<StateId> {
        pushed.clear();
        let mut kept = states.len();
        let limit = states.len() + self.language.state_count();
        for _ in 0..limit {
            let top = *pushed.last().or_else(|| states[..kept].last())?;
            match self.language.action(top, symbol) {
                Some(ParseAction::Shift { state }) => return Some(state),
                Some(ParseAction::Reduce(action)) => {
                    let count = action.count as usize;
                    if count >= kept + pushed.len() {
                        return None;
                    }
                    let from_pushed = count.min(pushed.len());
                    pushed.truncate(pushed.len() - from_pushed);
                    kept -= count - from_pushed;
                    let below = *pushed.last().or_else(|| states[..kept].last())?;
                    let next_state = self.language.next_state(below, action.symbol);
                    if next_state == ERROR_STATE {
                        return None;
                    }
                    pushed.push(next_state);
                }
                Some(ParseAction::Accept) | None => return None,
            }
        }
        None
    }

    fn insert_missing(&mut self, symbol: Symbol) {
        let limit = self.stack.len() + self.language.state_count();
        for _ in 0..limit {
            let top = self.stack.top_state();
            match self.language.action(top, symbol) {
                Some(ParseAction::Reduce(action)) => self.reduce(action),
                Some(ParseAction::Shift { state }) => {
                    let leaf = SubtreeData::new_missing_leaf(
                        self.language,
                        symbol,
                        top,
                        self.language.lex_mode(top),
                    );
                    self.stack.push(leaf, state, self.epoch);
                    self.reductions_since_shift = 0;
                    return;
                }
                _ => return,
            }
        }
    }

    /// The shallowest cut below which `lookahead` has an action.
    fn evaluate_pop(&self, lookahead: &Subtree) -> Option<PopSummary> {
        self.stack
            .pop_summaries(self.options.max_popped_entries)
            .into_iter()
            .find(|summary| self.language.action(summary.state, lookahead.symbol).is_some())
    }

    fn pop_into_error(&mut self, summary: PopSummary) {
        let popped = self.stack.pop_to(summary.remaining);
        let error = SubtreeData::new_error_node(self.language, popped, summary.state);
        self.stack.push(error, summary.state, self.epoch);
        self.reductions_since_shift = 0;
    }

    /// At end of input: wrap the whole stack in one ERROR node. If the start
    /// state can finish from there, parsing continues; otherwise (or when
    /// `force` is set) that node becomes the root.
    fn wrap_stack(&mut self, force: bool) -> Option<Subtree> {
        let base_state = self.stack.base_state();
        let subtrees = self.stack.pop_all();
        let count = subtrees.len();
        self.log(LogType::Parse, || format!("wrap_in_error count:{count}"));
        if force || self.action(base_state, BUILTIN_SYM_END).is_none() {
            return Some(self.error_root(subtrees));
        }
        if !subtrees.is_empty() {
            let error = SubtreeData::new_error_node(self.language, subtrees, base_state);
            self.stack.push(error, base_state, self.epoch);
        }
        self.reductions_since_shift = 0;
        None
    }
}
