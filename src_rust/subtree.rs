//! Immutable, shareable syntax subtrees.
//!
//! A subtree stores its size relative to its own start, so the same
//! `Arc<SubtreeData>` can be reused in a later tree where text before it has
//! changed. Editing never mutates shared nodes: `edit` copies the path from
//! the root down to every node the edit touches.

use std::fmt::Write as _;
use std::sync::Arc;

use super::error_costs::{
    skipped_cost, ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY,
};
use super::language::{Language, LexMode, StateId, Symbol, BUILTIN_SYM_ERROR};
use super::length::{length_add, length_saturating_sub, length_zero, Length};

pub type Subtree = Arc<SubtreeData>;

#[derive(Clone, Debug)]
pub struct SubtreeData {
    pub symbol: Symbol,
    /// The parser state on top of the stack when this subtree was pushed.
    pub parse_state: StateId,
    pub size: Length,
    /// How many bytes past the end the lexer examined while producing the
    /// tokens of this subtree.
    pub lookahead_bytes: u32,
    pub error_cost: u32,
    /// The lex mode used for the first token.
    pub lex_mode: LexMode,
    pub production_id: u16,
    pub dynamic_precedence: i32,
    pub visible_child_count: u32,
    pub named_child_count: u32,
    pub visible: bool,
    pub named: bool,
    pub extra: bool,
    pub is_missing: bool,
    pub has_changes: bool,
    /// Built across an error recovery; never reused as a whole.
    pub fragile: bool,
    pub children: Vec<Subtree>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl SubtreeData {
    fn blank(language: &Language, symbol: Symbol, parse_state: StateId) -> Self {
        let metadata = language.symbol_metadata(symbol);
        Self {
            symbol,
            parse_state,
            size: length_zero(),
            lookahead_bytes: 0,
            error_cost: 0,
            lex_mode: LexMode::default(),
            production_id: 0,
            dynamic_precedence: 0,
            visible_child_count: 0,
            named_child_count: 0,
            visible: metadata.visible,
            named: metadata.named,
            extra: metadata.extra,
            is_missing: false,
            has_changes: false,
            fragile: false,
            children: Vec::new(),
        }
    }

    pub fn new_leaf(
        language: &Language,
        symbol: Symbol,
        size: Length,
        lookahead_bytes: u32,
        parse_state: StateId,
        lex_mode: LexMode,
    ) -> Subtree {
        let mut leaf = Self::blank(language, symbol, parse_state);
        leaf.size = size;
        leaf.lookahead_bytes = lookahead_bytes;
        leaf.lex_mode = lex_mode;
        if symbol == BUILTIN_SYM_ERROR {
            leaf.error_cost = skipped_cost(0, size);
        }
        Arc::new(leaf)
    }

    /// A zero-width token the parser pretended to see.
    pub fn new_missing_leaf(
        language: &Language,
        symbol: Symbol,
        parse_state: StateId,
        lex_mode: LexMode,
    ) -> Subtree {
        let mut leaf = Self::blank(language, symbol, parse_state);
        leaf.lex_mode = lex_mode;
        leaf.is_missing = true;
        leaf.extra = false;
        leaf.error_cost = ERROR_COST_PER_RECOVERY + ERROR_COST_PER_MISSING_TREE;
        Arc::new(leaf)
    }

    pub fn new_node(
        language: &Language,
        symbol: Symbol,
        children: Vec<Subtree>,
        production_id: u16,
        parse_state: StateId,
    ) -> Self {
        let mut node = Self::blank(language, symbol, parse_state);
        node.production_id = production_id;
        node.extra = false;
        node.children = children;
        node.summarize_children();
        node
    }

    /// An ERROR node wrapping skipped tokens or abandoned stack entries.
    /// It is an extra, so it never counts toward a production's children.
    pub fn new_error_node(
        language: &Language,
        children: Vec<Subtree>,
        parse_state: StateId,
    ) -> Subtree {
        let mut node = Self::new_node(language, BUILTIN_SYM_ERROR, children, 0, parse_state);
        node.extra = true;
        Arc::new(node)
    }

    /// Recompute everything a node derives from its children.
    pub fn summarize_children(&mut self) {
        let children = std::mem::take(&mut self.children);
        self.size = length_zero();
        self.lookahead_bytes = 0;
        self.error_cost = 0;
        self.visible_child_count = 0;
        self.named_child_count = 0;
        self.dynamic_precedence = 0;
        self.append_children(children);
    }

    /// Add children after the existing ones, folding them into the summary
    /// without revisiting the children already there.
    pub fn append_children(&mut self, children: impl IntoIterator<Item = Subtree>) {
        let is_error = self.symbol == BUILTIN_SYM_ERROR;
        let mut error_cost = self.error_cost;
        if is_error {
            error_cost =
                error_cost.saturating_sub(skipped_cost(self.children.len() as u32, self.size));
        }
        let mut window_end = self.size.bytes + self.lookahead_bytes;

        for child in children {
            self.size = length_add(self.size, child.size);
            window_end = window_end.max(self.size.bytes + child.lookahead_bytes);
            error_cost = error_cost.saturating_add(child.error_cost);
            self.dynamic_precedence += child.dynamic_precedence;
            if child.visible {
                self.visible_child_count += 1;
                if child.named {
                    self.named_child_count += 1;
                }
            } else if !child.children.is_empty() {
                self.visible_child_count += child.visible_child_count;
                self.named_child_count += child.named_child_count;
            }
            if self.children.is_empty() {
                self.lex_mode = child.lex_mode;
            }
            self.children.push(child);
        }

        if is_error {
            error_cost =
                error_cost.saturating_add(skipped_cost(self.children.len() as u32, self.size));
        }
        self.error_cost = error_cost;
        self.lookahead_bytes = window_end.saturating_sub(self.size.bytes);
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl SubtreeData {
    #[inline]
    pub fn is_error(&self) -> bool {
        self.symbol == BUILTIN_SYM_ERROR
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.error_cost > 0
    }

    /// Whether the parser may push this node without looking inside it.
    pub fn is_reusable(&self) -> bool {
        !self.has_changes
            && !self.has_error()
            && !self.fragile
            && !self.is_missing
            && self.size.bytes > 0
    }

    /// The first leaf of this subtree.
    pub fn first_leaf(&self) -> &SubtreeData {
        let mut tree = self;
        while let Some(child) = tree.children.first() {
            tree = child;
        }
        tree
    }
}

/// `tree` with a different parse state and extra flag, copied only if
/// something changes.
pub fn with_parse_state(tree: &Subtree, parse_state: StateId, extra: bool) -> Subtree {
    if tree.parse_state == parse_state && tree.extra == extra {
        return Arc::clone(tree);
    }
    let mut data = SubtreeData::clone(tree);
    data.parse_state = parse_state;
    data.extra = extra;
    Arc::new(data)
}

// Deep trees would otherwise overflow the stack through recursive drops.
impl Drop for SubtreeData {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(child) = stack.pop() {
            if let Ok(mut data) = Arc::try_unwrap(child) {
                stack.append(&mut data.children);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Editing
// ---------------------------------------------------------------------------

/// An edit in coordinates relative to the start of the subtree it is
/// applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubtreeEdit {
    pub start: Length,
    pub old_end: Length,
    pub new_end: Length,
}

/// Apply `edit`, copying every node whose lookahead window touches it.
///
/// Inserted text is attributed to the first child that touches the edit;
/// later children only shrink to compensate for the deleted text.
pub fn edit(tree: &Subtree, edit: SubtreeEdit) -> Subtree {
    // A node copied but not yet rebuilt, with the edits still owed to its
    // children.
    struct EditEntry {
        data: SubtreeData,
        child_edits: std::vec::IntoIter<(usize, SubtreeEdit)>,
        index_in_parent: usize,
    }

    impl EditEntry {
        fn new(tree: &Subtree, edit: SubtreeEdit, index_in_parent: usize) -> Self {
            let (data, child_edits) = edit_node(tree, edit);
            Self {
                data,
                child_edits: child_edits.into_iter(),
                index_in_parent,
            }
        }
    }

    let mut stack: Vec<EditEntry> = Vec::new();
    let mut entry = EditEntry::new(tree, edit, 0);
    loop {
        if let Some((index, child_edit)) = entry.child_edits.next() {
            let child = EditEntry::new(&entry.data.children[index], child_edit, index);
            stack.push(std::mem::replace(&mut entry, child));
            continue;
        }
        let index = entry.index_in_parent;
        let edited = Arc::new(entry.data);
        match stack.pop() {
            Some(mut parent) => {
                parent.data.children[index] = edited;
                entry = parent;
            }
            None => return edited,
        }
    }
}

/// Copy one node with its size adjusted, and work out which children the
/// edit reaches.
fn edit_node(tree: &SubtreeData, edit: SubtreeEdit) -> (SubtreeData, Vec<(usize, SubtreeEdit)>) {
    let mut data = SubtreeData::clone(tree);
    let is_noop = edit.old_end.bytes == edit.start.bytes && edit.new_end.bytes == edit.start.bytes;
    let mut is_pure_insertion = edit.old_end.bytes == edit.start.bytes;

    if !is_noop {
        data.size = length_add(edit.new_end, length_saturating_sub(data.size, edit.old_end));
    }
    data.has_changes = true;

    let mut child_edits = Vec::new();
    let mut remaining = edit;
    let mut child_left = length_zero();
    for (index, child) in data.children.iter().enumerate() {
        let child_size = child.size;
        let child_right = length_add(child_left, child_size);

        if child_right.bytes + child.lookahead_bytes < remaining.start.bytes {
            child_left = child_right;
            continue;
        }
        if child_left.bytes > remaining.old_end.bytes
            || (child_left.bytes == remaining.old_end.bytes && child_size.bytes > 0 && index > 0)
        {
            break;
        }

        let mut child_edit = SubtreeEdit {
            start: length_saturating_sub(remaining.start, child_left),
            old_end: length_saturating_sub(remaining.old_end, child_left),
            new_end: length_saturating_sub(remaining.new_end, child_left),
        };

        if child_right.bytes > remaining.start.bytes
            || (child_right.bytes == remaining.start.bytes && is_pure_insertion)
        {
            remaining.new_end = remaining.start;
            is_pure_insertion = false;
        } else {
            // Only the lookahead window reaches the edit.
            child_edit.old_end = child_edit.start;
            child_edit.new_end = child_edit.start;
        }

        child_edits.push((index, child_edit));
        child_left = child_right;
    }

    (data, child_edits)
}

// ---------------------------------------------------------------------------
// S-expressions
// ---------------------------------------------------------------------------

/// Render `tree` as an S-expression of its named nodes, with field labels.
pub fn to_sexp(tree: &SubtreeData, language: &Language) -> String {
    let mut out = String::new();
    write_sexp(tree, language, &mut out);
    if out.is_empty() {
        out.push_str("()");
    }
    out
}

enum SexpStep<'a> {
    Open {
        tree: &'a SubtreeData,
        field_name: Option<&'a str>,
        is_root: bool,
    },
    Close,
}

fn write_sexp<'a>(root: &'a SubtreeData, language: &'a Language, out: &mut String) {
    let mut steps = vec![SexpStep::Open {
        tree: root,
        field_name: None,
        is_root: true,
    }];

    while let Some(step) = steps.pop() {
        let (tree, field_name, is_root) = match step {
            SexpStep::Close => {
                out.push(')');
                continue;
            }
            SexpStep::Open {
                tree,
                field_name,
                is_root,
            } => (tree, field_name, is_root),
        };

        let visible = is_root || tree.is_missing || (tree.visible && tree.named);
        let name = language.symbol_name(tree.symbol).unwrap_or("?");

        if visible {
            if !out.is_empty() {
                out.push(' ');
            }
            if let Some(field_name) = field_name {
                let _ = write!(out, "{field_name}: ");
            }
            if tree.is_missing {
                if tree.named {
                    let _ = write!(out, "(MISSING {name}");
                } else {
                    let _ = write!(out, "(MISSING {name:?}");
                }
            } else {
                let _ = write!(out, "({name}");
            }
            steps.push(SexpStep::Close);
        }

        let field_map = language.field_map(tree.production_id);
        let mut structural_child_index = 0;
        let mut children = Vec::with_capacity(tree.children.len());
        for child in &tree.children {
            let mut child_field_name = if visible { None } else { field_name };
            if child.extra {
                child_field_name = None;
            } else {
                if let Some(entry) = field_map.iter().find(|entry| {
                    !entry.inherited && entry.child_index as usize == structural_child_index
                }) {
                    child_field_name = language.field_name_for_id(entry.field_id);
                }
                structural_child_index += 1;
            }
            children.push(SexpStep::Open {
                tree: child,
                field_name: child_field_name,
                is_root: false,
            });
        }
        steps.extend(children.into_iter().rev());
    }
}
