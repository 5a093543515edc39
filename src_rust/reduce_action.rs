// A single reduction: pop `count` structural children and build `symbol`.

use super::language::Symbol;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReduceAction {
    pub symbol: Symbol,
    pub count: u32,
    pub production_id: u16,
    pub dynamic_precedence: i32,
}

impl ReduceAction {
    pub const fn new(symbol: Symbol, count: u32, production_id: u16) -> Self {
        Self {
            symbol,
            count,
            production_id,
            dynamic_precedence: 0,
        }
    }
}
