// Costs used to rank error-recovery strategies and to summarize how
// erroneous a subtree is.

use super::language::StateId;
use super::length::Length;

pub const ERROR_STATE: StateId = 0;
pub const ERROR_COST_PER_RECOVERY: u32 = 500;
pub const ERROR_COST_PER_MISSING_TREE: u32 = 110;
pub const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
pub const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;
pub const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;

/// Cost of turning `tree_count` subtrees covering `size` into an error.
#[inline]
pub fn skipped_cost(tree_count: u32, size: Length) -> u32 {
    ERROR_COST_PER_RECOVERY
        + ERROR_COST_PER_SKIPPED_TREE * tree_count
        + ERROR_COST_PER_SKIPPED_CHAR * size.bytes
        + ERROR_COST_PER_SKIPPED_LINE * size.extent.row
}

#[inline]
pub fn missing_cost() -> u32 {
    ERROR_COST_PER_RECOVERY + ERROR_COST_PER_MISSING_TREE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipping_one_byte_is_cheaper_than_a_missing_token() {
        let one_byte = Length::of_text(b"}");
        assert_eq!(skipped_cost(1, one_byte), 601);
        assert!(skipped_cost(1, one_byte) < missing_cost());
        assert!(skipped_cost(2, Length::of_text(b"x y")) > missing_cost());
    }
}
