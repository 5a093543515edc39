// Structural diff between an edited tree and its reparse.
//
// Both trees are walked together. Subtrees shared by pointer at the same
// position match outright; everything else is compared by symbol and shape,
// and the regions where the shapes part ways are reported.

use std::sync::Arc;

use super::length::{length_add, length_zero, Length};
use super::subtree::Subtree;
use super::tree::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparison {
    Matches,
    MayDiffer,
    Differs,
}

#[derive(Default)]
struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    fn add(&mut self, start: Length, end: Length) {
        if let Some(last) = self.ranges.last_mut() {
            if start.bytes as usize <= last.end_byte {
                if end.bytes as usize > last.end_byte {
                    last.end_byte = end.bytes as usize;
                    last.end_point = end.extent;
                }
                return;
            }
        }
        if start.bytes < end.bytes {
            self.ranges.push(Range {
                start_byte: start.bytes as usize,
                end_byte: end.bytes as usize,
                start_point: start.extent,
                end_point: end.extent,
            });
        }
    }
}

fn compare(old: &Subtree, old_start: Length, new: &Subtree, new_start: Length) -> Comparison {
    if old.symbol != new.symbol || old.visible != new.visible || old.extra != new.extra {
        return Comparison::Differs;
    }
    if Arc::ptr_eq(old, new) && old_start.bytes == new_start.bytes && !old.has_changes {
        return Comparison::Matches;
    }
    Comparison::MayDiffer
}

fn end_of(tree: &Subtree, start: Length) -> Length {
    length_add(start, tree.size)
}

fn lesser(a: Length, b: Length) -> Length {
    if a.bytes <= b.bytes {
        a
    } else {
        b
    }
}

fn greater(a: Length, b: Length) -> Length {
    if a.bytes >= b.bytes {
        a
    } else {
        b
    }
}

fn child_positions(tree: &Subtree, start: Length) -> Vec<(Subtree, Length)> {
    let mut position = start;
    tree.children
        .iter()
        .map(|child| {
            let entry = (Arc::clone(child), position);
            position = length_add(position, child.size);
            entry
        })
        .collect()
}

fn add_span(old: &[(Subtree, Length)], new: &[(Subtree, Length)], ranges: &mut RangeSet) {
    let spans = old.iter().chain(new.iter()).map(|(tree, start)| (*start, end_of(tree, *start)));
    let mut span: Option<(Length, Length)> = None;
    for (start, end) in spans {
        span = Some(match span {
            None => (start, end),
            Some((span_start, span_end)) => (lesser(span_start, start), greater(span_end, end)),
        });
    }
    if let Some((start, end)) = span {
        ranges.add(start, end);
    }
}

fn diff(old: &Subtree, new: &Subtree, ranges: &mut RangeSet) {
    let mut pending = vec![(Arc::clone(old), length_zero(), Arc::clone(new), length_zero())];

    while let Some((old, old_start, new, new_start)) = pending.pop() {
        let old_end = end_of(&old, old_start);
        let new_end = end_of(&new, new_start);
        match compare(&old, old_start, &new, new_start) {
            Comparison::Matches => {}
            Comparison::Differs => {
                ranges.add(lesser(old_start, new_start), greater(old_end, new_end));
            }
            Comparison::MayDiffer => {
                if old.children.is_empty() || new.children.is_empty() {
                    if old.children.len() != new.children.len()
                        || old_start.bytes != new_start.bytes
                        || old.size.bytes != new.size.bytes
                        || old.is_missing != new.is_missing
                    {
                        ranges.add(lesser(old_start, new_start), greater(old_end, new_end));
                    }
                    continue;
                }

                let old_children = child_positions(&old, old_start);
                let new_children = child_positions(&new, new_start);
                let shared = old_children.len().min(new_children.len());

                let mut prefix = 0;
                while prefix < shared {
                    let (old_child, old_child_start) = &old_children[prefix];
                    let (new_child, new_child_start) = &new_children[prefix];
                    if compare(old_child, *old_child_start, new_child, *new_child_start)
                        != Comparison::Matches
                    {
                        break;
                    }
                    prefix += 1;
                }
                let mut suffix = 0;
                while suffix < shared - prefix {
                    let (old_child, old_child_start) =
                        &old_children[old_children.len() - 1 - suffix];
                    let (new_child, new_child_start) =
                        &new_children[new_children.len() - 1 - suffix];
                    if compare(old_child, *old_child_start, new_child, *new_child_start)
                        != Comparison::Matches
                    {
                        break;
                    }
                    suffix += 1;
                }

                let old_middle = &old_children[prefix..old_children.len() - suffix];
                let new_middle = &new_children[prefix..new_children.len() - suffix];
                if old_middle.len() == new_middle.len() {
                    // Reversed, so the leftmost pair is compared first.
                    pending.extend(old_middle.iter().zip(new_middle).rev().map(
                        |((old_child, old_child_start), (new_child, new_child_start))| {
                            (
                                Arc::clone(old_child),
                                *old_child_start,
                                Arc::clone(new_child),
                                *new_child_start,
                            )
                        },
                    ));
                } else {
                    add_span(old_middle, new_middle, ranges);
                }
            }
        }
    }
}

/// Ranges where the structure of `old` and `new` differ, sorted and merged.
pub fn get_changed_ranges(old: &Subtree, new: &Subtree) -> Vec<Range> {
    let mut ranges = RangeSet::default();
    diff(old, new, &mut ranges);
    let mut sorted = ranges.ranges;
    sorted.sort();
    let mut merged = RangeSet::default();
    for range in sorted {
        merged.add(
            Length {
                bytes: range.start_byte as u32,
                extent: range.start_point,
            },
            Length {
                bytes: range.end_byte as u32,
                extent: range.end_point,
            },
        );
    }
    merged.ranges
}
