use std::fmt;

/// A position in a text document, as a row and a byte column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

pub const POINT_ZERO: Point = Point { row: 0, column: 0 };

#[inline]
pub fn point_add(a: Point, b: Point) -> Point {
    if b.row > 0 {
        Point::new(a.row + b.row, b.column)
    } else {
        Point::new(a.row, a.column + b.column)
    }
}

/// The extent that, added to `b`, yields `a`. Saturates at zero.
#[inline]
pub fn point_sub(a: Point, b: Point) -> Point {
    if a.row > b.row {
        Point::new(a.row - b.row, a.column)
    } else {
        Point::new(0, a.column.saturating_sub(b.column))
    }
}

/// The extent covered by `text`: one row per newline, and the byte count
/// after the last newline as the column.
pub fn point_for_text(text: &[u8]) -> Point {
    let mut result = POINT_ZERO;
    for &byte in text {
        if byte == b'\n' {
            result.row += 1;
            result.column = 0;
        } else {
            result.column += 1;
        }
    }
    result
}
