use super::point::{point_add, point_for_text, point_sub, Point, POINT_ZERO};

/// A span measured both in bytes and in rows/columns.
///
/// Subtrees store their size as a `Length` relative to their own start, so
/// a subtree can be shared between trees whose text differs before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Length {
    pub bytes: u32,
    pub extent: Point,
}

impl Length {
    pub fn of_text(text: &[u8]) -> Length {
        Length {
            bytes: text.len() as u32,
            extent: point_for_text(text),
        }
    }
}

#[inline]
pub fn length_min(len1: Length, len2: Length) -> Length {
    if len1.bytes < len2.bytes {
        len1
    } else {
        len2
    }
}

#[inline]
pub fn length_add(len1: Length, len2: Length) -> Length {
    Length {
        bytes: len1.bytes + len2.bytes,
        extent: point_add(len1.extent, len2.extent),
    }
}

#[inline]
pub fn length_sub(len1: Length, len2: Length) -> Length {
    Length {
        bytes: len1.bytes.saturating_sub(len2.bytes),
        extent: point_sub(len1.extent, len2.extent),
    }
}

#[inline]
pub fn length_zero() -> Length {
    Length {
        bytes: 0,
        extent: POINT_ZERO,
    }
}

#[inline]
pub fn length_saturating_sub(len1: Length, len2: Length) -> Length {
    if len1.bytes > len2.bytes {
        length_sub(len1, len2)
    } else {
        length_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_compose() {
        let a = Length::of_text(b"var x\n");
        let b = Length::of_text(b"= 1;");
        let total = length_add(a, b);
        assert_eq!(total, Length::of_text(b"var x\n= 1;"));
        assert_eq!(length_sub(total, a), b);
    }

    #[test]
    fn saturating_sub_clamps() {
        let short = Length::of_text(b"ab");
        let long = Length::of_text(b"abcd");
        assert_eq!(length_saturating_sub(short, long), length_zero());
        assert_eq!(length_min(short, long), short);
    }
}
