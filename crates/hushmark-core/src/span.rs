/// Byte range `start..end` into the text handed to a parser or lexer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Joins two spans into one covering both.
    pub fn cover(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Span;

    #[test]
    fn cover_spans_both_inputs() {
        let left = Span { start: 3, end: 5 };
        let right = Span { start: 5, end: 9 };
        assert_eq!(left.cover(right), Span { start: 3, end: 9 });
        assert_eq!(right.cover(left), Span { start: 3, end: 9 });
    }
}
