//! Spoiler (`||text||`) and underline (`--text--`) spans.

use crate::ast::{Token, TokenKind};

use super::scan::{char_at, find_str};
use super::{Cursor, InlineLexer, ScanState};

/// A span enclosed by the same two-character delimiter on both sides.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DelimitedSpan {
    pub(crate) delimiter: &'static str,
}

pub(crate) const SPOILER: DelimitedSpan = DelimitedSpan { delimiter: "||" };
pub(crate) const UNDERLINE: DelimitedSpan = DelimitedSpan { delimiter: "--" };

impl DelimitedSpan {
    /// Earliest delimiter at or after `from` that can open a span.
    pub(crate) fn start(self, src: &str, from: usize) -> Option<usize> {
        let mut at = from;
        while let Some(found) = find_str(src, at, self.delimiter) {
            if self.opens_at(src, found) {
                return Some(found);
            }
            at = found + 1;
        }
        None
    }

    fn opens_at(self, src: &str, pos: usize) -> bool {
        src.get(pos..).is_some_and(|rest| rest.starts_with(self.delimiter))
            && char_at(src, pos + self.delimiter.len()).is_some_and(|ch| !ch.is_whitespace())
    }

    fn key(self) -> (u8, usize) {
        (self.delimiter.as_bytes()[0], self.delimiter.len())
    }

    /// Matches the shortest non-empty span closed by the next delimiter.
    pub(crate) fn tokenize(
        self,
        lexer: &InlineLexer<'_>,
        state: &mut ScanState,
        at: Cursor<'_>,
        wrap: fn(Vec<Token>) -> TokenKind,
    ) -> Option<Token> {
        if !self.opens_at(at.src, at.pos) {
            return None;
        }
        let body = at.pos + self.delimiter.len();
        if state.known_unclosed(self.key(), body) {
            return None;
        }
        let Some(close) = find_str(at.src, body, self.delimiter) else {
            state.mark_unclosed(self.key(), body);
            return None;
        };
        if close == body {
            return None;
        }
        let end = close + self.delimiter.len();
        let inner = &at.src[body..close];
        let trimmed = inner.trim();
        let lead = inner.len() - inner.trim_start().len();
        let children = lexer
            .nested()
            .tokenize(trimmed, at.base + body + lead);
        Some(at.token(end, wrap(children)))
    }
}

pub(crate) fn render_spoiler(inner_html: &str) -> String {
    format!("<span class=\"spoiler\"><span>{inner_html}</span></span>")
}

pub(crate) fn render_underline(inner_html: &str) -> String {
    format!("<u><span>{inner_html}</span></u>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline::{LinkDefs, Rule};
    use crate::options::MarkupOptions;

    fn lex(src: &str) -> Vec<Token> {
        let options = MarkupOptions::default();
        let defs = LinkDefs::new();
        InlineLexer::new(Rule::DEFAULT_SET, &options, &defs).tokenize(src, 0)
    }

    #[test]
    fn trigger_skips_delimiters_followed_by_whitespace() {
        assert_eq!(SPOILER.start("a || b ||c||", 0), Some(7));
        assert_eq!(UNDERLINE.start("a -- b", 0), None);
        assert_eq!(UNDERLINE.start("--x", 0), Some(0));
        assert_eq!(SPOILER.start("||", 0), None);
    }

    #[test]
    fn spoiler_wraps_recursively_lexed_content() {
        let tokens = lex("||**bold**||");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].raw, "||**bold**||");
        let TokenKind::Spoiler(children) = &tokens[0].kind else {
            panic!("expected spoiler: {:?}", tokens);
        };
        assert!(matches!(children[0].kind, TokenKind::Strong(_)));
        assert_eq!(children[0].span.start, 2);
    }

    #[test]
    fn inner_text_is_trimmed() {
        let tokens = lex("--text  --");
        let TokenKind::Underline(children) = &tokens[0].kind else {
            panic!("expected underline: {:?}", tokens);
        };
        assert_eq!(children[0].kind, TokenKind::Text("text".to_string()));
        assert_eq!(tokens[0].raw, "--text  --");
    }

    #[test]
    fn shortest_span_closes_first() {
        let tokens = lex("||a|| b ||c||");
        let spoilers = tokens
            .iter()
            .filter(|token| matches!(token.kind, TokenKind::Spoiler(_)))
            .count();
        assert_eq!(spoilers, 2);
        assert_eq!(tokens[0].raw, "||a||");
    }

    #[test]
    fn unmatched_or_empty_spans_stay_literal() {
        for src in ["||open", "|| foo||", "||||", "a -- b -- c", "-- x --"] {
            let tokens = lex(src);
            assert_eq!(tokens.len(), 1, "{src}");
            assert_eq!(tokens[0].kind, TokenKind::Text(src.to_string()), "{src}");
        }
    }

    #[test]
    fn renderers_use_expected_wrappers() {
        assert_eq!(
            render_spoiler("x"),
            "<span class=\"spoiler\"><span>x</span></span>"
        );
        assert_eq!(render_underline("x"), "<u><span>x</span></u>");
    }
}
