//! Inline lexer: dispatches a fixed, ordered rule set over a text run.
//!
//! At every scan position each enabled rule whose trigger fires there is
//! tried. The longest match wins and ties go to the rule registered first.
//! When nothing matches, a text run extends to the next offset any trigger
//! reports, so rules are never re-tested character by character.

mod extensions;
mod rules;
mod scan;

use std::collections::HashMap;

use crate::ast::{LinkDefinition, Token, TokenKind, TokenSeq};
use crate::block::normalize_source;
use crate::options::MarkupOptions;
use crate::span::Span;

pub(crate) use extensions::{render_spoiler, render_underline};
pub use rules::Rule;

pub(crate) type LinkDefs = HashMap<String, LinkDefinition>;

pub(crate) struct InlineLexer<'a> {
    rules: &'a [Rule],
    options: &'a MarkupOptions,
    link_defs: &'a LinkDefs,
    depth: usize,
    in_link: bool,
}

/// Per-call memo of trigger offsets and of delimiters known to be unclosed.
pub(crate) struct ScanState {
    // (searched from, earliest trigger at or after it)
    starts: Vec<Option<(usize, Option<usize>)>>,
    // (delimiter byte, run length) -> offset from which no closer exists
    unclosed: HashMap<(u8, usize), usize>,
    // `[` offset -> matching `]`, filled on first use
    brackets: Option<HashMap<usize, Option<usize>>>,
}

impl ScanState {
    fn new(rule_count: usize) -> Self {
        Self {
            starts: vec![None; rule_count],
            unclosed: HashMap::new(),
            brackets: None,
        }
    }

    /// Matching `]` for the `[` at `open`.
    pub(crate) fn bracket_end(&mut self, src: &str, open: usize) -> Option<usize> {
        let brackets = self
            .brackets
            .get_or_insert_with(|| scan::match_brackets(src));
        match brackets.get(&open) {
            Some(close) => *close,
            // Not reached by the forward scan, e.g. inside a tag.
            None => scan::find_bracket_end(src, open + 1),
        }
    }

    fn start_of(&mut self, idx: usize, rule: Rule, src: &str, from: usize) -> Option<usize> {
        if let Some((searched, found)) = self.starts[idx]
            && searched <= from
        {
            match found {
                None => return None,
                Some(at) if at >= from => return Some(at),
                Some(_) => {}
            }
        }
        let found = rule.start(src, from);
        self.starts[idx] = Some((from, found));
        found
    }

    pub(crate) fn known_unclosed(&self, key: (u8, usize), from: usize) -> bool {
        self.unclosed.get(&key).is_some_and(|at| *at <= from)
    }

    pub(crate) fn mark_unclosed(&mut self, key: (u8, usize), from: usize) {
        let entry = self.unclosed.entry(key).or_insert(from);
        *entry = (*entry).min(from);
    }
}

/// Where a rule is being tried: the lexed text, the match offset, and the
/// offset of `src` inside the outermost lexed text.
#[derive(Clone, Copy)]
pub(crate) struct Cursor<'s> {
    pub(crate) src: &'s str,
    pub(crate) pos: usize,
    pub(crate) base: usize,
}

impl<'s> Cursor<'s> {
    pub(crate) fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    pub(crate) fn token(&self, end: usize, kind: TokenKind) -> Token {
        Token {
            span: Span {
                start: self.base + self.pos,
                end: self.base + end,
            },
            raw: self.src[self.pos..end].to_string(),
            kind,
        }
    }
}

impl<'a> InlineLexer<'a> {
    pub(crate) fn new(
        rules: &'a [Rule],
        options: &'a MarkupOptions,
        link_defs: &'a LinkDefs,
    ) -> Self {
        Self {
            rules,
            options,
            link_defs,
            depth: 0,
            in_link: false,
        }
    }

    pub(crate) fn options(&self) -> &MarkupOptions {
        self.options
    }

    pub(crate) fn link_defs(&self) -> &LinkDefs {
        self.link_defs
    }

    /// A lexer for the content between a span's delimiters.
    pub(crate) fn nested(&self) -> InlineLexer<'a> {
        InlineLexer {
            depth: self.depth + 1,
            ..*self
        }
    }

    /// A lexer for link text, where links may not nest.
    pub(crate) fn nested_in_link(&self) -> InlineLexer<'a> {
        InlineLexer {
            depth: self.depth + 1,
            in_link: true,
            ..*self
        }
    }

    pub(crate) fn tokenize(&self, src: &str, base: usize) -> TokenSeq {
        if self.depth >= self.options.max_nesting {
            log::debug!(
                "inline nesting limit {} reached at offset {}",
                self.options.max_nesting,
                base
            );
        }
        let mut state = ScanState::new(self.rules.len());
        let mut tokens: TokenSeq = Vec::new();
        let mut pos = 0usize;
        while pos < src.len() {
            if let Some(token) = self.match_at(&mut state, src, pos, base) {
                pos += token.raw.len();
                push_token(&mut tokens, token);
                continue;
            }
            let from = scan::next_char_boundary(src, pos);
            let next = self.next_start(&mut state, src, from).unwrap_or(src.len());
            push_token(&mut tokens, text_token(&src[pos..next], base + pos));
            pos = next;
        }
        tokens
    }

    fn match_at(&self, state: &mut ScanState, src: &str, pos: usize, base: usize) -> Option<Token> {
        let cursor = Cursor { src, pos, base };
        let mut best: Option<Token> = None;
        for (idx, rule) in self.rules.iter().copied().enumerate() {
            if !self.enabled(rule) || state.start_of(idx, rule, src, pos) != Some(pos) {
                continue;
            }
            if let Some(token) = rule.tokenize(self, state, cursor) {
                debug_assert!(!token.raw.is_empty(), "{} matched nothing", rule.name());
                best = prefer_longest(best, token);
            }
        }
        best
    }

    fn next_start(&self, state: &mut ScanState, src: &str, from: usize) -> Option<usize> {
        let mut next: Option<usize> = None;
        for (idx, rule) in self.rules.iter().copied().enumerate() {
            if !self.enabled(rule) {
                continue;
            }
            if let Some(at) = state.start_of(idx, rule, src, from) {
                next = Some(next.map_or(at, |current| current.min(at)));
            }
        }
        next
    }

    fn enabled(&self, rule: Rule) -> bool {
        if rule.nests() && self.depth >= self.options.max_nesting {
            return false;
        }
        if self.in_link && rule.creates_link() {
            return false;
        }
        !rule.requires_gfm() || self.options.gfm
    }
}

/// Keeps the earlier candidate unless the new one consumed strictly more.
fn prefer_longest(best: Option<Token>, candidate: Token) -> Option<Token> {
    match best {
        Some(current) if current.raw.len() >= candidate.raw.len() => Some(current),
        _ => Some(candidate),
    }
}

fn text_token(raw: &str, start: usize) -> Token {
    Token {
        span: Span {
            start,
            end: start + raw.len(),
        },
        raw: raw.to_string(),
        kind: TokenKind::Text(html_escape::decode_html_entities(raw).into_owned()),
    }
}

fn push_token(tokens: &mut TokenSeq, token: Token) {
    if let TokenKind::Text(text) = &token.kind
        && let Some(last) = tokens.last_mut()
        && let TokenKind::Text(prev) = &mut last.kind
        && last.span.end == token.span.start
    {
        prev.push_str(text);
        last.raw.push_str(&token.raw);
        last.span = last.span.cover(token.span);
        return;
    }
    tokens.push(token);
}

/// Lexes `text` as a single inline run with the default rule set. Line
/// endings are normalized first and spans point into the normalized text.
pub fn tokenize_inline(text: &str, options: &MarkupOptions) -> TokenSeq {
    let text = normalize_source(text, false);
    let link_defs = LinkDefs::new();
    InlineLexer::new(Rule::DEFAULT_SET, options, &link_defs).tokenize(&text, 0)
}

/// Flattens tokens to their visible text, as used for image `alt`.
pub(crate) fn plain_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match &token.kind {
            TokenKind::Text(text) | TokenKind::CodeSpan(text) => out.push_str(text),
            TokenKind::Image { alt, .. } => out.push_str(alt),
            TokenKind::SoftBreak | TokenKind::HardBreak => out.push(' '),
            TokenKind::HtmlSpan(_) => {}
            kind => out.push_str(&plain_text(kind.children())),
        }
    }
    out
}
