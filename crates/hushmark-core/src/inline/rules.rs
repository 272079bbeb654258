use crate::ast::{Token, TokenKind};
use crate::label::normalize_link_label;

use super::extensions::{SPOILER, UNDERLINE};
use super::scan::{
    char_at, char_before, code_span_end, count_run, find_byte, find_str,
    find_url_literal, html_comment_end, html_tag_end, is_autolink_email, is_autolink_scheme,
    next_delimiter_run, parse_inline_link_destination, url_literal_end, url_literal_prefix,
};
use super::{Cursor, InlineLexer, ScanState, plain_text};

/// One inline grammar rule. The lexer consults rules in the order of
/// [`Rule::DEFAULT_SET`]; that order breaks ties between equally long
/// matches at the same offset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    Spoiler,
    Underline,
    Escape,
    CodeSpan,
    Autolink,
    InlineHtml,
    Image,
    Link,
    Strong,
    Emphasis,
    Strikethrough,
    Break,
    UrlLiteral,
}

impl Rule {
    pub const DEFAULT_SET: &'static [Rule] = &[
        Rule::Spoiler,
        Rule::Underline,
        Rule::Escape,
        Rule::CodeSpan,
        Rule::Autolink,
        Rule::InlineHtml,
        Rule::Image,
        Rule::Link,
        Rule::Strong,
        Rule::Emphasis,
        Rule::Strikethrough,
        Rule::Break,
        Rule::UrlLiteral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rule::Spoiler => "spoiler",
            Rule::Underline => "underline",
            Rule::Escape => "escape",
            Rule::CodeSpan => "codespan",
            Rule::Autolink => "autolink",
            Rule::InlineHtml => "html",
            Rule::Image => "image",
            Rule::Link => "link",
            Rule::Strong => "strong",
            Rule::Emphasis => "em",
            Rule::Strikethrough => "del",
            Rule::Break => "br",
            Rule::UrlLiteral => "url",
        }
    }

    /// Rules that lex their content again and therefore count toward the
    /// nesting limit.
    pub(crate) fn nests(self) -> bool {
        matches!(
            self,
            Rule::Spoiler
                | Rule::Underline
                | Rule::Image
                | Rule::Link
                | Rule::Strong
                | Rule::Emphasis
                | Rule::Strikethrough
        )
    }

    pub(crate) fn creates_link(self) -> bool {
        matches!(self, Rule::Autolink | Rule::Link | Rule::UrlLiteral)
    }

    pub(crate) fn requires_gfm(self) -> bool {
        matches!(self, Rule::Strikethrough | Rule::UrlLiteral)
    }

    /// Earliest offset at or after `from` where this rule could match.
    pub(crate) fn start(self, src: &str, from: usize) -> Option<usize> {
        match self {
            Rule::Spoiler => SPOILER.start(src, from),
            Rule::Underline => UNDERLINE.start(src, from),
            Rule::Escape => escape_start(src, from),
            Rule::CodeSpan => find_byte(src, from, b'`'),
            Rule::Autolink | Rule::InlineHtml => find_byte(src, from, b'<'),
            Rule::Image => find_str(src, from, "!["),
            Rule::Link => find_byte(src, from, b'['),
            Rule::Strong => STRONG.start(src, from),
            Rule::Emphasis => EMPHASIS.start(src, from),
            Rule::Strikethrough => STRIKETHROUGH.start(src, from),
            Rule::Break => break_start(src, from),
            Rule::UrlLiteral => find_url_literal(src, from),
        }
    }

    pub(crate) fn tokenize(
        self,
        lexer: &InlineLexer<'_>,
        state: &mut ScanState,
        at: Cursor<'_>,
    ) -> Option<Token> {
        match self {
            Rule::Spoiler => SPOILER.tokenize(lexer, state, at, TokenKind::Spoiler),
            Rule::Underline => UNDERLINE.tokenize(lexer, state, at, TokenKind::Underline),
            Rule::Escape => escape(at),
            Rule::CodeSpan => code_span(state, at),
            Rule::Autolink => autolink(at),
            Rule::InlineHtml => inline_html(at),
            Rule::Image => image(lexer, state, at),
            Rule::Link => link(lexer, state, at),
            Rule::Strong => STRONG.tokenize(lexer, at),
            Rule::Emphasis => EMPHASIS.tokenize(lexer, at),
            Rule::Strikethrough => STRIKETHROUGH.tokenize(lexer, at),
            Rule::Break => line_break(lexer, at),
            Rule::UrlLiteral => url_literal(at),
        }
    }
}

fn escape_start(src: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut at = from;
    while let Some(found) = find_byte(src, at, b'\\') {
        if bytes.get(found + 1).is_some_and(|b| b.is_ascii_punctuation()) {
            return Some(found);
        }
        at = found + 1;
    }
    None
}

fn escape(at: Cursor<'_>) -> Option<Token> {
    let bytes = at.rest().as_bytes();
    if bytes.first() != Some(&b'\\') {
        return None;
    }
    let escaped = *bytes.get(1)?;
    if !escaped.is_ascii_punctuation() {
        return None;
    }
    Some(at.token(at.pos + 2, TokenKind::Text(char::from(escaped).to_string())))
}

fn code_span(state: &mut ScanState, at: Cursor<'_>) -> Option<Token> {
    let bytes = at.src.as_bytes();
    let run = count_run(bytes, at.pos, b'`');
    if run == 0 {
        return None;
    }
    let key = (b'`', run);
    let end = if state.known_unclosed(key, at.pos) {
        None
    } else {
        code_span_end(bytes, at.pos, run)
    };
    let Some(end) = end else {
        state.mark_unclosed(key, at.pos);
        let ticks = &at.src[at.pos..at.pos + run];
        return Some(at.token(at.pos + run, TokenKind::Text(ticks.to_string())));
    };
    let content = at.src[at.pos + run..end - run].replace('\n', " ");
    let stripped = if content.len() >= 2
        && content.starts_with(' ')
        && content.ends_with(' ')
        && !content.bytes().all(|b| b == b' ')
    {
        content[1..content.len() - 1].to_string()
    } else {
        content
    };
    Some(at.token(end, TokenKind::CodeSpan(stripped)))
}

fn autolink(at: Cursor<'_>) -> Option<Token> {
    let rest = at.rest();
    if !rest.starts_with('<') {
        return None;
    }
    let close = rest.find('>')?;
    let inner = &rest[1..close];
    if inner.is_empty() || inner.bytes().any(|b| b.is_ascii_whitespace() || b == b'<') {
        return None;
    }
    let url = if is_autolink_scheme(inner) {
        inner.to_string()
    } else if is_autolink_email(inner) {
        format!("mailto:{inner}")
    } else {
        return None;
    };
    let children = vec![text_child(at, 1, inner)];
    Some(at.token(
        at.pos + close + 1,
        TokenKind::Link {
            url,
            title: None,
            children,
        },
    ))
}

fn inline_html(at: Cursor<'_>) -> Option<Token> {
    let end = html_comment_end(at.src, at.pos).or_else(|| html_tag_end(at.src, at.pos))?;
    Some(at.token(end, TokenKind::HtmlSpan(at.src[at.pos..end].to_string())))
}

/// Resolved target of a bracketed link or image.
// Memo key for "no `)` from here on".
const CLOSE_PAREN: (u8, usize) = (b')', 1);

struct LinkTarget {
    url: String,
    title: Option<String>,
    end: usize,
}

/// Parses what follows the `]` at `close`: an inline destination, or a
/// full, collapsed or shortcut reference to a collected definition.
fn link_target(
    lexer: &InlineLexer<'_>,
    state: &mut ScanState,
    src: &str,
    text: &str,
    close: usize,
) -> Option<LinkTarget> {
    let after = close + 1;
    if let Some((url, title, end)) = inline_destination(state, src, after) {
        return Some(LinkTarget { url, title, end });
    }
    let defs = lexer.link_defs();
    if defs.is_empty() {
        return None;
    }
    if src.as_bytes().get(after) == Some(&b'[')
        && let Some(label_end) = find_byte(src, after + 1, b']')
    {
        let label = &src[after + 1..label_end];
        if !label.contains('[') {
            let key = if label.trim().is_empty() { text } else { label };
            if let Some(def) = defs.get(&normalize_link_label(key)) {
                return Some(LinkTarget {
                    url: def.url.clone(),
                    title: def.title.clone(),
                    end: label_end + 1,
                });
            }
        }
    }
    defs.get(&normalize_link_label(text)).map(|def| LinkTarget {
        url: def.url.clone(),
        title: def.title.clone(),
        end: after,
    })
}

/// Inline `(url "title")` destination at `start`. Every destination ends
/// in `)`, so once none is left the remaining attempts fail without a scan.
fn inline_destination(
    state: &mut ScanState,
    src: &str,
    start: usize,
) -> Option<(String, Option<String>, usize)> {
    if src.as_bytes().get(start) != Some(&b'(') || state.known_unclosed(CLOSE_PAREN, start) {
        return None;
    }
    if find_byte(src, start, b')').is_none() {
        state.mark_unclosed(CLOSE_PAREN, start);
        return None;
    }
    parse_inline_link_destination(src, start)
}

fn link(lexer: &InlineLexer<'_>, state: &mut ScanState, at: Cursor<'_>) -> Option<Token> {
    if !at.rest().starts_with('[') {
        return None;
    }
    let close = state.bracket_end(at.src, at.pos)?;
    let text = &at.src[at.pos + 1..close];
    let target = link_target(lexer, state, at.src, text, close)?;
    let children = lexer.nested_in_link().tokenize(text, at.base + at.pos + 1);
    Some(at.token(
        target.end,
        TokenKind::Link {
            url: target.url,
            title: target.title,
            children,
        },
    ))
}

fn image(lexer: &InlineLexer<'_>, state: &mut ScanState, at: Cursor<'_>) -> Option<Token> {
    if !at.rest().starts_with("![") {
        return None;
    }
    let close = state.bracket_end(at.src, at.pos + 1)?;
    let text = &at.src[at.pos + 2..close];
    let target = link_target(lexer, state, at.src, text, close)?;
    let alt_tokens = lexer.nested_in_link().tokenize(text, at.base + at.pos + 2);
    Some(at.token(
        target.end,
        TokenKind::Image {
            url: target.url,
            title: target.title,
            alt: plain_text(&alt_tokens),
        },
    ))
}

/// Emphasis-like span: an opener of `open_len` copies of one of `chars`,
/// closed by a run of the same character.
#[derive(Clone, Copy)]
struct EmphasisSpan {
    chars: &'static [u8],
    open_len: usize,
    wrap: fn(Vec<Token>) -> TokenKind,
}

const STRONG: EmphasisSpan = EmphasisSpan {
    chars: b"*_",
    open_len: 2,
    wrap: TokenKind::Strong,
};

const EMPHASIS: EmphasisSpan = EmphasisSpan {
    chars: b"*_",
    open_len: 1,
    wrap: TokenKind::Emph,
};

const STRIKETHROUGH: EmphasisSpan = EmphasisSpan {
    chars: b"~",
    open_len: 2,
    wrap: TokenKind::Strikethrough,
};

impl EmphasisSpan {
    fn start(self, src: &str, from: usize) -> Option<usize> {
        let bytes = src.as_bytes();
        (from..bytes.len()).find(|idx| self.opens_at(src, *idx))
    }

    fn opens_at(self, src: &str, pos: usize) -> bool {
        let bytes = src.as_bytes();
        let Some(&ch) = bytes.get(pos) else {
            return false;
        };
        if !self.chars.contains(&ch) || count_run(bytes, pos, ch) < self.open_len {
            return false;
        }
        let Some(next) = char_at(src, pos + self.open_len) else {
            return false;
        };
        if next.is_whitespace() {
            return false;
        }
        if self.open_len == 1 && next == char::from(ch) {
            return false;
        }
        !(ch == b'_' && char_before(src, pos).is_some_and(char::is_alphanumeric))
    }

    /// Whether a closing run of `run_len` fits this span.
    fn accepts(self, run_len: usize) -> bool {
        if self.open_len == 1 {
            run_len % 2 == 1
        } else {
            run_len >= self.open_len
        }
    }

    fn closes_at(self, src: &str, run_at: usize, run_len: usize) -> bool {
        let ch = src.as_bytes()[run_at];
        if char_before(src, run_at).is_none_or(char::is_whitespace) {
            return false;
        }
        !(ch == b'_' && char_at(src, run_at + run_len).is_some_and(char::is_alphanumeric))
    }

    fn tokenize(self, lexer: &InlineLexer<'_>, at: Cursor<'_>) -> Option<Token> {
        if !self.opens_at(at.src, at.pos) {
            return None;
        }
        let ch = at.src.as_bytes()[at.pos];
        let mut from = at.pos + count_run(at.src.as_bytes(), at.pos, ch);
        while let Some((run_at, run_len)) = next_delimiter_run(at.src, from, ch) {
            if self.accepts(run_len) && self.closes_at(at.src, run_at, run_len) {
                let body = at.pos + self.open_len;
                let end = run_at + run_len;
                let inner = &at.src[body..end - self.open_len];
                let children = lexer.nested().tokenize(inner, at.base + body);
                return Some(at.token(end, (self.wrap)(children)));
            }
            from = run_at + run_len;
        }
        None
    }
}

fn break_start(src: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let newline = find_byte(src, from, b'\n')?;
    let mut at = newline;
    while at > from && bytes[at - 1] == b' ' {
        at -= 1;
    }
    if at == newline && at > from && bytes[at - 1] == b'\\' {
        at -= 1;
    }
    Some(at)
}

fn line_break(lexer: &InlineLexer<'_>, at: Cursor<'_>) -> Option<Token> {
    let bytes = at.src.as_bytes();
    let mut end = at.pos;
    let hard = if bytes.get(end) == Some(&b'\\') {
        if bytes.get(end + 1) != Some(&b'\n') {
            return None;
        }
        end += 2;
        true
    } else {
        let spaces = count_run(bytes, end, b' ');
        end += spaces;
        if bytes.get(end) != Some(&b'\n') {
            return None;
        }
        end += 1;
        spaces >= 2 || lexer.options().breaks
    };
    end += count_run(bytes, end, b' ');
    let kind = if hard {
        TokenKind::HardBreak
    } else {
        TokenKind::SoftBreak
    };
    Some(at.token(end, kind))
}

fn url_literal(at: Cursor<'_>) -> Option<Token> {
    let prefix = url_literal_prefix(at.src, at.pos)?;
    let end = url_literal_end(at.src, at.pos);
    if end <= at.pos + prefix {
        return None;
    }
    let text = &at.src[at.pos..end];
    if prefix == 4 && !text[prefix..].contains('.') {
        return None;
    }
    let url = if text.starts_with("www.") {
        format!("http://{text}")
    } else {
        text.to_string()
    };
    let children = vec![text_child(at, 0, text)];
    Some(at.token(
        end,
        TokenKind::Link {
            url,
            title: None,
            children,
        },
    ))
}

/// Literal text child located `offset` bytes after the match position.
fn text_child(at: Cursor<'_>, offset: usize, text: &str) -> Token {
    let inner = Cursor {
        src: at.src,
        pos: at.pos + offset,
        base: at.base,
    };
    inner.token(inner.pos + text.len(), TokenKind::Text(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LinkDefinition;
    use crate::inline::LinkDefs;
    use crate::options::MarkupOptions;

    fn lex_with(src: &str, options: &MarkupOptions, defs: &LinkDefs) -> Vec<Token> {
        InlineLexer::new(Rule::DEFAULT_SET, options, defs).tokenize(src, 0)
    }

    fn lex(src: &str) -> Vec<Token> {
        lex_with(src, &MarkupOptions::default(), &LinkDefs::new())
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).into_iter().map(|token| token.kind).collect()
    }

    fn text(value: &str) -> TokenKind {
        TokenKind::Text(value.to_string())
    }

    #[test]
    fn unclosed_link_openers_stay_text() {
        for src in ["[a](".repeat(2000), "[".repeat(4000), "![a](".repeat(1500)] {
            let tokens = lex(&src);
            assert_eq!(tokens.len(), 1, "{}", &src[..8]);
            assert_eq!(tokens[0].raw, src);
        }
    }

    #[test]
    fn missing_close_paren_is_remembered() {
        let mut state = ScanState::new(Rule::DEFAULT_SET.len());
        let src = "[a](b [c](d";
        assert!(inline_destination(&mut state, src, 9).is_none());
        assert!(state.known_unclosed(CLOSE_PAREN, 9));
        assert!(inline_destination(&mut state, src, 3).is_none());
        assert!(state.known_unclosed(CLOSE_PAREN, 3));
        let mut fresh = ScanState::new(Rule::DEFAULT_SET.len());
        assert!(inline_destination(&mut fresh, "(b) [c](d", 0).is_some());
        assert!(!fresh.known_unclosed(CLOSE_PAREN, 0));
    }

    #[test]
    fn extensions_register_before_builtins() {
        assert_eq!(&Rule::DEFAULT_SET[..2], &[Rule::Spoiler, Rule::Underline]);
        let mut names: Vec<&str> = Rule::DEFAULT_SET.iter().map(|rule| rule.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Rule::DEFAULT_SET.len());
    }

    #[test]
    fn escapes_produce_literal_punctuation() {
        assert_eq!(kinds("\\*a\\*"), vec![text("*a*")]);
        assert_eq!(kinds("\\a"), vec![text("\\a")]);
    }

    #[test]
    fn code_spans_strip_one_space_and_keep_markup() {
        assert_eq!(
            kinds("` **a** `"),
            vec![TokenKind::CodeSpan("**a**".to_string())]
        );
        assert_eq!(kinds("``a`b``"), vec![TokenKind::CodeSpan("a`b".to_string())]);
        assert_eq!(kinds("`open"), vec![text("`open")]);
    }

    #[test]
    fn code_span_hides_delimiters_from_emphasis() {
        let tokens = lex("*a `*` b*");
        let TokenKind::Emph(children) = &tokens[0].kind else {
            panic!("expected emphasis: {:?}", tokens);
        };
        assert!(
            children
                .iter()
                .any(|child| child.kind == TokenKind::CodeSpan("*".to_string()))
        );
    }

    #[test]
    fn strong_emphasis_and_strikethrough() {
        let tokens = lex("**a** *b* __c__ _d_ ~~e~~");
        let wrapped: Vec<&str> = tokens
            .iter()
            .filter_map(|token| match &token.kind {
                TokenKind::Strong(_) => Some("strong"),
                TokenKind::Emph(_) => Some("em"),
                TokenKind::Strikethrough(_) => Some("del"),
                _ => None,
            })
            .collect();
        assert_eq!(wrapped, vec!["strong", "em", "strong", "em", "del"]);
    }

    #[test]
    fn triple_delimiters_nest_emphasis_in_strong() {
        let tokens = lex("***a***");
        let TokenKind::Strong(children) = &tokens[0].kind else {
            panic!("expected strong: {:?}", tokens);
        };
        assert!(matches!(children[0].kind, TokenKind::Emph(_)));
    }

    #[test]
    fn intraword_underscores_stay_literal() {
        assert_eq!(kinds("snake_case_name"), vec![text("snake_case_name")]);
        assert_eq!(kinds("a * b *"), vec![text("a * b *")]);
    }

    #[test]
    fn strikethrough_requires_gfm() {
        let options = MarkupOptions {
            gfm: false,
            ..MarkupOptions::default()
        };
        let tokens = lex_with("~~a~~ https://x.io", &options, &LinkDefs::new());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, text("~~a~~ https://x.io"));
    }

    #[test]
    fn inline_links_and_images() {
        let tokens = lex("[a *b*](/u \"t\") ![alt **x**](i.png)");
        let TokenKind::Link {
            url,
            title,
            children,
        } = &tokens[0].kind
        else {
            panic!("expected link: {:?}", tokens);
        };
        assert_eq!(url, "/u");
        assert_eq!(title.as_deref(), Some("t"));
        assert!(matches!(children[1].kind, TokenKind::Emph(_)));
        let TokenKind::Image { url, alt, .. } = &tokens[2].kind else {
            panic!("expected image: {:?}", tokens);
        };
        assert_eq!(url, "i.png");
        assert_eq!(alt, "alt x");
    }

    #[test]
    fn reference_links_resolve_against_definitions() {
        let mut defs = LinkDefs::new();
        defs.insert(
            normalize_link_label("Home"),
            LinkDefinition {
                url: "https://home.example".to_string(),
                title: None,
            },
        );
        let options = MarkupOptions::default();
        for src in ["[go][home]", "[Home][]", "[HOME]"] {
            let tokens = lex_with(src, &options, &defs);
            assert_eq!(tokens.len(), 1, "{src}");
            assert_eq!(tokens[0].raw, src);
            let TokenKind::Link { url, .. } = &tokens[0].kind else {
                panic!("expected link for {src}: {:?}", tokens);
            };
            assert_eq!(url, "https://home.example");
        }
        assert_eq!(lex_with("[missing]", &options, &defs)[0].kind, text("[missing]"));
    }

    #[test]
    fn autolinks_and_literal_urls() {
        let tokens = lex("<https://a.io> <me@b.io> www.c.io.");
        let urls: Vec<&str> = tokens
            .iter()
            .filter_map(|token| match &token.kind {
                TokenKind::Link { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(urls, vec!["https://a.io", "mailto:me@b.io", "http://www.c.io"]);
        assert_eq!(tokens.last().map(|token| token.raw.as_str()), Some("."));
    }

    #[test]
    fn inline_html_is_kept_raw() {
        let tokens = lex("a <b class=\"x\">c</b> <!-- d -->");
        let html: Vec<&str> = tokens
            .iter()
            .filter_map(|token| match &token.kind {
                TokenKind::HtmlSpan(raw) => Some(raw.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(html, vec!["<b class=\"x\">", "</b>", "<!-- d -->"]);
    }

    #[test]
    fn line_breaks() {
        assert_eq!(
            kinds("a  \nb\\\nc\nd"),
            vec![
                text("a"),
                TokenKind::HardBreak,
                text("b"),
                TokenKind::HardBreak,
                text("c"),
                TokenKind::SoftBreak,
                text("d"),
            ]
        );
        let options = MarkupOptions {
            breaks: true,
            ..MarkupOptions::default()
        };
        let tokens = lex_with("a\nb", &options, &LinkDefs::new());
        assert_eq!(tokens[1].kind, TokenKind::HardBreak);
    }
}
