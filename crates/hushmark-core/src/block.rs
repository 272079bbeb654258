//! Line-based block grammar.
//!
//! Source text is normalized first (LF newlines, tabs expanded to four
//! column stops, NUL replaced), then split into lines. Block spans are byte
//! offsets into that normalized text. Leaf text is handed to the inline
//! lexer, so inline spans are relative to each leaf's own buffer.

use crate::ast::{Block, BlockKind, Document, LinkDefinition, List, ListItem, Table, TokenSeq};
use crate::inline::{InlineLexer, LinkDefs, Rule};
use crate::label::{normalize_link_label, unescape_and_decode};
use crate::options::MarkupOptions;
use crate::span::Span;

/// Parses `source` into a block tree. Link reference definitions are
/// collected in a first pass so references may precede them.
pub fn parse_document(source: &str, options: &MarkupOptions) -> Document {
    let source = normalize_source(source, true);
    let mut prepass = Parser::new(&source, options);
    let _ = prepass.parse_document_with_mode(false);
    let mut parser = Parser::new(&source, options);
    parser.link_defs = prepass.link_defs;
    parser.parse_document_with_mode(true)
}

/// Rewrites CR and CRLF as LF and NUL as U+FFFD; with `expand_tabs`, tabs
/// become spaces up to the next multiple-of-four column.
pub(crate) fn normalize_source(source: &str, expand_tabs: bool) -> String {
    let mut out = String::with_capacity(source.len());
    let mut col = 0usize;
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                col = 0;
            }
            '\n' => {
                out.push('\n');
                col = 0;
            }
            '\t' if expand_tabs => {
                let width = 4 - col % 4;
                out.extend(std::iter::repeat_n(' ', width));
                col += width;
            }
            '\0' => {
                out.push('\u{FFFD}');
                col += 1;
            }
            _ => {
                out.push(ch);
                col += 1;
            }
        }
    }
    out
}

struct Parser<'a> {
    source: &'a str,
    options: &'a MarkupOptions,
    link_defs: LinkDefs,
    depth: usize,
}

#[derive(Clone, Debug)]
struct Line {
    text: String,
    start: usize,
    end: usize,
    lazy_continuation: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, options: &'a MarkupOptions) -> Self {
        Self {
            source,
            options,
            link_defs: LinkDefs::new(),
            depth: 0,
        }
    }

    fn parse_document_with_mode(&mut self, parse_inlines: bool) -> Document {
        let span = Span {
            start: 0,
            end: self.source.len(),
        };
        let lines = split_lines(self.source);
        let blocks = self.parse_blocks(&lines, parse_inlines);
        Document { span, blocks }
    }

    fn parse_blocks(&mut self, lines: &[Line], parse_inlines: bool) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if is_blank(&lines[i].text) {
                i += 1;
                continue;
            }

            if let Some((block, next)) = self.parse_code_block(lines, i) {
                blocks.push(block);
                i = next;
                continue;
            }

            if let Some((block, next)) = self.parse_indented_code_block(lines, i) {
                blocks.push(block);
                i = next;
                continue;
            }

            if let Some((block, next)) = self.parse_html_block(lines, i) {
                blocks.push(block);
                i = next;
                continue;
            }

            if let Some((block, next)) = self.parse_thematic_break(lines, i) {
                blocks.push(block);
                i = next;
                continue;
            }

            if let Some((block, next)) = self.parse_block_quote(lines, i, parse_inlines) {
                blocks.push(block);
                i = next;
                continue;
            }

            if let Some((block, next)) = self.parse_list(lines, i, parse_inlines) {
                blocks.push(block);
                i = next;
                continue;
            }

            if let Some((block, next)) = self.parse_table(lines, i, parse_inlines) {
                blocks.push(block);
                i = next;
                continue;
            }

            if let Some((block, next)) = self.parse_heading(lines, i, parse_inlines) {
                blocks.push(block);
                i = next;
                continue;
            }

            let (block, next) = self.parse_paragraph(lines, i, parse_inlines);
            if let Some(block) = block {
                blocks.push(block);
            }
            i = next;
        }

        blocks
    }

    fn parse_heading(
        &self,
        lines: &[Line],
        start: usize,
        parse_inlines: bool,
    ) -> Option<(Block, usize)> {
        let line = &lines[start];
        let (level, content_start, content_end) = parse_atx_heading(&line.text)?;
        let content = self.parse_inline(&line.text[content_start..content_end], parse_inlines);
        Some((
            Block {
                span: Span {
                    start: line.start,
                    end: line.end,
                },
                kind: BlockKind::Heading { level, content },
            },
            start + 1,
        ))
    }

    fn parse_table(
        &self,
        lines: &[Line],
        start: usize,
        parse_inlines: bool,
    ) -> Option<(Block, usize)> {
        if !self.options.gfm {
            return None;
        }
        let header = &lines[start];
        let separator = lines.get(start + 1)?;
        strip_indent_up_to(&header.text, 3)?;
        if !header.text.contains('|') {
            return None;
        }
        let columns = parse_table_separator(&separator.text)?;
        let header_cells = split_table_cells(&header.text);
        if header_cells.len() != columns {
            return None;
        }
        let headers = header_cells
            .iter()
            .map(|cell| self.parse_inline(cell, parse_inlines))
            .collect();

        let mut rows = Vec::new();
        let mut i = start + 2;
        while i < lines.len() {
            let line = &lines[i];
            if is_blank(&line.text) || self.is_block_start(line) {
                break;
            }
            let mut cells = split_table_cells(&line.text);
            cells.resize(columns, String::new());
            rows.push(
                cells
                    .iter()
                    .map(|cell| self.parse_inline(cell, parse_inlines))
                    .collect(),
            );
            i += 1;
        }

        Some((
            Block {
                span: Span {
                    start: header.start,
                    end: lines[i - 1].end,
                },
                kind: BlockKind::Table(Table { headers, rows }),
            },
            i,
        ))
    }

    fn parse_thematic_break(&self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        let line = &lines[start];
        if !is_thematic_break_line(&line.text) {
            return None;
        }
        Some((
            Block {
                span: Span {
                    start: line.start,
                    end: line.end,
                },
                kind: BlockKind::ThematicBreak,
            },
            start + 1,
        ))
    }

    fn parse_paragraph(
        &mut self,
        lines: &[Line],
        start: usize,
        parse_inlines: bool,
    ) -> (Option<Block>, usize) {
        let mut i = start;
        let mut content_lines: Vec<&Line> = Vec::new();
        let mut setext: Option<(u8, usize)> = None;

        while i < lines.len() {
            let line = &lines[i];
            if is_blank(&line.text) {
                break;
            }
            if !content_lines.is_empty() && !self.line_can_continue_paragraph(line) {
                break;
            }
            if content_lines.is_empty()
                && let Some((label, definition)) = parse_link_definition(&line.text)
            {
                self.link_defs.entry(label).or_insert(definition);
                i += 1;
                continue;
            }
            content_lines.push(line);
            if let Some(next) = lines.get(i + 1)
                && !next.lazy_continuation
                && let Some(level) = setext_underline_level(&next.text)
            {
                setext = Some((level, i + 1));
                break;
            }
            i += 1;
        }

        let (Some(first), Some(last)) = (content_lines.first(), content_lines.last()) else {
            return (None, i);
        };
        let buffer = content_lines
            .iter()
            .map(|line| line.text.trim_start())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some((level, underline)) = setext {
            let content = self.parse_inline(buffer.trim(), parse_inlines);
            let block = Block {
                span: Span {
                    start: first.start,
                    end: lines[underline].end,
                },
                kind: BlockKind::Heading { level, content },
            };
            return (Some(block), underline + 1);
        }

        let content = self.parse_inline(buffer.trim_end(), parse_inlines);
        let block = Block {
            span: Span {
                start: first.start,
                end: last.end,
            },
            kind: BlockKind::Paragraph { content },
        };
        (Some(block), i)
    }

    fn parse_code_block(&self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        let line = &lines[start];
        let (indent, fence_len, fence_char, info) = parse_fence_open(&line.text)?;
        let lang = info.split_whitespace().next().map(str::to_string);
        let mut body = Vec::new();
        let mut end = line.end;
        let mut i = start + 1;
        while i < lines.len() {
            let current = &lines[i];
            end = current.end;
            i += 1;
            if is_fence_close(&current.text, fence_len, fence_char) {
                break;
            }
            body.push(strip_leading_spaces(&current.text, indent));
        }
        Some((
            Block {
                span: Span {
                    start: line.start,
                    end,
                },
                kind: BlockKind::CodeBlock {
                    lang,
                    text: body.join("\n"),
                },
            },
            i,
        ))
    }

    fn parse_indented_code_block(&self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        let line = &lines[start];
        if is_blank(&line.text) || leading_spaces(&line.text) < 4 {
            return None;
        }
        let mut body = Vec::new();
        let mut last = start;
        let mut i = start;
        while i < lines.len() {
            let text = &lines[i].text;
            if is_blank(text) {
                body.push(strip_leading_spaces(text, 4));
                i += 1;
                continue;
            }
            if leading_spaces(text) < 4 {
                break;
            }
            body.push(&text[4..]);
            last = i;
            i += 1;
        }
        body.truncate(last - start + 1);
        Some((
            Block {
                span: Span {
                    start: line.start,
                    end: lines[last].end,
                },
                kind: BlockKind::CodeBlock {
                    lang: None,
                    text: body.join("\n"),
                },
            },
            last + 1,
        ))
    }

    fn parse_html_block(&self, lines: &[Line], start: usize) -> Option<(Block, usize)> {
        let kind = match_html_block_start(&lines[start].text)?;
        let mut raw = Vec::new();
        let mut i = start;
        while i < lines.len() {
            let text = &lines[i].text;
            if matches!(kind, HtmlBlockKind::Block) && is_blank(text) {
                break;
            }
            raw.push(text.as_str());
            i += 1;
            if html_block_ends(kind, text) {
                break;
            }
        }
        Some((
            Block {
                span: Span {
                    start: lines[start].start,
                    end: lines[i - 1].end,
                },
                kind: BlockKind::HtmlBlock {
                    raw: raw.join("\n"),
                },
            },
            i,
        ))
    }

    fn parse_block_quote(
        &mut self,
        lines: &[Line],
        start: usize,
        parse_inlines: bool,
    ) -> Option<(Block, usize)> {
        if self.depth >= self.options.max_nesting {
            return None;
        }
        blockquote_prefix_len(&lines[start].text)?;
        let mut i = start;
        let mut quote_lines = Vec::new();
        let mut can_lazy = false;
        while i < lines.len() {
            let candidate = &lines[i];
            if let Some(prefix) = blockquote_prefix_len(&candidate.text) {
                let line = Line {
                    text: candidate.text[prefix..].to_string(),
                    start: candidate.start + prefix,
                    end: candidate.end,
                    lazy_continuation: false,
                };
                can_lazy = self.line_can_continue_paragraph(&line)
                    || line.text.trim_start().starts_with('>');
                quote_lines.push(line);
                i += 1;
                continue;
            }
            // List markers never continue quoted text lazily.
            if is_blank(&candidate.text)
                || !can_lazy
                || parse_list_marker(&candidate.text).is_some()
                || !self.line_can_continue_paragraph(candidate)
            {
                break;
            }
            quote_lines.push(Line {
                lazy_continuation: true,
                ..candidate.clone()
            });
            i += 1;
        }
        self.depth += 1;
        let blocks = self.parse_blocks(&quote_lines, parse_inlines);
        self.depth -= 1;
        Some((
            Block {
                span: Span {
                    start: lines[start].start,
                    end: lines[i - 1].end,
                },
                kind: BlockKind::BlockQuote { blocks },
            },
            i,
        ))
    }

    fn parse_list(
        &mut self,
        lines: &[Line],
        start: usize,
        parse_inlines: bool,
    ) -> Option<(Block, usize)> {
        if self.depth >= self.options.max_nesting {
            return None;
        }
        let marker = parse_list_marker(&lines[start].text)?;
        let mut i = start;
        let mut items = Vec::new();
        let mut loose = false;
        let mut blank_before_next = false;
        let mut list_end = lines[start].end;

        while i < lines.len() {
            let current = &lines[i];
            if i > start && is_thematic_break_line(&current.text) {
                break;
            }
            let Some(current_marker) = parse_list_marker(&current.text) else {
                break;
            };
            if current_marker.ordered != marker.ordered || current_marker.marker != marker.marker {
                break;
            }
            if blank_before_next {
                loose = true;
            }
            let indent = current_marker.content_indent;
            let first = Line {
                text: current.text.get(indent..).unwrap_or_default().to_string(),
                start: current.start + indent.min(current.text.len()),
                end: current.end,
                lazy_continuation: false,
            };
            let starts_blank = is_blank(&first.text);
            let mut can_lazy = self.line_can_continue_paragraph(&first);
            let mut item_lines = vec![first];
            let mut pending_blank: Vec<Line> = Vec::new();
            let mut last = i;
            let mut j = i + 1;
            while j < lines.len() {
                let next = &lines[j];
                if is_blank(&next.text) {
                    // An item may start with at most one blank line.
                    if starts_blank && j == i + 1 {
                        break;
                    }
                    pending_blank.push(Line {
                        text: String::new(),
                        ..next.clone()
                    });
                    can_lazy = false;
                    j += 1;
                    continue;
                }
                if leading_spaces(&next.text) >= indent {
                    item_lines.append(&mut pending_blank);
                    let line = Line {
                        text: next.text[indent..].to_string(),
                        start: next.start + indent,
                        end: next.end,
                        lazy_continuation: false,
                    };
                    can_lazy = self.line_can_continue_paragraph(&line);
                    item_lines.push(line);
                    last = j;
                    j += 1;
                    continue;
                }
                // A sibling marker starts the next item, even where the same
                // marker could not interrupt a paragraph.
                if let Some(next_marker) = parse_list_marker(&next.text)
                    && next_marker.ordered == marker.ordered
                    && next_marker.marker == marker.marker
                {
                    break;
                }
                if pending_blank.is_empty() && can_lazy && self.line_can_continue_paragraph(next) {
                    item_lines.push(Line {
                        lazy_continuation: true,
                        ..next.clone()
                    });
                    last = j;
                    j += 1;
                    continue;
                }
                break;
            }
            blank_before_next = !pending_blank.is_empty();

            self.depth += 1;
            let blocks = self.parse_blocks(&item_lines, parse_inlines);
            self.depth -= 1;
            if blank_between_blocks(&item_lines, &blocks) {
                loose = true;
            }
            let span = Span {
                start: current.start,
                end: lines[last].end,
            };
            items.push(ListItem { span, blocks });
            list_end = span.end;
            i = j;
        }

        Some((
            Block {
                span: Span {
                    start: lines[start].start,
                    end: list_end,
                },
                kind: BlockKind::List(List {
                    ordered: marker.ordered,
                    start: marker.start,
                    tight: !loose,
                    items,
                }),
            },
            i,
        ))
    }

    fn is_block_start(&self, line: &Line) -> bool {
        let text = &line.text;
        parse_fence_open(text).is_some()
            || match_html_block_start(text).is_some()
            || blockquote_prefix_len(text).is_some()
            || is_thematic_break_line(text)
            || parse_list_marker(text).is_some()
            || parse_atx_heading(text).is_some()
    }

    fn line_can_continue_paragraph(&self, line: &Line) -> bool {
        if is_blank(&line.text) || setext_underline_level(&line.text).is_some() {
            return false;
        }
        if let Some(marker) = parse_list_marker(&line.text) {
            return marker.empty || (marker.ordered && marker.start != Some(1));
        }
        !self.is_block_start(line)
    }

    fn parse_inline(&self, text: &str, parse_inlines: bool) -> TokenSeq {
        if !parse_inlines || text.is_empty() {
            return Vec::new();
        }
        InlineLexer::new(Rule::DEFAULT_SET, self.options, &self.link_defs).tokenize(text, 0)
    }
}

fn split_lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            lines.push(Line {
                text: source[start..idx].to_string(),
                start,
                end: idx,
                lazy_continuation: false,
            });
            start = idx + 1;
        }
    }
    if start < source.len() {
        lines.push(Line {
            text: source[start..].to_string(),
            start,
            end: source.len(),
            lazy_continuation: false,
        });
    }
    lines
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn leading_spaces(text: &str) -> usize {
    text.bytes().take_while(|b| *b == b' ').count()
}

fn strip_indent_up_to(text: &str, max_cols: usize) -> Option<&str> {
    let spaces = leading_spaces(text);
    (spaces <= max_cols).then(|| &text[spaces..])
}

fn strip_leading_spaces(text: &str, max: usize) -> &str {
    &text[leading_spaces(text).min(max)..]
}

/// Whether any blank line sits directly between two sibling blocks.
fn blank_between_blocks(lines: &[Line], blocks: &[Block]) -> bool {
    blocks.windows(2).any(|pair| {
        lines.iter().any(|line| {
            is_blank(&line.text) && line.start > pair[0].span.end && line.start < pair[1].span.start
        })
    })
}

fn parse_fence_open(text: &str) -> Option<(usize, usize, u8, String)> {
    let rest = strip_indent_up_to(text, 3)?;
    let indent = text.len() - rest.len();
    let fence_char = if rest.starts_with("```") {
        b'`'
    } else if rest.starts_with("~~~") {
        b'~'
    } else {
        return None;
    };
    let fence_len = rest.bytes().take_while(|b| *b == fence_char).count();
    let info = rest[fence_len..].trim();
    if fence_char == b'`' && info.contains('`') {
        return None;
    }
    Some((indent, fence_len, fence_char, unescape_and_decode(info)))
}

fn is_fence_close(text: &str, fence_len: usize, fence_char: u8) -> bool {
    let Some(rest) = strip_indent_up_to(text, 3) else {
        return false;
    };
    let count = rest.bytes().take_while(|b| *b == fence_char).count();
    count >= fence_len && rest[count..].trim().is_empty()
}

fn setext_underline_level(text: &str) -> Option<u8> {
    let trimmed = strip_indent_up_to(text, 3)?.trim_end();
    let ch = *trimmed.as_bytes().first()?;
    if ch != b'=' && ch != b'-' {
        return None;
    }
    if !trimmed.bytes().all(|b| b == ch) {
        return None;
    }
    Some(if ch == b'=' { 1 } else { 2 })
}

/// Returns the level and the content range of an ATX heading line.
fn parse_atx_heading(text: &str) -> Option<(u8, usize, usize)> {
    let trimmed = strip_indent_up_to(text, 3)?;
    let indent_len = text.len() - trimmed.len();
    let bytes = trimmed.as_bytes();
    let level = bytes.iter().take_while(|b| **b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    if level < bytes.len() && bytes[level] != b' ' {
        return None;
    }
    let mut content_start = level;
    while content_start < bytes.len() && bytes[content_start] == b' ' {
        content_start += 1;
    }
    let mut content_end = bytes.len();
    while content_end > content_start && bytes[content_end - 1] == b' ' {
        content_end -= 1;
    }
    // Optional closing sequence of `#`, preceded by a space.
    let mut hash_start = content_end;
    while hash_start > content_start && bytes[hash_start - 1] == b'#' {
        hash_start -= 1;
    }
    if hash_start < content_end && (hash_start == content_start || bytes[hash_start - 1] == b' ') {
        content_end = hash_start;
        while content_end > content_start && bytes[content_end - 1] == b' ' {
            content_end -= 1;
        }
    }
    Some((
        level as u8,
        indent_len + content_start,
        indent_len + content_end,
    ))
}

fn is_thematic_break_line(text: &str) -> bool {
    let Some(trimmed) = strip_indent_up_to(text, 3) else {
        return false;
    };
    let mut marker: Option<u8> = None;
    let mut count = 0;
    for b in trimmed.bytes() {
        if b == b' ' {
            continue;
        }
        match marker {
            None if matches!(b, b'-' | b'*' | b'_') => marker = Some(b),
            Some(m) if m == b => {}
            _ => return false,
        }
        count += 1;
    }
    count >= 3
}

fn blockquote_prefix_len(text: &str) -> Option<usize> {
    let rest = strip_indent_up_to(text, 3)?;
    let after = rest.strip_prefix('>')?;
    let indent = text.len() - rest.len();
    Some(indent + 1 + usize::from(after.starts_with(' ')))
}

#[derive(Clone, Copy, Debug)]
struct ListMarker {
    ordered: bool,
    marker: u8,
    start: Option<u64>,
    content_indent: usize,
    empty: bool,
}

fn parse_list_marker(text: &str) -> Option<ListMarker> {
    let rest = strip_indent_up_to(text, 3)?;
    let bytes = text.as_bytes();
    let mut idx = text.len() - rest.len();
    let (ordered, marker, start) = match *bytes.get(idx)? {
        b @ (b'-' | b'+' | b'*') => {
            idx += 1;
            (false, b, None)
        }
        b'0'..=b'9' => {
            let digits = bytes[idx..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 {
                return None;
            }
            let number: u64 = text[idx..idx + digits].parse().ok()?;
            idx += digits;
            let delimiter = *bytes.get(idx)?;
            if delimiter != b'.' && delimiter != b')' {
                return None;
            }
            idx += 1;
            (true, delimiter, Some(number))
        }
        _ => return None,
    };
    let spaces = leading_spaces(&text[idx..]);
    let empty = idx + spaces >= text.len();
    if spaces == 0 && !empty {
        return None;
    }
    let content_indent = if empty || spaces > 4 {
        idx + 1
    } else {
        idx + spaces
    };
    Some(ListMarker {
        ordered,
        marker,
        start,
        content_indent,
        empty,
    })
}

#[derive(Clone, Copy, Debug)]
enum HtmlBlockKind {
    /// `script`, `style`, `pre` or `textarea`; ends at the matching close tag.
    Raw(&'static str),
    Comment,
    /// A block-level tag; ends at the next blank line.
    Block,
}

const RAW_TAGS: &[&str] = &["script", "style", "pre", "textarea"];

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "base",
    "basefont",
    "blockquote",
    "body",
    "caption",
    "center",
    "col",
    "colgroup",
    "dd",
    "details",
    "dialog",
    "dir",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "frame",
    "frameset",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "header",
    "hr",
    "html",
    "iframe",
    "legend",
    "li",
    "link",
    "main",
    "menu",
    "menuitem",
    "nav",
    "noframes",
    "ol",
    "optgroup",
    "option",
    "p",
    "param",
    "search",
    "section",
    "summary",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "title",
    "tr",
    "track",
    "ul",
];

fn match_html_block_start(text: &str) -> Option<HtmlBlockKind> {
    let rest = strip_indent_up_to(text, 3)?;
    if rest.starts_with("<!--") {
        return Some(HtmlBlockKind::Comment);
    }
    let after = rest.strip_prefix('<')?;
    let (closing, name_src) = match after.strip_prefix('/') {
        Some(name) => (true, name),
        None => (false, after),
    };
    let name_len = name_src
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if name_len == 0 {
        return None;
    }
    let name = name_src[..name_len].to_ascii_lowercase();
    let tail = &name_src[name_len..];
    let boundary = tail.is_empty() || tail.starts_with([' ', '>']) || tail.starts_with("/>");
    if !boundary {
        return None;
    }
    if !closing && let Some(raw) = RAW_TAGS.iter().find(|tag| **tag == name) {
        return Some(HtmlBlockKind::Raw(*raw));
    }
    BLOCK_TAGS
        .contains(&name.as_str())
        .then_some(HtmlBlockKind::Block)
}

fn html_block_ends(kind: HtmlBlockKind, line: &str) -> bool {
    match kind {
        HtmlBlockKind::Raw(tag) => line.to_ascii_lowercase().contains(&format!("</{tag}>")),
        HtmlBlockKind::Comment => line.contains("-->"),
        HtmlBlockKind::Block => false,
    }
}

/// Number of columns in a table delimiter row such as `| :-- | --: |`.
fn parse_table_separator(text: &str) -> Option<usize> {
    let trimmed = strip_indent_up_to(text, 3)?.trim();
    if !trimmed.contains('-') {
        return None;
    }
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    let mut columns = 0;
    for cell in inner.split('|') {
        let cell = cell.trim();
        let dashes = cell.strip_prefix(':').unwrap_or(cell);
        let dashes = dashes.strip_suffix(':').unwrap_or(dashes);
        if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
            return None;
        }
        columns += 1;
    }
    Some(columns)
}

fn split_table_cells(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(ch),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

/// Single-line `[label]: destination "title"` definition.
fn parse_link_definition(text: &str) -> Option<(String, LinkDefinition)> {
    let rest = strip_indent_up_to(text, 3)?.strip_prefix('[')?;
    let bytes = rest.as_bytes();
    let mut close = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'[' => return None,
            b']' => {
                close = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }
    let close = close?;
    let label = &rest[..close];
    if label.trim().is_empty() {
        return None;
    }
    let after = rest[close + 1..].strip_prefix(':')?.trim_start();
    let (destination, remainder) = if let Some(inner) = after.strip_prefix('<') {
        let end = inner.find('>')?;
        (&inner[..end], &inner[end + 1..])
    } else {
        let end = after
            .find(|ch: char| ch.is_ascii_whitespace())
            .unwrap_or(after.len());
        if end == 0 {
            return None;
        }
        (&after[..end], &after[end..])
    };
    let title = parse_definition_title(remainder)?;
    Some((
        normalize_link_label(label),
        LinkDefinition {
            url: unescape_and_decode(destination),
            title,
        },
    ))
}

/// `Some(None)` when nothing follows the destination, `None` when the
/// remainder is not a well-formed title.
fn parse_definition_title(remainder: &str) -> Option<Option<String>> {
    let trimmed = remainder.trim();
    if trimmed.is_empty() {
        return Some(None);
    }
    if !remainder.starts_with(' ') || trimmed.len() < 2 {
        return None;
    }
    let close = match trimmed.as_bytes()[0] {
        b'"' => '"',
        b'\'' => '\'',
        b'(' => ')',
        _ => return None,
    };
    let inner = trimmed[1..].strip_suffix(close)?;
    Some(Some(unescape_and_decode(inner)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TokenKind;
    use crate::inline::plain_text;

    fn parse(src: &str) -> Vec<Block> {
        parse_document(src, &MarkupOptions::default()).blocks
    }

    fn text_of(tokens: &TokenSeq) -> String {
        plain_text(tokens)
    }

    #[test]
    fn normalizes_newlines_tabs_and_nul() {
        assert_eq!(normalize_source("a\r\nb\rc", true), "a\nb\nc");
        assert_eq!(normalize_source("ab\tc", true), "ab  c");
        assert_eq!(normalize_source("\tx", false), "\tx");
        assert_eq!(normalize_source("a\0", true), "a\u{FFFD}");
    }

    #[test]
    fn atx_and_setext_headings() {
        let blocks = parse("# One #\nTwo\n---\nThree\n===");
        let levels: Vec<(u8, String)> = blocks
            .iter()
            .filter_map(|block| match &block.kind {
                BlockKind::Heading { level, content } => Some((*level, text_of(content))),
                _ => None,
            })
            .collect();
        assert_eq!(
            levels,
            vec![
                (1, "One".to_string()),
                (2, "Two".to_string()),
                (1, "Three".to_string())
            ]
        );
    }

    #[test]
    fn paragraphs_keep_soft_breaks() {
        let blocks = parse("a\n  b\n\nc");
        assert_eq!(blocks.len(), 2);
        let BlockKind::Paragraph { content } = &blocks[0].kind else {
            panic!("expected paragraph: {:?}", blocks);
        };
        assert_eq!(content[1].kind, TokenKind::SoftBreak);
        assert_eq!(text_of(content), "a b");
    }

    #[test]
    fn fenced_and_indented_code() {
        let blocks = parse("```rust extra\nfn main() {}\n\n  x\n```\n\n    indented\n\n    more\n");
        assert_eq!(
            blocks[0].kind,
            BlockKind::CodeBlock {
                lang: Some("rust".to_string()),
                text: "fn main() {}\n\n  x".to_string(),
            }
        );
        assert_eq!(
            blocks[1].kind,
            BlockKind::CodeBlock {
                lang: None,
                text: "indented\n\nmore".to_string(),
            }
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn block_quotes_take_lazy_lines() {
        let blocks = parse("> a\nb\n> > c\n\nd");
        let BlockKind::BlockQuote { blocks: inner } = &blocks[0].kind else {
            panic!("expected quote: {:?}", blocks);
        };
        let BlockKind::Paragraph { content } = &inner[0].kind else {
            panic!("expected paragraph: {:?}", inner);
        };
        assert_eq!(text_of(content), "a b");
        assert!(matches!(inner[1].kind, BlockKind::BlockQuote { .. }));
        assert!(matches!(blocks[1].kind, BlockKind::Paragraph { .. }));
    }

    #[test]
    fn tight_and_loose_lists() {
        let blocks = parse("- a\n- b\n\n3. x\n\n4. y\n");
        let BlockKind::List(tight) = &blocks[0].kind else {
            panic!("expected list: {:?}", blocks);
        };
        assert!(!tight.ordered && tight.tight);
        assert_eq!(tight.items.len(), 2);
        let BlockKind::List(loose) = &blocks[1].kind else {
            panic!("expected list: {:?}", blocks);
        };
        assert!(loose.ordered && !loose.tight);
        assert_eq!(loose.start, Some(3));
        assert_eq!(loose.items.len(), 2);
    }

    #[test]
    fn ordered_siblings_start_new_items() {
        for (src, start) in [("1. a\n2. b", 1), ("2. a\n3. b", 2), ("1) a\n2) b", 1)] {
            let blocks = parse(src);
            assert_eq!(blocks.len(), 1, "{src}");
            let BlockKind::List(list) = &blocks[0].kind else {
                panic!("expected list: {:?}", blocks);
            };
            assert!(list.ordered && list.tight, "{src}");
            assert_eq!(list.start, Some(start), "{src}");
            assert_eq!(list.items.len(), 2, "{src}");
            let texts: Vec<String> = list
                .items
                .iter()
                .map(|item| match &item.blocks[..] {
                    [Block {
                        kind: BlockKind::Paragraph { content },
                        ..
                    }] => text_of(content),
                    other => panic!("expected one paragraph: {:?}", other),
                })
                .collect();
            assert_eq!(texts, vec!["a".to_string(), "b".to_string()], "{src}");
        }
    }

    #[test]
    fn ordered_siblings_inside_quotes() {
        let blocks = parse("> 1. a\n> 2. b");
        let BlockKind::BlockQuote { blocks: inner } = &blocks[0].kind else {
            panic!("expected quote: {:?}", blocks);
        };
        let BlockKind::List(list) = &inner[0].kind else {
            panic!("expected list: {:?}", inner);
        };
        assert_eq!(list.items.len(), 2);

        let blocks = parse("> 1. a\n2. b");
        assert_eq!(blocks.len(), 2);
        let BlockKind::List(outside) = &blocks[1].kind else {
            panic!("expected list after quote: {:?}", blocks);
        };
        assert_eq!(outside.start, Some(2));
    }

    #[test]
    fn ordered_marker_without_one_continues_a_paragraph() {
        let blocks = parse("text\n2. more");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0].kind, BlockKind::Paragraph { .. }));
    }

    #[test]
    fn nested_lists_stay_inside_items() {
        let blocks = parse("- a\n  - b\n- c");
        let BlockKind::List(list) = &blocks[0].kind else {
            panic!("expected list: {:?}", blocks);
        };
        assert_eq!(list.items.len(), 2);
        assert!(list.tight);
        assert!(matches!(list.items[0].blocks[1].kind, BlockKind::List(_)));
    }

    #[test]
    fn thematic_break_wins_over_list_marker() {
        let blocks = parse("* * *\n- a\n***");
        assert_eq!(blocks[0].kind, BlockKind::ThematicBreak);
        assert!(matches!(blocks[1].kind, BlockKind::List(_)));
        assert_eq!(blocks[2].kind, BlockKind::ThematicBreak);
    }

    #[test]
    fn tables_need_a_matching_separator() {
        let blocks = parse("| a | b |\n| --- | :-: |\n| 1 | 2 \\| 3 |\n| 4 |\n\na | b\n--- | --- | ---");
        let BlockKind::Table(table) = &blocks[0].kind else {
            panic!("expected table: {:?}", blocks);
        };
        assert_eq!(table.headers.len(), 2);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(text_of(&table.rows[0][1]), "2 | 3");
        assert!(table.rows[1][1].is_empty());
        assert!(matches!(blocks[1].kind, BlockKind::Paragraph { .. }));
    }

    #[test]
    fn html_blocks_are_kept_raw() {
        let blocks = parse("<div>\n*a*\n</div>\n\n<script>\nx\n\ny</script>\ntext");
        assert_eq!(
            blocks[0].kind,
            BlockKind::HtmlBlock {
                raw: "<div>\n*a*\n</div>".to_string()
            }
        );
        assert_eq!(
            blocks[1].kind,
            BlockKind::HtmlBlock {
                raw: "<script>\nx\n\ny</script>".to_string()
            }
        );
        assert!(matches!(blocks[2].kind, BlockKind::Paragraph { .. }));
    }

    #[test]
    fn reference_definitions_resolve_forward() {
        let blocks = parse("[site] and [x][site]\n\n[Site]: https://example.com \"Home\"");
        assert_eq!(blocks.len(), 1);
        let BlockKind::Paragraph { content } = &blocks[0].kind else {
            panic!("expected paragraph: {:?}", blocks);
        };
        let links: Vec<(&str, Option<&str>)> = content
            .iter()
            .filter_map(|token| match &token.kind {
                TokenKind::Link { url, title, .. } => Some((url.as_str(), title.as_deref())),
                _ => None,
            })
            .collect();
        assert_eq!(
            links,
            vec![
                ("https://example.com", Some("Home")),
                ("https://example.com", Some("Home"))
            ]
        );
    }

    #[test]
    fn deep_quotes_degrade_past_the_nesting_limit() {
        let options = MarkupOptions {
            max_nesting: 2,
            ..MarkupOptions::default()
        };
        let document = parse_document(">>>> deep", &options);
        let BlockKind::BlockQuote { blocks } = &document.blocks[0].kind else {
            panic!("expected quote: {:?}", document.blocks);
        };
        let BlockKind::BlockQuote { blocks } = &blocks[0].kind else {
            panic!("expected nested quote: {:?}", blocks);
        };
        let BlockKind::Paragraph { content } = &blocks[0].kind else {
            panic!("expected paragraph: {:?}", blocks);
        };
        assert_eq!(text_of(content), ">> deep");
    }

    #[test]
    fn empty_source_has_no_blocks() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n  \n").is_empty());
    }
}
