use crate::ast::{Block, BlockKind, List, Table, Token, TokenKind};
use crate::inline::{render_spoiler, render_underline};

/// Emits raw, un-sanitized HTML for a block tree. Only the pipeline calls
/// this, and always hands the result to the sanitizer.
pub(crate) fn emit_blocks(blocks: &[Block]) -> String {
    // Deterministic formatting: 2-space indentation and LF newlines.
    let mut writer = HtmlWriter::new();
    for block in blocks {
        emit_block(&mut writer, block, false);
    }
    writer.finish()
}

struct HtmlWriter {
    out: String,
    indent: usize,
}

impl HtmlWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn finish(mut self) -> String {
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out
    }
}

/// `tight` renders paragraphs as bare inline content, as inside the items
/// of a tight list.
fn emit_block(writer: &mut HtmlWriter, block: &Block, tight: bool) {
    match &block.kind {
        BlockKind::Heading { level, content } => {
            writer.line(&format!("<h{level}>{}</h{level}>", render_inlines(content)));
        }
        BlockKind::Paragraph { content } => {
            if tight {
                writer.line(&render_inlines(content));
            } else {
                writer.line(&format!("<p>{}</p>", render_inlines(content)));
            }
        }
        BlockKind::BlockQuote { blocks } => {
            writer.line("<blockquote>");
            writer.indent += 1;
            for child in blocks {
                emit_block(writer, child, false);
            }
            writer.indent -= 1;
            writer.line("</blockquote>");
        }
        BlockKind::List(list) => emit_list(writer, list),
        BlockKind::ThematicBreak => writer.line("<hr>"),
        BlockKind::CodeBlock { lang, text } => {
            let class = lang
                .as_deref()
                .map(|lang| format!(" class=\"language-{}\"", escape_attr(lang)))
                .unwrap_or_default();
            writer.line(&format!(
                "<pre><code{class}>{}\n</code></pre>",
                escape_html(text)
            ));
        }
        BlockKind::HtmlBlock { raw } => writer.line(raw),
        BlockKind::Table(table) => emit_table(writer, table),
    }
}

fn emit_list(writer: &mut HtmlWriter, list: &List) {
    let tag = if list.ordered { "ol" } else { "ul" };
    let start_attr = match list.start {
        Some(start) if list.ordered && start != 1 => format!(" start=\"{start}\""),
        _ => String::new(),
    };
    writer.line(&format!("<{tag}{start_attr}>"));
    writer.indent += 1;
    for item in &list.items {
        match item.blocks.as_slice() {
            [] => writer.line("<li></li>"),
            [Block {
                kind: BlockKind::Paragraph { content },
                ..
            }] if list.tight => {
                writer.line(&format!("<li>{}</li>", render_inlines(content)));
            }
            blocks => {
                writer.line("<li>");
                writer.indent += 1;
                for child in blocks {
                    emit_block(writer, child, list.tight);
                }
                writer.indent -= 1;
                writer.line("</li>");
            }
        }
    }
    writer.indent -= 1;
    writer.line(&format!("</{tag}>"));
}

fn emit_table(writer: &mut HtmlWriter, table: &Table) {
    writer.line("<table>");
    writer.indent += 1;
    writer.line("<thead>");
    writer.indent += 1;
    emit_row(writer, "th", &table.headers);
    writer.indent -= 1;
    writer.line("</thead>");
    if !table.rows.is_empty() {
        writer.line("<tbody>");
        writer.indent += 1;
        for row in &table.rows {
            emit_row(writer, "td", row);
        }
        writer.indent -= 1;
        writer.line("</tbody>");
    }
    writer.indent -= 1;
    writer.line("</table>");
}

fn emit_row(writer: &mut HtmlWriter, cell_tag: &str, cells: &[Vec<Token>]) {
    writer.line("<tr>");
    writer.indent += 1;
    for cell in cells {
        writer.line(&format!("<{cell_tag}>{}</{cell_tag}>", render_inlines(cell)));
    }
    writer.indent -= 1;
    writer.line("</tr>");
}

/// Renders inline tokens to raw HTML.
pub(crate) fn render_inlines(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match &token.kind {
            TokenKind::Text(text) => out.push_str(&escape_html(text)),
            TokenKind::CodeSpan(text) => {
                out.push_str("<code>");
                out.push_str(&escape_html(text));
                out.push_str("</code>");
            }
            TokenKind::Strong(children) => wrap(&mut out, "strong", children),
            TokenKind::Emph(children) => wrap(&mut out, "em", children),
            TokenKind::Strikethrough(children) => wrap(&mut out, "del", children),
            TokenKind::Spoiler(children) => out.push_str(&render_spoiler(&render_inlines(children))),
            TokenKind::Underline(children) => {
                out.push_str(&render_underline(&render_inlines(children)))
            }
            TokenKind::Link {
                url,
                title,
                children,
            } => {
                out.push_str("<a href=\"");
                out.push_str(&escape_url_attr(url));
                out.push('"');
                push_title(&mut out, title.as_deref());
                out.push('>');
                out.push_str(&render_inlines(children));
                out.push_str("</a>");
            }
            TokenKind::Image { url, title, alt } => {
                out.push_str("<img src=\"");
                out.push_str(&escape_url_attr(url));
                out.push_str("\" alt=\"");
                out.push_str(&escape_attr(alt));
                out.push('"');
                push_title(&mut out, title.as_deref());
                out.push('>');
            }
            TokenKind::HtmlSpan(raw) => out.push_str(raw),
            TokenKind::SoftBreak => out.push('\n'),
            TokenKind::HardBreak => out.push_str("<br>"),
        }
    }
    out
}

fn wrap(out: &mut String, tag: &str, children: &[Token]) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&render_inlines(children));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn push_title(out: &mut String, title: Option<&str>) {
    if let Some(title) = title {
        out.push_str(" title=\"");
        out.push_str(&escape_attr(title));
        out.push('"');
    }
}

fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn escape_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

fn escape_url_attr(text: &str) -> String {
    let mut encoded = String::new();
    for &byte in text.as_bytes() {
        match byte {
            b' ' => encoded.push_str("%20"),
            b'\\' => encoded.push_str("%5C"),
            0x00..=0x1F | 0x7F..=0xFF => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
            _ => encoded.push(char::from(byte)),
        }
    }
    escape_attr(&encoded)
}
