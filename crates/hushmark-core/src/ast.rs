use crate::span::Span;

pub type TokenSeq = Vec<Token>;

/// One inline construct produced by the lexer.
///
/// `raw` is the exact text consumed at the match position and is never
/// empty. `span` locates `raw` inside the text handed to the lexer.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub span: Span,
    pub raw: String,
    pub kind: TokenKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Text(String),
    CodeSpan(String),
    Strong(TokenSeq),
    Emph(TokenSeq),
    Strikethrough(TokenSeq),
    Spoiler(TokenSeq),
    Underline(TokenSeq),
    Link {
        url: String,
        title: Option<String>,
        children: TokenSeq,
    },
    Image {
        url: String,
        title: Option<String>,
        alt: String,
    },
    HtmlSpan(String),
    SoftBreak,
    HardBreak,
}

impl TokenKind {
    /// Tokens nested strictly between this token's delimiters.
    pub fn children(&self) -> &[Token] {
        match self {
            TokenKind::Strong(children)
            | TokenKind::Emph(children)
            | TokenKind::Strikethrough(children)
            | TokenKind::Spoiler(children)
            | TokenKind::Underline(children)
            | TokenKind::Link { children, .. } => children,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub span: Span,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub kind: BlockKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    Paragraph { content: TokenSeq },
    Heading { level: u8, content: TokenSeq },
    CodeBlock { lang: Option<String>, text: String },
    BlockQuote { blocks: Vec<Block> },
    List(List),
    ThematicBreak,
    HtmlBlock { raw: String },
    Table(Table),
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub start: Option<u64>,
    pub tight: bool,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    pub span: Span,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub headers: Vec<TokenSeq>,
    pub rows: Vec<Vec<TokenSeq>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkDefinition {
    pub url: String,
    pub title: Option<String>,
}
