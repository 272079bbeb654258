mod ast;
mod block;
mod emit;
mod error;
mod inline;
mod label;
mod markup;
mod options;
mod policy;
mod sanitize;
mod span;

pub use ast::{
    Block, BlockKind, Document, LinkDefinition, List, ListItem, Table, Token, TokenKind, TokenSeq,
};
pub use block::parse_document;
pub use error::PolicyError;
pub use inline::{Rule, tokenize_inline};
pub use markup::{Markup, md_parse, md_parse_inline, sanitize};
pub use options::MarkupOptions;
pub use policy::SanitizePolicy;
pub use sanitize::Sanitizer;
pub use span::Span;
