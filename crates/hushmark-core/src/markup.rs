use once_cell::sync::Lazy;

use crate::block::parse_document;
use crate::emit::{emit_blocks, render_inlines};
use crate::error::PolicyError;
use crate::inline::tokenize_inline;
use crate::options::MarkupOptions;
use crate::policy::SanitizePolicy;
use crate::sanitize::Sanitizer;

static MARKUP: Lazy<Markup> = Lazy::new(Markup::default);

/// A configured pipeline. Every rendering entry point sanitizes its output.
pub struct Markup {
    options: MarkupOptions,
    sanitizer: Sanitizer,
}

impl Markup {
    pub fn new(options: MarkupOptions, policy: &SanitizePolicy) -> Result<Self, PolicyError> {
        Ok(Self {
            options,
            sanitizer: Sanitizer::new(policy)?,
        })
    }

    pub fn options(&self) -> &MarkupOptions {
        &self.options
    }

    /// Renders block and inline markup.
    pub fn parse(&self, text: &str) -> String {
        let document = parse_document(text, &self.options);
        self.sanitizer.clean(&emit_blocks(&document.blocks))
    }

    /// Renders inline markup only; the result has no block wrapper.
    pub fn parse_inline(&self, text: &str) -> String {
        let tokens = tokenize_inline(text, &self.options);
        self.sanitizer.clean(&render_inlines(&tokens))
    }

    pub fn sanitize(&self, html: &str) -> String {
        self.sanitizer.clean(html)
    }
}

impl Default for Markup {
    fn default() -> Self {
        Self {
            options: MarkupOptions::default(),
            sanitizer: Sanitizer::default(),
        }
    }
}

/// [`Markup::parse`] with default options and policy.
pub fn md_parse(text: &str) -> String {
    MARKUP.parse(text)
}

/// [`Markup::parse_inline`] with default options and policy.
pub fn md_parse_inline(text: &str) -> String {
    MARKUP.parse_inline(text)
}

pub fn sanitize(html: &str) -> String {
    MARKUP.sanitize(html)
}
