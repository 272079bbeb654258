/// Grammar switches shared by both entry points.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarkupOptions {
    /// Tables, `~~strikethrough~~` and bare `https://` links.
    pub gfm: bool,
    /// Render every single newline inside a paragraph as `<br>`.
    pub breaks: bool,
    /// Deepest level of nested inline spans; anything deeper stays literal text.
    pub max_nesting: usize,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            breaks: false,
            max_nesting: 32,
        }
    }
}
