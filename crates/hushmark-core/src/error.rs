use thiserror::Error;

/// A sanitization policy that the HTML cleaner cannot honor.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PolicyError {
    #[error("tag `{0}` is both allowed and listed for content removal")]
    TagDropsContent(&'static str),
    #[error("tag `{0}` lists `class` as a plain attribute while also restricting its classes")]
    ClassAttributeConflict(&'static str),
    #[error("{table} table names tag `{tag}`, which is not allowed")]
    UnknownTag {
        table: &'static str,
        tag: &'static str,
    },
    #[error("URL scheme list contains an empty or malformed scheme `{0}`")]
    InvalidScheme(&'static str),
}
