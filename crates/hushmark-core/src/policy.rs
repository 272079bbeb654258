use std::borrow::Cow;

use crate::error::PolicyError;

/// Allow-list of what survives sanitization.
///
/// Tables are `&'static` so a policy can be a `const` and copied freely into
/// the cleaner's callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SanitizePolicy {
    pub tags: &'static [&'static str],
    /// Attributes allowed per tag. No attribute is allowed on every tag.
    pub tag_attributes: &'static [(&'static str, &'static [&'static str])],
    /// Class tokens allowed per tag; every other token is removed.
    pub tag_classes: &'static [(&'static str, &'static [&'static str])],
    pub url_schemes: &'static [&'static str],
    /// Attributes whose value is a URL and must carry an allowed scheme.
    pub url_attributes: &'static [&'static str],
    /// Tags removed together with everything inside them.
    pub drop_content_tags: &'static [&'static str],
    /// Accept `//host/path` URLs.
    pub allow_protocol_relative: bool,
}

impl SanitizePolicy {
    pub const DEFAULT: SanitizePolicy = SanitizePolicy {
        tags: &[
            "address",
            "article",
            "aside",
            "footer",
            "header",
            "h1",
            "h2",
            "h3",
            "h4",
            "h5",
            "h6",
            "hgroup",
            "main",
            "nav",
            "section",
            "blockquote",
            "dd",
            "div",
            "dl",
            "dt",
            "figcaption",
            "figure",
            "hr",
            "li",
            "ol",
            "p",
            "pre",
            "ul",
            "a",
            "abbr",
            "b",
            "bdi",
            "bdo",
            "br",
            "cite",
            "code",
            "data",
            "dfn",
            "em",
            "i",
            "kbd",
            "mark",
            "q",
            "rb",
            "rp",
            "rt",
            "rtc",
            "ruby",
            "s",
            "samp",
            "small",
            "span",
            "strong",
            "sub",
            "sup",
            "time",
            "u",
            "var",
            "wbr",
            "caption",
            "col",
            "colgroup",
            "table",
            "tbody",
            "td",
            "tfoot",
            "th",
            "thead",
            "tr",
            "img",
            "del",
        ],
        tag_attributes: &[
            ("a", &["href", "name", "target"]),
            (
                "img",
                &["src", "srcset", "alt", "title", "width", "height", "loading"],
            ),
            ("i", &["emoji-src", "emoji-orig"]),
        ],
        tag_classes: &[("span", &["spoiler"]), ("i", &["custom-emoji"])],
        url_schemes: &["http", "https", "ftp", "mailto", "tel"],
        url_attributes: &["href", "src", "cite"],
        drop_content_tags: &["script", "style", "textarea", "option", "noscript"],
        allow_protocol_relative: true,
    };

    /// Rejects tables the HTML cleaner would panic on or silently ignore.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Some(tag) = self
            .drop_content_tags
            .iter()
            .copied()
            .find(|tag| self.allows_tag(tag))
        {
            return Err(PolicyError::TagDropsContent(tag));
        }
        for &(tag, attributes) in self.tag_attributes {
            if !self.allows_tag(tag) {
                return Err(PolicyError::UnknownTag {
                    table: "attribute",
                    tag,
                });
            }
            if attributes.contains(&"class") && !self.classes_for(tag).is_empty() {
                return Err(PolicyError::ClassAttributeConflict(tag));
            }
        }
        if let Some(&(tag, _)) = self
            .tag_classes
            .iter()
            .find(|(tag, _)| !self.allows_tag(tag))
        {
            return Err(PolicyError::UnknownTag {
                table: "class",
                tag,
            });
        }
        if let Some(scheme) = self
            .url_schemes
            .iter()
            .copied()
            .find(|scheme| !is_scheme_name(scheme))
        {
            return Err(PolicyError::InvalidScheme(scheme));
        }
        Ok(())
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }

    pub fn attributes_for(&self, tag: &str) -> &'static [&'static str] {
        lookup(self.tag_attributes, tag)
    }

    pub fn classes_for(&self, tag: &str) -> &'static [&'static str] {
        lookup(self.tag_classes, tag)
    }

    pub fn is_url_attribute(&self, attribute: &str) -> bool {
        self.url_attributes.contains(&attribute)
    }

    /// Whether a URL attribute value may stay. Values without a scheme are
    /// relative and stay, except `//host` forms when those are disallowed.
    pub fn url_allowed(&self, value: &str) -> bool {
        // Browsers ignore control characters and spaces inside a scheme.
        let compact: String = value.chars().filter(|ch| *ch > ' ').collect();
        match url_scheme(&compact) {
            Some(scheme) => self
                .url_schemes
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(scheme)),
            None => {
                let bytes = compact.as_bytes();
                let protocol_relative =
                    bytes.len() >= 2 && matches!(bytes[0], b'/' | b'\\') && matches!(bytes[1], b'/' | b'\\');
                !protocol_relative || self.allow_protocol_relative
            }
        }
    }

    /// Attribute callback for the cleaner: drops URL attributes, and any
    /// `srcset` candidate, whose scheme is not allowed.
    pub(crate) fn filter_attribute<'u>(
        &self,
        element: &str,
        attribute: &str,
        value: &'u str,
    ) -> Option<Cow<'u, str>> {
        let allowed = if attribute == "srcset" {
            value
                .split(',')
                .filter_map(|candidate| candidate.split_whitespace().next())
                .all(|url| self.url_allowed(url))
        } else {
            !self.is_url_attribute(attribute) || self.url_allowed(value)
        };
        if !allowed {
            log::trace!("dropping {attribute} on <{element}>");
            return None;
        }
        Some(Cow::Borrowed(value))
    }
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn lookup(
    table: &'static [(&'static str, &'static [&'static str])],
    tag: &str,
) -> &'static [&'static str] {
    table
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, values)| *values)
        .unwrap_or(&[])
}

fn is_scheme_name(scheme: &str) -> bool {
    let mut bytes = scheme.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

/// Scheme of `value` when it starts with `scheme:`.
fn url_scheme(value: &str) -> Option<&str> {
    let colon = value.find(':')?;
    let scheme = &value[..colon];
    is_scheme_name(scheme).then_some(scheme)
}
