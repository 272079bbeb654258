use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};

use crate::error::PolicyError;
use crate::policy::SanitizePolicy;

/// HTML cleaner compiled from a [`SanitizePolicy`].
pub struct Sanitizer {
    builder: Builder<'static>,
}

impl Sanitizer {
    pub fn new(policy: &SanitizePolicy) -> Result<Self, PolicyError> {
        if let Err(error) = policy.validate() {
            log::debug!("rejecting sanitize policy: {error}");
            return Err(error);
        }
        Ok(Self::build(*policy))
    }

    fn build(policy: SanitizePolicy) -> Self {
        let mut builder = Builder::new();
        builder
            .tags(policy.tags.iter().copied().collect())
            .generic_attributes(HashSet::new())
            .tag_attributes(table_map(policy.tag_attributes))
            .allowed_classes(table_map(policy.tag_classes))
            .url_schemes(policy.url_schemes.iter().copied().collect())
            // Scheme-less values are decided by the attribute filter.
            .url_relative(UrlRelative::PassThrough)
            .clean_content_tags(policy.drop_content_tags.iter().copied().collect())
            .link_rel(None)
            .strip_comments(true)
            .attribute_filter(attribute_filter(policy));
        Self { builder }
    }

    /// Cleans an HTML fragment. Never fails; anything the policy does not
    /// allow is removed.
    pub fn clean(&self, html: &str) -> String {
        let cleaned = self.builder.clean(html).to_string();
        log::trace!("sanitized {} bytes into {}", html.len(), cleaned.len());
        cleaned
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::build(SanitizePolicy::DEFAULT)
    }
}

fn table_map(
    table: &'static [(&'static str, &'static [&'static str])],
) -> HashMap<&'static str, HashSet<&'static str>> {
    table
        .iter()
        .map(|(tag, values)| (*tag, values.iter().copied().collect()))
        .collect()
}

fn attribute_filter(
    policy: SanitizePolicy,
) -> impl for<'u> Fn(&str, &str, &'u str) -> Option<Cow<'u, str>> + Send + Sync + 'static {
    move |element, attribute, value| policy.filter_attribute(element, attribute, value)
}
