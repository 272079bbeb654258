pub(crate) fn normalize_link_label(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::new();
    let mut last_space = false;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b == b'\\' && idx + 1 < bytes.len() && is_label_escape(bytes[idx + 1]) {
            out.push(bytes[idx + 1] as char);
            last_space = false;
            idx += 2;
            continue;
        }
        if b.is_ascii_whitespace() {
            if !out.is_empty() && !last_space {
                out.push(' ');
                last_space = true;
            }
            idx += 1;
            continue;
        }
        last_space = false;
        match text[idx..].chars().next() {
            Some(ch) => {
                out.push(ch);
                idx += ch.len_utf8();
            }
            None => break,
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out.to_lowercase().replace('ß', "ss").replace('ẞ', "ss")
}

pub(crate) fn is_label_escape(byte: u8) -> bool {
    byte == b'[' || byte == b']' || byte == b'\\'
}

pub(crate) fn unescape_backslash_punct(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(next) = chars.peek().copied()
            && next.is_ascii_punctuation()
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(ch);
    }
    out
}

/// Backslash escapes first, then character references.
pub(crate) fn unescape_and_decode(text: &str) -> String {
    let unescaped = unescape_backslash_punct(text);
    html_escape::decode_html_entities(&unescaped).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{normalize_link_label, unescape_and_decode, unescape_backslash_punct};

    #[test]
    fn labels_fold_case_and_whitespace() {
        assert_eq!(normalize_link_label("  Foo \n  BAR "), "foo bar");
        assert_eq!(normalize_link_label("Straße"), "strasse");
        assert_eq!(normalize_link_label("a\\]b"), "a]b");
    }

    #[test]
    fn unescape_keeps_multibyte_text() {
        assert_eq!(unescape_backslash_punct("\\*日本\\_"), "*日本_");
        assert_eq!(unescape_backslash_punct("a\\b"), "a\\b");
    }

    #[test]
    fn decode_runs_after_unescape() {
        assert_eq!(unescape_and_decode("x&amp;y"), "x&y");
        assert_eq!(unescape_and_decode("\\(a\\)"), "(a)");
    }
}
