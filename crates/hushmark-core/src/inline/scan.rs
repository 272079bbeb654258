//! Byte-level scanning helpers shared by the inline rules.

use std::collections::HashMap;

use crate::label::unescape_and_decode;

pub(crate) fn count_run(bytes: &[u8], start: usize, needle: u8) -> usize {
    bytes[start.min(bytes.len())..]
        .iter()
        .take_while(|b| **b == needle)
        .count()
}

pub(crate) fn find_byte(src: &str, from: usize, needle: u8) -> Option<usize> {
    let bytes = src.as_bytes();
    let from = from.min(bytes.len());
    bytes[from..]
        .iter()
        .position(|b| *b == needle)
        .map(|idx| from + idx)
}

pub(crate) fn find_str(src: &str, from: usize, needle: &str) -> Option<usize> {
    src.get(from..)?.find(needle).map(|idx| from + idx)
}

/// Returns the end of the code span opened by a backtick run of `run_len`
/// at `start`, or `None` when no run of exactly that length follows.
pub(crate) fn code_span_end(bytes: &[u8], start: usize, run_len: usize) -> Option<usize> {
    let mut i = start + run_len;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let close_len = count_run(bytes, i, b'`');
            if close_len == run_len {
                return Some(i + close_len);
            }
            i += close_len;
            continue;
        }
        i += 1;
    }
    None
}

/// Finds the next run of `ch` at or after `from`, stepping over backslash
/// escapes and code spans. Returns `(offset, run length)`.
pub(crate) fn next_delimiter_run(src: &str, from: usize, ch: u8) -> Option<(usize, usize)> {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if b == b'`' {
            let run = count_run(bytes, i, b'`');
            i = code_span_end(bytes, i, run).unwrap_or(i + run);
            continue;
        }
        if b == ch {
            return Some((i, count_run(bytes, i, ch)));
        }
        i += 1;
    }
    None
}

pub(crate) fn char_before(src: &str, idx: usize) -> Option<char> {
    src.get(..idx)?.chars().next_back()
}

pub(crate) fn char_at(src: &str, idx: usize) -> Option<char> {
    src.get(idx..)?.chars().next()
}

pub(crate) fn next_char_boundary(src: &str, idx: usize) -> usize {
    char_at(src, idx)
        .map(|ch| idx + ch.len_utf8())
        .unwrap_or(src.len())
}

/// Matching `]` for a `[` whose content starts at `start`.
pub(crate) fn find_bracket_end(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = start;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'`' => {
                let run = count_run(bytes, i, b'`');
                i = code_span_end(bytes, i, run).unwrap_or(i + run);
                continue;
            }
            b'[' => depth += 1,
            b']' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Matching `]` for every `[` a forward scan reaches, skipping escapes and
/// code spans the same way [`find_bracket_end`] does.
pub(crate) fn match_brackets(src: &str) -> HashMap<usize, Option<usize>> {
    let bytes = src.as_bytes();
    let mut matches = HashMap::new();
    let mut open = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'`' => {
                let run = count_run(bytes, i, b'`');
                i = code_span_end(bytes, i, run).unwrap_or(i + run);
                continue;
            }
            b'[' => {
                open.push(i);
                matches.insert(i, None);
            }
            b']' => {
                if let Some(start) = open.pop() {
                    matches.insert(start, Some(i));
                }
            }
            _ => {}
        }
        i += 1;
    }
    matches
}

fn parse_link_title(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let close = match bytes.get(start)? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if b == close {
            return Some((unescape_and_decode(&src[start + 1..i]), i + 1));
        }
        i += 1;
    }
    None
}

/// Parses `(destination "title")` starting at the `(`. Returns the decoded
/// URL, optional title, and the offset just past the closing `)`.
pub(crate) fn parse_inline_link_destination(
    src: &str,
    start: usize,
) -> Option<(String, Option<String>, usize)> {
    let bytes = src.as_bytes();
    if bytes.get(start) != Some(&b'(') {
        return None;
    }
    let mut i = skip_whitespace(bytes, start + 1);
    let url_raw;
    if bytes.get(i) == Some(&b'<') {
        let open = i + 1;
        i = open;
        loop {
            match bytes.get(i)? {
                b'\n' | b'<' => return None,
                b'\\' => i += 2,
                b'>' => break,
                _ => i += 1,
            }
        }
        url_raw = &src[open..i];
        i += 1;
    } else {
        let open = i;
        let mut depth = 0usize;
        while i < bytes.len() {
            let b = bytes[i];
            if b.is_ascii_whitespace() || b.is_ascii_control() {
                break;
            }
            if b == b'\\' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_punctuation() {
                i += 2;
                continue;
            }
            if b == b'(' {
                depth += 1;
            } else if b == b')' {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            i += 1;
        }
        if depth > 0 {
            return None;
        }
        url_raw = &src[open..i];
    }
    let url = unescape_and_decode(url_raw);

    let after_url = i;
    i = skip_whitespace(bytes, i);
    if bytes.get(i) == Some(&b')') {
        return Some((url, None, i + 1));
    }
    if i == after_url {
        return None;
    }
    let (title, next) = parse_link_title(src, i)?;
    i = skip_whitespace(bytes, next);
    if bytes.get(i) == Some(&b')') {
        return Some((url, Some(title), i + 1));
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// End offset (exclusive) of an HTML open or close tag starting at `start`.
pub(crate) fn html_tag_end(src: &str, start: usize) -> Option<usize> {
    let bytes = &src.as_bytes()[start..];
    if bytes.len() < 3 || bytes[0] != b'<' {
        return None;
    }
    let mut i = 1;
    let closing = bytes[i] == b'/';
    if closing {
        i += 1;
    }
    if !bytes.get(i)?.is_ascii_alphabetic() {
        return None;
    }
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let boundary = *bytes.get(i)?;
    if !boundary.is_ascii_whitespace() && boundary != b'>' && boundary != b'/' {
        return None;
    }
    if closing {
        i = skip_whitespace(bytes, i);
        return (bytes.get(i) == Some(&b'>')).then_some(start + i + 1);
    }
    loop {
        i = skip_whitespace(bytes, i);
        match bytes.get(i)? {
            b'>' => return Some(start + i + 1),
            b'/' => {
                return (bytes.get(i + 1) == Some(&b'>')).then_some(start + i + 2);
            }
            b if is_attr_name_start(*b) => {}
            _ => return None,
        }
        while i < bytes.len() && is_attr_name_continue(bytes[i]) {
            i += 1;
        }
        let ws = skip_whitespace(bytes, i);
        if bytes.get(ws) != Some(&b'=') {
            continue;
        }
        i = skip_whitespace(bytes, ws + 1);
        match bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                let quote = *quote;
                i += 1;
                while bytes.get(i)? != &quote {
                    i += 1;
                }
                i += 1;
            }
            _ => {
                let value_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'"' | b'\'' | b'=' | b'<' | b'>' | b'`')
                {
                    i += 1;
                }
                if i == value_start {
                    return None;
                }
            }
        }
    }
}

/// End offset (exclusive) of an HTML comment starting at `start`.
pub(crate) fn html_comment_end(src: &str, start: usize) -> Option<usize> {
    let rest = src.get(start..)?;
    if !rest.starts_with("<!--") {
        return None;
    }
    if rest[4..].starts_with('>') {
        return Some(start + 5);
    }
    if rest[4..].starts_with("->") {
        return Some(start + 6);
    }
    rest[4..].find("-->").map(|idx| start + 4 + idx + 3)
}

fn is_attr_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':'
}

fn is_attr_name_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-')
}

pub(crate) fn is_autolink_scheme(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_alphabetic() {
        return false;
    }
    for (i, b) in bytes.iter().enumerate() {
        if *b == b':' {
            return (2..=32).contains(&i);
        }
        if !(b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')) {
            return false;
        }
    }
    false
}

pub(crate) fn is_autolink_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let local_ok = local.bytes().all(|b| {
        b.is_ascii_alphanumeric()
            || matches!(
                b,
                b'!' | b'#'
                    | b'$'
                    | b'%'
                    | b'&'
                    | b'\''
                    | b'*'
                    | b'+'
                    | b'-'
                    | b'/'
                    | b'='
                    | b'?'
                    | b'^'
                    | b'_'
                    | b'`'
                    | b'{'
                    | b'|'
                    | b'}'
                    | b'~'
                    | b'.'
            )
    });
    let domain_ok = domain
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-');
    local_ok
        && domain_ok
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Offset where a bare `http://`, `https://` or `www.` link begins.
pub(crate) fn find_url_literal(src: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if matches!(bytes[i], b'h' | b'w') && url_literal_prefix(src, i).is_some() {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Length of the scheme prefix when a literal URL starts at `start`.
pub(crate) fn url_literal_prefix(src: &str, start: usize) -> Option<usize> {
    let boundary = match start.checked_sub(1).map(|idx| src.as_bytes()[idx]) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || matches!(b, b'(' | b'*' | b'_' | b'~' | b'"' | b'\''),
    };
    if !boundary {
        return None;
    }
    let rest = src.get(start..)?;
    ["https://", "http://", "www."]
        .iter()
        .find(|prefix| rest.starts_with(**prefix))
        .map(|prefix| prefix.len())
}

/// End of a literal URL, with trailing punctuation and unbalanced closing
/// parentheses left outside the link.
pub(crate) fn url_literal_end(src: &str, start: usize) -> usize {
    let bytes = src.as_bytes();
    let mut end = start;
    while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'<' {
        end += 1;
    }
    loop {
        let Some(&last) = bytes[start..end].last() else {
            break;
        };
        if matches!(last, b'.' | b',' | b';' | b':' | b'!' | b'?' | b'*' | b'_' | b'~' | b'"' | b'\'') {
            end -= 1;
            continue;
        }
        if last == b')' {
            let opens = bytes[start..end].iter().filter(|b| **b == b'(').count();
            let closes = bytes[start..end].iter().filter(|b| **b == b')').count();
            if closes > opens {
                end -= 1;
                continue;
            }
        }
        break;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_runs_skip_code_and_escapes() {
        let src = "a `*` \\* b**";
        assert_eq!(next_delimiter_run(src, 0, b'*'), Some((10, 2)));
    }

    #[test]
    fn bracket_end_tracks_nesting() {
        assert_eq!(find_bracket_end("a [b] c] d", 0), Some(7));
        assert_eq!(find_bracket_end("a \\] b", 0), None);
    }

    #[test]
    fn bracket_table_agrees_with_direct_scan() {
        for src in [
            "a [b] c] d",
            "[a [b] `]` c] [d",
            "[[[x]",
            "\\[a] [b\\]] [`[`]",
            "[a](b) ![c]",
        ] {
            let table = match_brackets(src);
            for (open, close) in &table {
                assert_eq!(*close, find_bracket_end(src, open + 1), "{src:?} at {open}");
            }
        }
        assert!(!match_brackets("`[`").contains_key(&1));
    }

    #[test]
    fn link_destination_with_title() {
        let src = "(https://example.com/a_(b) \"Title\") tail";
        let (url, title, end) = parse_inline_link_destination(src, 0).unwrap();
        assert_eq!(url, "https://example.com/a_(b)");
        assert_eq!(title.as_deref(), Some("Title"));
        assert_eq!(&src[end..], " tail");
    }

    #[test]
    fn link_destination_rejects_trailing_garbage() {
        assert!(parse_inline_link_destination("(a \"t\"x)", 0).is_none());
        assert!(parse_inline_link_destination("(a", 0).is_none());
    }

    #[test]
    fn html_tags_and_comments() {
        assert_eq!(html_tag_end("<b>x", 0), Some(3));
        assert_eq!(html_tag_end("<a href=\"x\" title='y'>", 0), Some(22));
        assert_eq!(html_tag_end("</em >", 0), Some(6));
        assert_eq!(html_tag_end("<br/>", 0), Some(5));
        assert_eq!(html_tag_end("< b>", 0), None);
        assert_eq!(html_tag_end("<a href=\"x>", 0), None);
        assert_eq!(html_comment_end("<!-- hi -->!", 0), Some(11));
        assert_eq!(html_comment_end("<!-- open", 0), None);
    }

    #[test]
    fn autolink_forms() {
        assert!(is_autolink_scheme("https://example.com"));
        assert!(!is_autolink_scheme("a:b"));
        assert!(is_autolink_email("me@example.com"));
        assert!(!is_autolink_email("me@localhost"));
    }

    #[test]
    fn url_literals_trim_trailing_punctuation() {
        let src = "see (https://example.com/x), ok";
        let start = find_url_literal(src, 0).unwrap();
        assert_eq!(start, 5);
        let end = url_literal_end(src, start);
        assert_eq!(&src[start..end], "https://example.com/x");
        assert_eq!(find_url_literal("nowww.example.com", 0), None);
    }
}
