use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Derives the stable identifier used both as a settings key and as an
/// in-document anchor.
///
/// Inline markdown is reduced to its visible text, the result is lowercased,
/// and every run of non-alphanumeric characters collapses into a single `-`.
/// Leading and trailing separators are dropped, so titles that differ only in
/// whitespace or punctuation share a slug.
pub fn slugify(title: &str) -> String {
    let plain = inline_to_plain_text(title);

    let mut out = String::with_capacity(plain.len());
    let mut pending_separator = false;
    for ch in plain.nfkd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

/// Slug with a positional fallback for titles that contain no alphanumerics.
pub fn slugify_or(title: &str, ordinal: usize) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("section-{ordinal}")
    } else {
        slug
    }
}

/// Minimal inline stripping: `[text](url)` becomes `text`, and backticks and
/// `*` emphasis markers are removed. Underscores are kept because they act as
/// word separators in file stems.
pub fn inline_to_plain_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i: usize = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if let Some((text, next)) = inline_link_at(input, i) {
                    out.push_str(text);
                    i = next;
                    continue;
                }
                out.push('[');
                i += 1;
            }
            b'`' | b'*' => {
                i += 1;
            }
            _ => match input[i..].chars().next() {
                Some(ch) => {
                    out.push(ch);
                    i += ch.len_utf8();
                }
                None => break,
            },
        }
    }
    out
}

/// If an inline link `[text](dest)` starts at byte `start`, returns its text
/// and the byte offset just past the closing parenthesis.
pub(crate) fn inline_link_at(input: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = input.as_bytes();
    if bytes.get(start) != Some(&b'[') {
        return None;
    }
    let close_bracket = find_byte(bytes, b']', start + 1)?;
    if bytes.get(close_bracket + 1) != Some(&b'(') {
        return None;
    }
    let close_paren = find_byte(bytes, b')', close_bracket + 2)?;
    Some((&input[start + 1..close_bracket], close_paren + 1))
}

fn find_byte(haystack: &[u8], needle: u8, start: usize) -> Option<usize> {
    haystack
        .iter()
        .enumerate()
        .skip(start)
        .find_map(|(i, b)| if *b == needle { Some(i) } else { None })
}
