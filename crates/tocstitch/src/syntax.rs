//! Line-level Markdown recognition shared by the TOC parser, the heading
//! aligner and the linkifier. Only ATX headings, bullet list items and code
//! fences matter to the stitcher, so no full CommonMark parse is done here.

pub(crate) const MAX_HEADING_LEVEL: u8 = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AtxHeading<'a> {
    pub indent: &'a str,
    pub level: u8,
    /// Everything after the marker and its separator, trailing space removed.
    pub text: &'a str,
    /// `text` with an optional closing `#` sequence removed.
    pub title: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ListItem<'a> {
    pub indent: &'a str,
    pub marker: char,
    pub text: &'a str,
}

#[derive(Clone, Debug)]
pub(crate) struct FenceState {
    ch: char,
    len: usize,
}

/// Tracks fenced code blocks line by line. Returns `Some(new_state)` when the
/// line opens or closes a fence, `None` when the line is not a fence marker.
pub(crate) fn fence_update(current: Option<&FenceState>, line: &str) -> Option<Option<FenceState>> {
    let trimmed = strip_indent(line)?;
    let (ch, run) = if trimmed.starts_with("```") {
        ('`', count_run(trimmed, '`'))
    } else if trimmed.starts_with("~~~") {
        ('~', count_run(trimmed, '~'))
    } else {
        return None;
    };

    match current {
        None => Some(Some(FenceState { ch, len: run.max(3) })),
        Some(cur) if cur.ch == ch && run >= cur.len && trimmed[run..].trim().is_empty() => {
            Some(None)
        }
        Some(cur) => Some(Some(cur.clone())),
    }
}

/// Iterates lines together with a flag telling whether the line belongs to a
/// fenced code block (fence markers included).
pub(crate) fn lines_with_fences(text: &str) -> impl Iterator<Item = (&str, bool)> {
    let mut fence: Option<FenceState> = None;
    text.lines().map(move |line| match fence_update(fence.as_ref(), line) {
        Some(updated) => {
            fence = updated;
            (line, true)
        }
        None => (line, fence.is_some()),
    })
}

pub(crate) fn parse_atx_heading(line: &str) -> Option<AtxHeading<'_>> {
    let trimmed = strip_indent(line)?;
    let indent = &line[..line.len() - trimmed.len()];
    let hashes = count_run(trimmed, '#');
    if !(1..=MAX_HEADING_LEVEL as usize).contains(&hashes) {
        return None;
    }

    let after = &trimmed[hashes..];
    if !after.starts_with([' ', '\t']) {
        return None;
    }
    let text = after.trim();
    if text.is_empty() {
        return None;
    }

    Some(AtxHeading {
        indent,
        level: hashes as u8,
        text,
        title: strip_closing_sequence(text),
    })
}

pub(crate) fn parse_list_item(line: &str) -> Option<ListItem<'_>> {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    let marker = trimmed.chars().next()?;
    if !matches!(marker, '-' | '*' | '+') {
        return None;
    }

    let after = &trimmed[1..];
    if !after.starts_with([' ', '\t']) {
        return None;
    }
    let text = after.trim();
    if text.is_empty() {
        return None;
    }

    Some(ListItem {
        indent,
        marker,
        text,
    })
}

pub(crate) fn clamp_level(level: i32) -> u8 {
    level.clamp(1, MAX_HEADING_LEVEL as i32) as u8
}

pub(crate) fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_closing_sequence(text: &str) -> &str {
    let without = text.trim_end_matches('#');
    if without.len() == text.len() {
        return text;
    }
    if without.is_empty() {
        return text;
    }
    if without.ends_with([' ', '\t']) {
        without.trim_end()
    } else {
        text
    }
}

/// Removes up to three leading spaces; four or more make an indented code
/// block, which never carries structure.
fn strip_indent(line: &str) -> Option<&str> {
    let spaces = line.len() - line.trim_start_matches(' ').len();
    if spaces > 3 {
        return None;
    }
    Some(&line[spaces..])
}

fn count_run(s: &str, ch: char) -> usize {
    s.chars().take_while(|c| *c == ch).count()
}
