use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::StitchError;
use crate::front_matter::front_matter_line_count;
use crate::slug::{inline_link_at, inline_to_plain_text};
use crate::syntax::{
    MAX_HEADING_LEVEL, lines_with_fences, normalize_newlines, parse_atx_heading, parse_list_item,
};

/// Default file name of the table of contents inside a working directory.
pub const DEFAULT_TOC_FILE: &str = "Table_of_Contents.md";
/// Title that marks the table of contents' own entry inside the TOC.
pub const DEFAULT_TOC_TITLE: &str = "Table of Contents";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Heading,
    ListItem,
}

/// One `(level, title)` pair in TOC source order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub title: String,
    /// 1-based line number in the TOC source.
    pub line: usize,
    pub kind: EntryKind,
}

impl TocEntry {
    pub fn heading(level: u8, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            line: 0,
            kind: EntryKind::Heading,
        }
    }
}

/// Reads the TOC file. Absence or unreadability is the one fatal build error.
pub fn read_toc(path: &Path) -> Result<String, StitchError> {
    let raw = fs::read_to_string(path).map_err(|source| StitchError::MissingToc {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(normalize_newlines(&raw))
}

/// Parses TOC text into entries in source order.
///
/// Heading lines keep their marker depth. Bullet items become entries one
/// level below the nearest preceding heading, regardless of their own
/// indentation; bullets before the first heading carry no structure.
pub fn parse_toc(text: &str) -> Vec<TocEntry> {
    let skip = front_matter_line_count(text);
    let mut entries = Vec::new();
    let mut current_heading: Option<u8> = None;

    for (idx, (line, fenced)) in lines_with_fences(text).enumerate() {
        if idx < skip || fenced {
            continue;
        }

        if let Some(heading) = parse_atx_heading(line) {
            let title = entry_title(heading.title);
            if title.is_empty() {
                continue;
            }
            current_heading = Some(heading.level);
            entries.push(TocEntry {
                level: heading.level,
                title,
                line: idx + 1,
                kind: EntryKind::Heading,
            });
            continue;
        }

        if let Some(item) = parse_list_item(line) {
            let Some(parent_level) = current_heading else {
                continue;
            };
            let title = entry_title(item.text);
            if title.is_empty() {
                continue;
            }
            entries.push(TocEntry {
                level: (parent_level + 1).min(MAX_HEADING_LEVEL),
                title,
                line: idx + 1,
                kind: EntryKind::ListItem,
            });
        }
    }

    entries
}

/// Visible title text: a line that is entirely a link contributes its link
/// text, anything else is stripped of inline markup.
fn entry_title(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((text, end)) = inline_link_at(raw, 0) {
        if end == raw.len() {
            return inline_to_plain_text(text).trim().to_string();
        }
    }
    inline_to_plain_text(raw).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels_and_titles(entries: &[TocEntry]) -> Vec<(u8, &str)> {
        entries.iter().map(|e| (e.level, e.title.as_str())).collect()
    }

    #[test]
    fn headings_keep_their_depth() {
        let entries = parse_toc("# Book\n\n## Introduction\n### Background\n## Conclusion\n");
        assert_eq!(
            levels_and_titles(&entries),
            vec![
                (1, "Book"),
                (2, "Introduction"),
                (3, "Background"),
                (2, "Conclusion"),
            ]
        );
        assert_eq!(entries[1].line, 3);
    }

    #[test]
    fn list_items_sit_one_level_below_nearest_heading() {
        let toc = "## Introduction\n## Table of Contents\n- Introduction\n  - Nested\n* Conclusion\n## Conclusion\n";
        let entries = parse_toc(toc);
        assert_eq!(
            levels_and_titles(&entries),
            vec![
                (2, "Introduction"),
                (2, "Table of Contents"),
                (3, "Introduction"),
                (3, "Nested"),
                (3, "Conclusion"),
                (2, "Conclusion"),
            ]
        );
        assert_eq!(entries[2].kind, EntryKind::ListItem);
    }

    #[test]
    fn prose_rules_fences_and_front_matter_are_ignored() {
        let toc = "---\ntitle: Contents\n---\nSome intro prose.\n- orphan bullet\n\n---\n## Scope\n```\n## Not an entry\n```\n";
        let entries = parse_toc(toc);
        assert_eq!(levels_and_titles(&entries), vec![(2, "Scope")]);
    }

    #[test]
    fn leading_thematic_break_keeps_following_headings() {
        let entries = parse_toc("---\n## Introduction\n---\n## Conclusion\n");
        assert_eq!(
            levels_and_titles(&entries),
            vec![(2, "Introduction"), (2, "Conclusion")]
        );
    }

    #[test]
    fn linked_items_use_visible_text() {
        let entries = parse_toc("## [Overview](#overview)\n- [Scope](#scope)\n");
        assert_eq!(
            levels_and_titles(&entries),
            vec![(2, "Overview"), (3, "Scope")]
        );
    }

    #[test]
    fn list_items_under_h6_stay_at_h6() {
        let entries = parse_toc("###### Deep\n- Deeper\n");
        assert_eq!(levels_and_titles(&entries), vec![(6, "Deep"), (6, "Deeper")]);
    }

    #[test]
    fn empty_toc_yields_no_entries() {
        assert!(parse_toc("").is_empty());
        assert!(parse_toc("Just words, no headings.\n").is_empty());
    }

    #[test]
    fn missing_toc_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_toc(&dir.path().join(DEFAULT_TOC_FILE)).unwrap_err();
        assert!(matches!(err, StitchError::MissingToc { .. }));
    }
}
