use std::collections::BTreeMap;

use serde::Serialize;

use crate::syntax::{clamp_level, lines_with_fences, parse_atx_heading};

/// Heading census of a fragment, used to decide the alignment shift and to
/// surface structural oddities in the build log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HeadingStats {
    /// Number of headings per level.
    pub counts: BTreeMap<u8, usize>,
    /// `(level, title, line)` of the first heading.
    pub first: Option<(u8, String, usize)>,
    pub min_level: Option<u8>,
    /// `(from, to, line)` for every heading that skips a level going deeper.
    pub jumps: Vec<(u8, u8, usize)>,
}

impl HeadingStats {
    /// More than one heading sits at the top level.
    pub fn multiple_top(&self) -> bool {
        self.min_level
            .and_then(|level| self.counts.get(&level))
            .is_some_and(|count| *count > 1)
    }
}

pub fn analyze_headings(text: &str) -> HeadingStats {
    let mut stats = HeadingStats::default();
    let mut last_level: Option<u8> = None;

    for (idx, (line, fenced)) in lines_with_fences(text).enumerate() {
        if fenced {
            continue;
        }
        let Some(heading) = parse_atx_heading(line) else {
            continue;
        };
        let line_no = idx + 1;
        *stats.counts.entry(heading.level).or_default() += 1;
        if stats.first.is_none() {
            stats.first = Some((heading.level, heading.title.to_string(), line_no));
        }
        if let Some(prev) = last_level {
            if heading.level > prev + 1 {
                stats.jumps.push((prev, heading.level, line_no));
            }
        }
        last_level = Some(heading.level);
    }

    stats.min_level = stats.counts.keys().next().copied();
    stats
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignedFragment {
    pub text: String,
    /// Signed shift applied before clamping; zero for synthesized headings.
    pub shift: i32,
    /// True when the fragment had no heading and one was created from the
    /// TOC title.
    pub synthesized: bool,
    pub stats: HeadingStats,
}

/// Shifts every heading so the fragment's shallowest heading lands on
/// `target`. Each shifted level is clamped into 1..=6. Fragments without
/// headings are placed under a new heading built from `title`.
pub fn align_fragment(text: &str, target: u8, title: &str) -> AlignedFragment {
    let target = clamp_level(i32::from(target));
    let stats = analyze_headings(text);

    let Some(min_level) = stats.min_level else {
        let body = text.trim();
        let mut out = format!("{} {}\n", "#".repeat(target as usize), title.trim());
        if !body.is_empty() {
            out.push('\n');
            out.push_str(body);
            out.push('\n');
        }
        return AlignedFragment {
            text: out,
            shift: 0,
            synthesized: true,
            stats,
        };
    };

    for (from, to, line) in &stats.jumps {
        tracing::warn!(title, from, to, line, "heading level jumps in fragment");
    }
    if stats.multiple_top() {
        tracing::warn!(
            title,
            level = min_level,
            "fragment has more than one top-level heading"
        );
    }

    let shift = i32::from(target) - i32::from(min_level);
    AlignedFragment {
        text: shift_headings(text, shift),
        shift,
        synthesized: false,
        stats,
    }
}

/// Applies `shift` to every heading line outside code fences; all other
/// lines are copied unchanged.
pub fn shift_headings(text: &str, shift: i32) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for (line, fenced) in lines_with_fences(text) {
        match parse_atx_heading(line).filter(|_| !fenced && shift != 0) {
            Some(heading) => {
                let level = clamp_level(i32::from(heading.level) + shift);
                out.push_str(heading.indent);
                out.push_str(&"#".repeat(level as usize));
                out.push(' ');
                out.push_str(heading.text);
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}
