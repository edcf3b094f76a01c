use crate::front_matter::front_matter_line_count;
use crate::matcher::{MIN_CONTAINMENT_SCORE, MatchKey, containment_score, jaccard};
use crate::syntax::{lines_with_fences, parse_atx_heading, parse_list_item};

/// Minimum token overlap for a TOC line to be linked to a section.
pub const MIN_LINK_SCORE: f64 = 0.45;

/// A section that received an anchor in the assembled document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkTarget {
    pub title: String,
    pub slug: String,
}

impl LinkTarget {
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
        }
    }
}

pub fn anchor(slug: &str) -> String {
    format!("<a id=\"{slug}\"></a>")
}

/// Puts the anchor on its own line ahead of the fragment, separated from the
/// fragment's top heading by a blank line.
pub fn inject_anchor(fragment: &str, slug: &str) -> String {
    let body = fragment.trim_start_matches(['\n', '\r']);
    let mut out = anchor(slug);
    out.push('\n');
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Rewrites heading and bullet lines of the TOC into links pointing at the
/// best matching anchored section. Wording, order, indentation and markers
/// are preserved; lines that are already links, front matter and fenced code
/// are copied verbatim.
pub fn linkify_toc(toc_text: &str, targets: &[LinkTarget]) -> String {
    let keyed: Vec<(MatchKey, &LinkTarget)> = targets
        .iter()
        .map(|target| (MatchKey::new(&target.title), target))
        .collect();
    let skip = front_matter_line_count(toc_text);

    let mut lines: Vec<String> = Vec::new();
    for (idx, (line, fenced)) in lines_with_fences(toc_text).enumerate() {
        if idx < skip || fenced || line.contains("](") {
            lines.push(line.to_string());
            continue;
        }

        if let Some(heading) = parse_atx_heading(line) {
            if let Some(slug) = best_target(heading.title, &keyed) {
                lines.push(format!(
                    "{}{} [{}](#{slug})",
                    heading.indent,
                    "#".repeat(heading.level as usize),
                    heading.title
                ));
                continue;
            }
        } else if let Some(item) = parse_list_item(line) {
            if let Some(slug) = best_target(item.text, &keyed) {
                lines.push(format!("{}{} [{}](#{slug})", item.indent, item.marker, item.text));
                continue;
            }
        }
        lines.push(line.to_string());
    }

    let mut out = lines.join("\n").trim_end().to_string();
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Exact normalized title first, then containment in either direction at or
/// above [`MIN_CONTAINMENT_SCORE`], then the highest token overlap at or
/// above [`MIN_LINK_SCORE`].
fn best_target<'t>(text: &str, targets: &[(MatchKey, &'t LinkTarget)]) -> Option<&'t str> {
    let key = MatchKey::new(text);
    if key.is_empty() {
        return None;
    }

    let exact = targets.iter().find(|(k, _)| k.compact == key.compact);
    let contained = || {
        targets
            .iter()
            .find(|(k, _)| {
                containment_score(&k.compact, &key.compact)
                    .is_some_and(|score| score >= MIN_CONTAINMENT_SCORE)
            })
    };
    if let Some((_, target)) = exact.or_else(contained) {
        let target: &'t LinkTarget = *target;
        return Some(target.slug.as_str());
    }

    let mut best: Option<(&'t LinkTarget, f64)> = None;
    for (k, target) in targets {
        let score = jaccard(&key.tokens, &k.tokens);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((*target, score));
        }
    }
    best.filter(|(_, score)| *score >= MIN_LINK_SCORE)
        .map(|(target, _)| target.slug.as_str())
}
