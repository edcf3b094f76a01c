use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::align::align_fragment;
use crate::error::{Diagnostic, StitchError};
use crate::front_matter::{Metadata, strip_front_matter};
use crate::hierarchy::{NodeId, TocTree};
use crate::linkify::{LinkTarget, inject_anchor, linkify_toc};
use crate::matcher::{CandidateIndex, MatchOutcome, Matcher};
use crate::project::ProjectSnapshot;
use crate::selection::SelectionSet;
use crate::toc::EntryKind;

pub const PAGE_BREAK: &str = "<div style=\"page-break-after: always;\"></div>";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Insert a page break between rendered top-level sections.
    pub page_breaks: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self { page_breaks: true }
    }
}

/// What happened to one TOC node during assembly.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionStatus {
    Inserted {
        file: String,
        path: PathBuf,
        strategy: &'static str,
        score: f64,
        shift: i32,
        synthesized: bool,
    },
    /// The linkified TOC was inserted here.
    Toc,
    /// Listed under the TOC node; represented by the TOC block itself.
    CoveredByToc,
    Excluded,
    Missing,
    Ambiguous {
        candidates: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionReport {
    pub slug: String,
    pub title: String,
    pub level: u8,
    #[serde(flatten)]
    pub status: SectionStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssembledDocument {
    pub markdown: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Every slug in the tree in preorder, included or not.
    pub slugs: Vec<String>,
    /// One report per node, in preorder.
    pub sections: Vec<SectionReport>,
}

/// Walks the tree once in preorder and produces the compiled Markdown.
pub fn assemble(
    tree: &TocTree,
    snapshot: &ProjectSnapshot,
    selection: &SelectionSet,
    metadata: &Metadata,
    matcher: &Matcher,
    options: &AssembleOptions,
) -> Result<AssembledDocument, StitchError> {
    let front_matter = metadata.render()?;
    let index = matcher.index(snapshot.candidates.iter().map(|c| c.path.as_path()));
    let targets = anchored_nodes(tree, selection)
        .into_iter()
        .map(|id| {
            let node = tree.node(id);
            LinkTarget::new(node.title.clone(), node.slug.clone())
        })
        .collect();

    let mut assembler = Assembler {
        tree,
        snapshot,
        selection,
        matcher,
        index,
        targets,
        pieces: Vec::new(),
        diagnostics: Vec::new(),
        sections: Vec::new(),
        anchors: HashSet::new(),
    };

    let mut rendered_top = 0usize;
    for id in tree.children(tree.root()) {
        let included = selection.is_included(&tree.node(*id).slug);
        if included && options.page_breaks && rendered_top > 0 {
            assembler.pieces.push(format!("{PAGE_BREAK}\n"));
        }
        assembler.visit(*id);
        if included {
            rendered_top += 1;
        }
    }

    let body = assembler.pieces.join("\n");
    let mut markdown = front_matter;
    if !markdown.is_empty() && !body.is_empty() {
        markdown.push('\n');
    }
    markdown.push_str(&body);

    let slugs = tree
        .preorder()
        .into_iter()
        .map(|id| tree.node(id).slug.clone())
        .collect();

    Ok(AssembledDocument {
        markdown,
        diagnostics: assembler.diagnostics,
        slugs,
        sections: assembler.sections,
    })
}

/// Nodes that receive an anchor: included, not under an excluded ancestor,
/// and not a bullet listed beneath the TOC node.
pub fn anchored_nodes(tree: &TocTree, selection: &SelectionSet) -> Vec<NodeId> {
    let mut out = Vec::new();
    for id in tree.children(tree.root()) {
        collect_anchored(tree, selection, *id, false, &mut out);
    }
    out
}

fn collect_anchored(
    tree: &TocTree,
    selection: &SelectionSet,
    id: NodeId,
    in_toc_listing: bool,
    out: &mut Vec<NodeId>,
) {
    let node = tree.node(id);
    let covered = in_toc_listing && node.kind == EntryKind::ListItem;
    if !covered {
        if !selection.is_included(&node.slug) {
            return;
        }
        out.push(id);
    }
    for child in tree.children(id) {
        collect_anchored(tree, selection, *child, covered || node.is_toc, out);
    }
}

struct Assembler<'a> {
    tree: &'a TocTree,
    snapshot: &'a ProjectSnapshot,
    selection: &'a SelectionSet,
    matcher: &'a Matcher,
    index: CandidateIndex,
    targets: Vec<LinkTarget>,
    pieces: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    sections: Vec<SectionReport>,
    anchors: HashSet<String>,
}

impl Assembler<'_> {
    fn visit(&mut self, id: NodeId) {
        let tree = self.tree;
        let snapshot = self.snapshot;
        let node = tree.node(id);

        if !self.selection.is_included(&node.slug) {
            tracing::debug!(title = %node.title, "skipping excluded subtree");
            self.mark_subtree(id, SectionStatus::Excluded);
            return;
        }

        self.claim_anchor(&node.slug, &node.title);

        if node.is_toc {
            let linked = linkify_toc(&snapshot.toc_text, &self.targets);
            self.pieces.push(inject_anchor(&linked, &node.slug));
            self.report(id, SectionStatus::Toc);
            tracing::info!(title = %node.title, "inserted linkified table of contents");
            self.visit_toc_listing(id);
            return;
        }

        let status = match self.matcher.match_title(&node.title, &self.index) {
            MatchOutcome::Matched {
                path,
                file_name,
                strategy,
                score,
            } => match snapshot.candidate(&path) {
                Some(candidate) => {
                    let body = strip_front_matter(&candidate.content);
                    let aligned = align_fragment(body.trim(), node.level, &node.title);
                    self.pieces.push(inject_anchor(&aligned.text, &node.slug));
                    tracing::info!(
                        title = %node.title,
                        file = %file_name,
                        strategy,
                        shift = aligned.shift,
                        "inserted section"
                    );
                    SectionStatus::Inserted {
                        file: file_name,
                        path,
                        strategy,
                        score,
                        shift: aligned.shift,
                        synthesized: aligned.synthesized,
                    }
                }
                None => self.missing(id),
            },
            MatchOutcome::Ambiguous { candidates } => {
                tracing::warn!(
                    title = %node.title,
                    candidates = %candidates.join(", "),
                    "ambiguous match; inserting placeholder"
                );
                self.placeholder(id);
                self.diagnostics.push(Diagnostic::ambiguous(
                    node.title.clone(),
                    node.slug.clone(),
                    candidates.clone(),
                ));
                SectionStatus::Ambiguous { candidates }
            }
            MatchOutcome::NoMatch => self.missing(id),
        };
        self.report(id, status);

        for child in tree.children(id) {
            self.visit(*child);
        }
    }

    /// Bullets under the TOC node are already in the TOC block; headings
    /// nested there are sections and get visited like any other.
    fn visit_toc_listing(&mut self, id: NodeId) {
        let tree = self.tree;
        for child in tree.children(id) {
            if tree.node(*child).kind == EntryKind::ListItem {
                self.report(*child, SectionStatus::CoveredByToc);
                self.visit_toc_listing(*child);
            } else {
                self.visit(*child);
            }
        }
    }

    fn missing(&mut self, id: NodeId) -> SectionStatus {
        let tree = self.tree;
        let node = tree.node(id);
        tracing::warn!(title = %node.title, "no file matches title; inserting placeholder");
        self.placeholder(id);
        self.diagnostics
            .push(Diagnostic::unmatched(node.title.clone(), node.slug.clone()));
        SectionStatus::Missing
    }

    fn placeholder(&mut self, id: NodeId) {
        let tree = self.tree;
        let node = tree.node(id);
        let marker = format!("<!-- Missing: {} -->", node.title);
        self.pieces.push(inject_anchor(&marker, &node.slug));
    }

    fn claim_anchor(&mut self, slug: &str, title: &str) {
        if !self.anchors.insert(slug.to_string()) {
            tracing::warn!(slug, title, "duplicate anchor; links resolve to the first one");
        }
    }

    fn report(&mut self, id: NodeId, status: SectionStatus) {
        let tree = self.tree;
        let node = tree.node(id);
        self.sections.push(SectionReport {
            slug: node.slug.clone(),
            title: node.title.clone(),
            level: node.level,
            status,
        });
    }

    fn mark_subtree(&mut self, id: NodeId, status: SectionStatus) {
        let tree = self.tree;
        self.report(id, status.clone());
        for child in tree.children(id) {
            self.mark_subtree(*child, status.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_tree;
    use crate::matcher::{MatcherConfig, TieBreak};
    use crate::project::CandidateFile;
    use crate::toc::{DEFAULT_TOC_TITLE, parse_toc};

    fn snapshot(toc: &str, files: &[(&str, &str)]) -> ProjectSnapshot {
        ProjectSnapshot {
            toc_path: PathBuf::from("/work/Table_of_Contents.md"),
            toc_text: toc.to_string(),
            candidates: files
                .iter()
                .map(|(name, body)| CandidateFile {
                    path: PathBuf::from("/work").join(name),
                    file_name: name.to_string(),
                    stem: name.trim_end_matches(".md").to_string(),
                    content: body.to_string(),
                })
                .collect(),
        }
    }

    fn run(toc: &str, files: &[(&str, &str)], selection: &SelectionSet) -> AssembledDocument {
        run_with(toc, files, selection, &Matcher::default())
    }

    fn run_with(
        toc: &str,
        files: &[(&str, &str)],
        selection: &SelectionSet,
        matcher: &Matcher,
    ) -> AssembledDocument {
        let snap = snapshot(toc, files);
        let tree = build_tree(&parse_toc(toc), DEFAULT_TOC_TITLE);
        assemble(
            &tree,
            &snap,
            selection,
            &Metadata::empty(),
            matcher,
            &AssembleOptions { page_breaks: false },
        )
        .unwrap()
    }

    #[test]
    fn excluded_parent_drops_whole_subtree() {
        let toc = "## Part A\n### Detail A\n## Part B\n";
        let files = [
            ("part_a.md", "# Part A\nalpha\n"),
            ("detail_a.md", "# Detail A\nalpha detail\n"),
            ("part_b.md", "# Part B\nbeta\n"),
        ];
        let mut selection = SelectionSet::new();
        selection.exclude("part-a");
        let doc = run(toc, &files, &selection);

        assert!(!doc.markdown.contains("alpha"));
        assert!(!doc.markdown.contains("id=\"detail-a\""));
        assert!(doc.markdown.contains("<a id=\"part-b\"></a>\n\n## Part B\nbeta\n"));
        let statuses: Vec<_> = doc.sections.iter().map(|s| &s.status).collect();
        assert_eq!(statuses[0], &SectionStatus::Excluded);
        assert_eq!(statuses[1], &SectionStatus::Excluded);
        assert_eq!(doc.slugs, vec!["part-a", "detail-a", "part-b"]);
    }

    #[test]
    fn missing_title_yields_placeholder_and_diagnostic() {
        let doc = run("## Appendix\n", &[], &SelectionSet::new());
        assert_eq!(doc.markdown, "<a id=\"appendix\"></a>\n\n<!-- Missing: Appendix -->\n");
        assert_eq!(doc.diagnostics, vec![Diagnostic::unmatched("Appendix", "appendix")]);
        assert_eq!(doc.sections[0].status, SectionStatus::Missing);
    }

    #[test]
    fn toc_children_are_not_inlined() {
        let toc = "## Table of Contents\n- Scope\n## Scope\n";
        let doc = run(toc, &[("scope.md", "Scope text.\n")], &SelectionSet::new());
        assert_eq!(doc.markdown.matches("Scope text.").count(), 1);
        assert!(doc.markdown.contains("- [Scope](#scope)"));
        assert_eq!(doc.sections[1].status, SectionStatus::CoveredByToc);
        assert!(matches!(
            doc.sections[2].status,
            SectionStatus::Inserted { synthesized: true, .. }
        ));
    }

    #[test]
    fn page_breaks_separate_rendered_top_level_sections_only() {
        let toc = "## One\n### One Child\n## Two\n## Three\n";
        let files = [("one.md", "# One\n"), ("two.md", "# Two\n"), ("three.md", "# Three\n")];
        let mut selection = SelectionSet::new();
        selection.exclude("two");
        let snap = snapshot(toc, &files);
        let tree = build_tree(&parse_toc(toc), DEFAULT_TOC_TITLE);
        let doc = assemble(
            &tree,
            &snap,
            &selection,
            &Metadata::empty(),
            &Matcher::default(),
            &AssembleOptions::default(),
        )
        .unwrap();
        assert_eq!(doc.markdown.matches(PAGE_BREAK).count(), 1);
        let brk = doc.markdown.find(PAGE_BREAK).unwrap();
        assert!(doc.markdown.find("id=\"one-child\"").unwrap() < brk);
        assert!(brk < doc.markdown.find("## Three").unwrap());
    }

    #[test]
    fn front_matter_leads_the_document() {
        let snap = snapshot("## One\n", &[("one.md", "# One\n")]);
        let tree = build_tree(&parse_toc("## One\n"), DEFAULT_TOC_TITLE);
        let doc = assemble(
            &tree,
            &snap,
            &SelectionSet::new(),
            &Metadata::default(),
            &Matcher::default(),
            &AssembleOptions::default(),
        )
        .unwrap();
        assert!(doc.markdown.starts_with("---\ntitle: Compiled Document\n"));
        assert!(doc.markdown.contains("---\n\n<a id=\"one\"></a>"));
    }

    #[test]
    fn anchored_nodes_skip_toc_descendants_and_excluded() {
        let toc = "## Intro\n## Table of Contents\n- Intro\n## Old\n### Older\n";
        let tree = build_tree(&parse_toc(toc), DEFAULT_TOC_TITLE);
        let mut selection = SelectionSet::new();
        selection.exclude("old");
        let slugs: Vec<_> = anchored_nodes(&tree, &selection)
            .into_iter()
            .map(|id| tree.node(id).slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["intro", "table-of-contents"]);
    }

    #[test]
    fn headings_nested_under_toc_are_inserted_and_anchored() {
        let toc = "# Table of Contents\n## Introduction\n## Conclusion\n";
        let files = [
            ("introduction.md", "# Introduction\nIntro body.\n"),
            ("conclusion.md", "# Conclusion\nClosing body.\n"),
        ];
        let doc = run(toc, &files, &SelectionSet::new());

        assert!(doc.markdown.contains("<a id=\"introduction\"></a>\n\n## Introduction\nIntro body."));
        assert!(doc.markdown.contains("<a id=\"conclusion\"></a>\n\n## Conclusion\nClosing body."));
        assert!(doc.markdown.contains("## [Introduction](#introduction)"));
        assert!(doc.markdown.contains("## [Conclusion](#conclusion)"));
        assert!(doc.diagnostics.is_empty(), "{:?}", doc.diagnostics);
        assert_eq!(doc.sections[0].status, SectionStatus::Toc);
        assert!(matches!(doc.sections[1].status, SectionStatus::Inserted { .. }));
        assert!(matches!(doc.sections[2].status, SectionStatus::Inserted { .. }));

        let tree = build_tree(&parse_toc(toc), DEFAULT_TOC_TITLE);
        let slugs: Vec<_> = anchored_nodes(&tree, &SelectionSet::new())
            .into_iter()
            .map(|id| tree.node(id).slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["table-of-contents", "introduction", "conclusion"]);
    }

    #[test]
    fn excluded_heading_under_toc_is_skipped() {
        let toc = "# Table of Contents\n- Scope\n## Scope\n## Draft\n";
        let files = [("scope.md", "Scope text.\n"), ("draft.md", "Draft text.\n")];
        let mut selection = SelectionSet::new();
        selection.exclude("draft");
        let doc = run(toc, &files, &selection);

        assert_eq!(doc.markdown.matches("Scope text.").count(), 1);
        assert!(!doc.markdown.contains("Draft text."));
        let statuses: Vec<_> = doc.sections.iter().map(|s| &s.status).collect();
        assert_eq!(statuses[1], &SectionStatus::CoveredByToc);
        assert!(matches!(statuses[2], SectionStatus::Inserted { .. }));
        assert_eq!(statuses[3], &SectionStatus::Excluded);
    }

    #[test]
    fn fragment_front_matter_is_not_inlined() {
        let files = [("intro.md", "---\ntitle: Other\nauthor: Someone\n---\n# Intro\nBody.\n")];
        let doc = run("## Intro\n", &files, &SelectionSet::new());

        assert_eq!(doc.markdown, "<a id=\"intro\"></a>\n\n## Intro\nBody.\n");
        assert!(!doc.markdown.contains("title: Other"));
        assert!(matches!(
            doc.sections[0].status,
            SectionStatus::Inserted { shift: 1, synthesized: false, .. }
        ));
    }

    #[test]
    fn rejected_tie_yields_placeholder_and_ambiguity() {
        let matcher = Matcher::new(MatcherConfig {
            tie_break: TieBreak::Reject,
            ..MatcherConfig::default()
        });
        let files = [("risk_plan.md", "Plan A.\n"), ("plan_risk.md", "Plan B.\n")];
        let doc = run_with("## Risk Update Plan\n", &files, &SelectionSet::new(), &matcher);

        let candidates = vec!["plan_risk.md".to_string(), "risk_plan.md".to_string()];
        assert_eq!(
            doc.markdown,
            "<a id=\"risk-update-plan\"></a>\n\n<!-- Missing: Risk Update Plan -->\n"
        );
        assert_eq!(
            doc.diagnostics,
            vec![Diagnostic::ambiguous(
                "Risk Update Plan",
                "risk-update-plan",
                candidates.clone()
            )]
        );
        assert_eq!(doc.sections[0].status, SectionStatus::Ambiguous { candidates });
    }

    #[test]
    fn near_miss_file_names_are_not_inserted() {
        let files = [
            ("summary.md", "Summary body.\n"),
            ("a.md", "A body.\n"),
            ("raft.md", "Raft body.\n"),
        ];
        let doc = run("## Executive Summary — Draft v2\n", &files, &SelectionSet::new());

        assert!(doc.markdown.contains("<!-- Missing: Executive Summary — Draft v2 -->"));
        assert!(!doc.markdown.contains("body."));
        assert_eq!(doc.sections[0].status, SectionStatus::Missing);
        assert_eq!(doc.diagnostics.len(), 1);
    }
}
