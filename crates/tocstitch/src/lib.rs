pub mod align;
pub mod assemble;
pub mod convert;
pub mod error;
pub mod front_matter;
pub mod hierarchy;
pub mod linkify;
pub mod matcher;
pub mod output;
pub mod project;
pub mod selection;
pub mod settings;
pub mod slug;
pub mod stitcher;
mod syntax;
pub mod toc;

pub use align::{AlignedFragment, HeadingStats, align_fragment, analyze_headings};
pub use assemble::{
    AssembleOptions, AssembledDocument, PAGE_BREAK, SectionReport, SectionStatus, anchored_nodes,
    assemble,
};
pub use convert::{
    ConversionOutcome, ConversionRequest, Converter, DEFAULT_TOC_DEPTH, EnginePreference,
    HtmlConverter, PandocConverter, converter_for,
};
pub use error::{Diagnostic, DiagnosticKind, StitchError};
pub use front_matter::Metadata;
pub use hierarchy::{NodeId, TocNode, TocTree, build_tree};
pub use linkify::{LinkTarget, anchor, inject_anchor, linkify_toc};
pub use matcher::{
    CandidateIndex, Containment, MIN_CONTAINMENT_SCORE, MatchKey, MatchOutcome, MatchStrategy,
    Matcher, MatcherConfig, NormalizedExact, ScoredMatch, TieBreak, TokenOverlap,
};
pub use output::{WriteMode, WrittenDocument, write_document};
pub use project::{
    CandidateFile, DEFAULT_OUTPUT_FILE, ProjectPaths, ProjectSnapshot, SETTINGS_FILE,
};
pub use selection::SelectionSet;
pub use settings::{ProjectSettings, ReconcileSummary, SelectionEntry, settings_schema};
pub use slug::{slugify, slugify_or};
pub use stitcher::{BuildReport, BuildRequest, OutlineItem, OutputConfig, Stitcher};
pub use toc::{DEFAULT_TOC_FILE, DEFAULT_TOC_TITLE, EntryKind, TocEntry, parse_toc, read_toc};
