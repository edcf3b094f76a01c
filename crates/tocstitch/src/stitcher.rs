use std::path::PathBuf;

use serde::Serialize;

use crate::assemble::{AssembleOptions, AssembledDocument, SectionReport, SectionStatus, assemble};
use crate::convert::{
    ConversionOutcome, ConversionRequest, Converter, DEFAULT_TOC_DEPTH, EnginePreference,
};
use crate::error::{Diagnostic, StitchError};
use crate::front_matter::Metadata;
use crate::hierarchy::build_tree;
use crate::matcher::{Matcher, MatcherConfig};
use crate::output::{WriteMode, write_document};
use crate::project::{ProjectPaths, ProjectSnapshot};
use crate::selection::SelectionSet;
use crate::settings::ProjectSettings;
use crate::toc::{DEFAULT_TOC_TITLE, TocEntry, parse_toc, read_toc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub filename: String,
    pub mode: WriteMode,
    pub engine: EnginePreference,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let defaults = crate::settings::OutputSettings::default();
        Self {
            filename: defaults.filename,
            mode: defaults.mode,
            engine: defaults.pdf_engine_preference,
        }
    }
}

/// Everything one build pass needs besides the working directory.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildRequest {
    pub selection: SelectionSet,
    /// Overrides layered on top of [`Metadata::default`].
    pub metadata: Metadata,
    pub output: OutputConfig,
    pub toc_title: String,
    pub page_breaks: bool,
    pub matcher: MatcherConfig,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            selection: SelectionSet::new(),
            metadata: Metadata::empty(),
            output: OutputConfig::default(),
            toc_title: DEFAULT_TOC_TITLE.to_string(),
            page_breaks: true,
            matcher: MatcherConfig::default(),
        }
    }
}

impl BuildRequest {
    pub fn from_settings(settings: &ProjectSettings) -> Self {
        Self {
            selection: settings.selection_set(),
            metadata: settings.metadata.clone(),
            output: OutputConfig {
                filename: settings.output.filename.clone(),
                mode: settings.output.mode,
                engine: settings.output.pdf_engine_preference,
            },
            toc_title: settings.toc.title.clone(),
            page_breaks: settings.toc.page_breaks,
            matcher: settings.matcher.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildReport {
    pub output_path: PathBuf,
    pub bytes_written: u64,
    pub diagnostics: Vec<Diagnostic>,
    pub slugs: Vec<String>,
    pub sections: Vec<SectionReport>,
}

/// One row of the outline: the settings flag plus what a build would do.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutlineItem {
    pub slug: String,
    pub title: String,
    pub level: u8,
    pub include: bool,
    #[serde(flatten)]
    pub status: SectionStatus,
}

/// Entry point tying the snapshot, assembler, writer and converter together
/// for one working directory. Holds no state between builds.
#[derive(Clone, Debug)]
pub struct Stitcher {
    paths: ProjectPaths,
}

impl Stitcher {
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Parsed TOC entries, in TOC order.
    pub fn entries(&self) -> Result<Vec<TocEntry>, StitchError> {
        let text = read_toc(&self.paths.toc_path())?;
        Ok(parse_toc(&text))
    }

    /// Assembles the document in memory without writing it.
    pub fn preview(&self, request: &BuildRequest) -> Result<AssembledDocument, StitchError> {
        let paths = self
            .paths
            .clone()
            .with_output_file(request.output.filename.clone());
        let snapshot = ProjectSnapshot::load(&paths)?;
        let entries = parse_toc(&snapshot.toc_text);
        if entries.is_empty() {
            tracing::warn!(toc = %snapshot.toc_path.display(), "table of contents has no headings");
        }
        let tree = build_tree(&entries, &request.toc_title);
        let matcher = Matcher::new(request.matcher.clone());
        let metadata = Metadata::default().merged_with(&request.metadata);
        assemble(
            &tree,
            &snapshot,
            &request.selection,
            &metadata,
            &matcher,
            &AssembleOptions {
                page_breaks: request.page_breaks,
            },
        )
    }

    /// Runs one build pass and writes the result.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport, StitchError> {
        let document = self.preview(request)?;
        let target = self.paths.root().join(&request.output.filename);
        let written = write_document(&target, &document.markdown, request.output.mode)?;

        if !document.diagnostics.is_empty() {
            tracing::warn!(
                count = document.diagnostics.len(),
                "build finished with unresolved titles"
            );
        }

        Ok(BuildReport {
            output_path: written.path,
            bytes_written: written.bytes_written,
            diagnostics: document.diagnostics,
            slugs: document.slugs,
            sections: document.sections,
        })
    }

    pub fn outline(&self, request: &BuildRequest) -> Result<Vec<OutlineItem>, StitchError> {
        let document = self.preview(request)?;
        Ok(document
            .sections
            .into_iter()
            .map(|section| OutlineItem {
                include: request.selection.is_included(&section.slug),
                slug: section.slug,
                title: section.title,
                level: section.level,
                status: section.status,
            })
            .collect())
    }

    /// Converts a written document with the engine and `toc-depth` of the
    /// request that built it. The Markdown stays valid whatever the outcome.
    pub fn convert(
        &self,
        request: &BuildRequest,
        report: &BuildReport,
        converter: &dyn Converter,
    ) -> Result<ConversionOutcome, StitchError> {
        let metadata = Metadata::default().merged_with(&request.metadata);
        let mut conversion =
            ConversionRequest::for_document(&report.output_path, request.output.engine);
        conversion.resource_dir = self.paths.root().to_path_buf();
        conversion.toc_depth = toc_depth(&metadata);
        converter.convert(&conversion)
    }
}

/// `toc-depth` from the metadata, clamped to heading levels.
fn toc_depth(metadata: &Metadata) -> u8 {
    match metadata
        .get_str("toc-depth")
        .and_then(|depth| depth.trim().parse::<u8>().ok())
    {
        Some(depth) => depth.clamp(1, 6),
        None => {
            tracing::debug!("toc-depth missing or not a number; using default");
            DEFAULT_TOC_DEPTH
        }
    }
}
