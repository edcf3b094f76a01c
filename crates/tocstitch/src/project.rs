use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use regex::Regex;

use crate::error::StitchError;
use crate::syntax::normalize_newlines;
use crate::toc::{DEFAULT_TOC_FILE, read_toc};

/// Default file name of the compiled document.
pub const DEFAULT_OUTPUT_FILE: &str = "my_doc.md";
/// Settings file kept beside the fragments.
pub const SETTINGS_FILE: &str = "stitcher_settings.yaml";

/// Canonical paths inside a working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
    toc_file: String,
    output_file: String,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            toc_file: DEFAULT_TOC_FILE.to_string(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }

    /// Resolves `start` to an existing, canonical directory.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, StitchError> {
        let start = start.as_ref();
        if !start.is_dir() {
            return Err(StitchError::Workspace(format!(
                "working directory {} does not exist",
                start.display()
            )));
        }
        Ok(Self::new(fs::canonicalize(start)?))
    }

    pub fn with_toc_file(mut self, name: impl Into<String>) -> Self {
        self.toc_file = name.into();
        self
    }

    pub fn with_output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn toc_path(&self) -> PathBuf {
        self.root.join(&self.toc_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn toc_file(&self) -> &str {
        &self.toc_file
    }

    pub fn output_file(&self) -> &str {
        &self.output_file
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub file_name: String,
    pub stem: String,
    pub content: String,
}

/// Everything a build reads from disk, captured once up front.
#[derive(Clone, Debug)]
pub struct ProjectSnapshot {
    pub toc_path: PathBuf,
    pub toc_text: String,
    pub candidates: Vec<CandidateFile>,
}

impl ProjectSnapshot {
    /// Reads the TOC and every candidate fragment. A missing TOC is fatal;
    /// an unreadable fragment is logged and skipped.
    pub fn load(paths: &ProjectPaths) -> Result<Self, StitchError> {
        let toc_path = paths.toc_path();
        let toc_text = read_toc(&toc_path)?;

        let mut candidates = Vec::new();
        for path in candidate_paths(paths) {
            let content = match fs::read_to_string(&path) {
                Ok(content) => normalize_newlines(&content),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable fragment");
                    continue;
                }
            };
            let (Some(file_name), Some(stem)) = (path.file_name(), path.file_stem()) else {
                continue;
            };
            candidates.push(CandidateFile {
                file_name: file_name.to_string_lossy().into_owned(),
                stem: stem.to_string_lossy().into_owned(),
                path,
                content,
            });
        }

        tracing::debug!(
            toc = %toc_path.display(),
            candidates = candidates.len(),
            "loaded project snapshot"
        );
        Ok(Self {
            toc_path,
            toc_text,
            candidates,
        })
    }

    pub fn candidate(&self, path: &Path) -> Option<&CandidateFile> {
        self.candidates.iter().find(|c| c.path == path)
    }
}

/// `*.md` files directly inside the root, sorted by file name, without the
/// TOC, the output file or timestamped copies of the output.
pub fn candidate_paths(paths: &ProjectPaths) -> Vec<PathBuf> {
    let timestamped = timestamped_output_pattern(paths.output_file());

    let walker = WalkBuilder::new(paths.root())
        .max_depth(Some(1))
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .build();

    let mut found: Vec<PathBuf> = walker
        .filter_map(|result| match result {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            let is_markdown = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
            is_markdown
                && name != paths.toc_file()
                && name != paths.output_file()
                && !timestamped.as_ref().is_some_and(|re| re.is_match(name))
        })
        .collect();

    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    found
}

fn timestamped_output_pattern(output_file: &str) -> Option<Regex> {
    let stem = Path::new(output_file).file_stem()?.to_str()?;
    Regex::new(&format!(r"^{}_\d{{8}}-\d{{6}}\.md$", regex::escape(stem))).ok()
}
