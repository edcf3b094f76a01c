use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// High-level error type shared across stitcher components.
///
/// Only failures that abort a build live here. Per-title problems discovered
/// while assembling are collected as [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("table of contents not found at {path}: {source}")]
    MissingToc {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("settings error: {0}")]
    Settings(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("output error: {0}")]
    Output(String),
    #[error("{tool} is not available: {guidance}")]
    ConversionUnavailable { tool: String, guidance: String },
    #[error("conversion via {engine} failed: {message}")]
    ConversionFailed { engine: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StitchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StitchError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl StitchError {
    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            StitchError::Workspace(msg) => StitchError::Workspace(format!("{ctx}: {msg}")),
            StitchError::Settings(msg) => StitchError::Settings(format!("{ctx}: {msg}")),
            StitchError::Serialization(msg) => {
                StitchError::Serialization(format!("{ctx}: {msg}"))
            }
            StitchError::Output(msg) => StitchError::Output(format!("{ctx}: {msg}")),
            StitchError::ConversionFailed { engine, message } => StitchError::ConversionFailed {
                engine,
                message: format!("{ctx}: {message}"),
            },
            other => other,
        }
    }
}

/// Non-fatal problem recorded for a single TOC title during assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnmatchedTitle,
    AmbiguousMatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub title: String,
    pub slug: String,
    /// File names that tied when the match was ambiguous.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl Diagnostic {
    pub fn unmatched(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::UnmatchedTitle,
            title: title.into(),
            slug: slug.into(),
            candidates: Vec::new(),
        }
    }

    pub fn ambiguous(
        title: impl Into<String>,
        slug: impl Into<String>,
        candidates: Vec<String>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::AmbiguousMatch,
            title: title.into(),
            slug: slug.into(),
            candidates,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::UnmatchedTitle => write!(f, "no file matches '{}'", self.title),
            DiagnosticKind::AmbiguousMatch => write!(
                f,
                "'{}' matches several files equally well: {}",
                self.title,
                self.candidates.join(", ")
            ),
        }
    }
}
