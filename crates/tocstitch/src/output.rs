use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::StitchError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Overwrite,
    /// Writes `<stem>_YYYYMMDD-HHMMSS.md` beside the configured output.
    Timestamped,
    /// Adds the document after any existing content.
    Append,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Timestamped => "timestamped",
            WriteMode::Append => "append",
        }
    }
}

impl std::str::FromStr for WriteMode {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(WriteMode::Overwrite),
            "timestamped" | "timestamp" => Ok(WriteMode::Timestamped),
            "append" => Ok(WriteMode::Append),
            other => Err(StitchError::Settings(format!("unknown write mode '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WrittenDocument {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Writes the compiled document according to `mode`.
pub fn write_document(
    target: &Path,
    markdown: &str,
    mode: WriteMode,
) -> Result<WrittenDocument, StitchError> {
    write_document_at(target, markdown, mode, Local::now())
}

pub fn write_document_at(
    target: &Path,
    markdown: &str,
    mode: WriteMode,
    now: DateTime<Local>,
) -> Result<WrittenDocument, StitchError> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }

    let (path, bytes_written) = match mode {
        WriteMode::Overwrite => {
            fs::write(target, markdown)?;
            (target.to_path_buf(), markdown.len() as u64)
        }
        WriteMode::Timestamped => {
            let path = timestamped_path(target, now);
            fs::write(&path, markdown)?;
            (path, markdown.len() as u64)
        }
        WriteMode::Append => {
            let separator = append_separator(target)?;
            let mut file = OpenOptions::new().create(true).append(true).open(target)?;
            file.write_all(separator.as_bytes())?;
            file.write_all(markdown.as_bytes())?;
            (target.to_path_buf(), (separator.len() + markdown.len()) as u64)
        }
    };

    let len = fs::metadata(&path)?.len();
    if len == 0 {
        return Err(StitchError::Output(format!(
            "markdown write produced an empty file: {}",
            path.display()
        )));
    }

    tracing::info!(path = %path.display(), bytes = bytes_written, mode = mode.as_str(), "wrote document");
    Ok(WrittenDocument {
        path,
        bytes_written,
    })
}

/// `<dir>/<stem>_YYYYMMDD-HHMMSS.md` for the given output path.
pub fn timestamped_path(target: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = format!("{stem}_{}.md", now.format("%Y%m%d-%H%M%S"));
    target.with_file_name(name)
}

/// Blank line between existing content and the appended document.
fn append_separator(target: &Path) -> Result<&'static str, StitchError> {
    let existing = match fs::read_to_string(target) {
        Ok(existing) => existing,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(""),
        Err(err) => return Err(err.into()),
    };
    Ok(if existing.is_empty() || existing.ends_with("\n\n") {
        ""
    } else if existing.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    })
}
