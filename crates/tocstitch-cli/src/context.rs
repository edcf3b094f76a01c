use std::env;
use std::path::PathBuf;

use tocstitch::{ProjectPaths, ProjectSettings, Stitcher, TocEntry};

use crate::error::CliError;
use crate::util::Verbosity;

/// Per-invocation state shared by every command. Settings are read once
/// here and handed to commands explicitly.
pub struct CliSession {
    pub paths: ProjectPaths,
    /// `None` until `init` or the first `build` writes the settings file.
    pub settings: Option<ProjectSettings>,
    pub verbosity: Verbosity,
}

impl CliSession {
    pub fn bootstrap(dir_override: Option<String>, verbosity: Verbosity) -> Result<Self, CliError> {
        let start = match dir_override {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir()?,
        };
        let paths = ProjectPaths::discover(&start)?;
        let settings = ProjectSettings::load(&paths.settings_path())?;

        let paths = match &settings {
            Some(settings) => paths
                .with_toc_file(settings.toc.file.clone())
                .with_output_file(settings.output.filename.clone()),
            None => paths,
        };

        Ok(Self {
            paths,
            settings,
            verbosity,
        })
    }

    pub fn stitcher(&self) -> Stitcher {
        Stitcher::new(self.paths.clone())
    }

    pub fn entries(&self) -> Result<Vec<TocEntry>, CliError> {
        Ok(self.stitcher().entries()?)
    }

    /// Stored settings reconciled against the current TOC, or fresh
    /// defaults when none exist yet.
    pub fn reconciled_settings(&self, entries: &[TocEntry]) -> ProjectSettings {
        match &self.settings {
            Some(settings) => {
                let mut settings = settings.clone();
                settings.reconcile(entries);
                settings
            }
            None => ProjectSettings::from_entries(entries),
        }
    }

    pub fn save_settings(&self, settings: &ProjectSettings) -> Result<PathBuf, CliError> {
        let path = self.paths.settings_path();
        settings.save(&path)?;
        Ok(path)
    }
}
