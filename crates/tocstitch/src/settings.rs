use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::convert::EnginePreference;
use crate::error::StitchError;
use crate::front_matter::Metadata;
use crate::matcher::MatcherConfig;
use crate::output::WriteMode;
use crate::project::DEFAULT_OUTPUT_FILE;
use crate::selection::SelectionSet;
use crate::slug::slugify_or;
use crate::toc::{DEFAULT_TOC_FILE, DEFAULT_TOC_TITLE, TocEntry};

pub const SETTINGS_VERSION: u32 = 1;

/// Per-project settings persisted as `stitcher_settings.yaml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProjectSettings {
    pub version: u32,
    /// One row per TOC slug, in TOC order.
    pub selections: Vec<SelectionEntry>,
    /// Front matter keys for the compiled document.
    pub metadata: Metadata,
    pub output: OutputSettings,
    pub toc: TocSettings,
    pub matcher: MatcherConfig,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            selections: Vec::new(),
            metadata: Metadata::default(),
            output: OutputSettings::default(),
            toc: TocSettings::default(),
            matcher: MatcherConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SelectionEntry {
    pub slug: String,
    pub title: String,
    pub level: u8,
    pub include: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutputSettings {
    pub filename: String,
    pub mode: WriteMode,
    pub pdf_engine_preference: EnginePreference,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            filename: DEFAULT_OUTPUT_FILE.to_string(),
            mode: WriteMode::default(),
            pdf_engine_preference: EnginePreference::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TocSettings {
    pub file: String,
    /// Title of the TOC's own entry, where the linkified TOC is inserted.
    pub title: String,
    pub page_breaks: bool,
}

impl Default for TocSettings {
    fn default() -> Self {
        Self {
            file: DEFAULT_TOC_FILE.to_string(),
            title: DEFAULT_TOC_TITLE.to_string(),
            page_breaks: true,
        }
    }
}

/// Changes made by [`ProjectSettings::reconcile`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl ProjectSettings {
    /// Fresh settings with every entry included.
    pub fn from_entries(entries: &[TocEntry]) -> Self {
        let mut settings = Self::default();
        settings.reconcile(entries);
        settings
    }

    /// Loads settings; `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, StitchError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let settings: ProjectSettings = serde_yaml::from_str(&raw).map_err(|err| {
            StitchError::Settings(format!("failed to parse {}: {err}", path.display()))
        })?;
        if settings.version > SETTINGS_VERSION {
            return Err(StitchError::Settings(format!(
                "{} has version {}, newest supported is {SETTINGS_VERSION}",
                path.display(),
                settings.version
            )));
        }
        Ok(Some(settings))
    }

    pub fn save(&self, path: &Path) -> Result<(), StitchError> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|err| StitchError::from(err).context("serialize settings"))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Aligns the selection rows with the current TOC: known slugs keep their
    /// include flag, new slugs are included, vanished slugs are dropped, and
    /// titles and levels are refreshed. Rows follow TOC order.
    pub fn reconcile(&mut self, entries: &[TocEntry]) -> ReconcileSummary {
        let previous: BTreeMap<String, bool> = self
            .selections
            .iter()
            .map(|row| (row.slug.clone(), row.include))
            .collect();

        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(entries.len());
        let mut summary = ReconcileSummary::default();
        for (index, entry) in entries.iter().enumerate() {
            let slug = slugify_or(&entry.title, index + 1);
            if !seen.insert(slug.clone()) {
                continue;
            }
            let include = match previous.get(&slug) {
                Some(include) => *include,
                None => {
                    summary.added.push(slug.clone());
                    true
                }
            };
            rows.push(SelectionEntry {
                slug,
                title: entry.title.clone(),
                level: entry.level,
                include,
            });
        }

        summary.removed = previous
            .keys()
            .filter(|slug| !seen.contains(*slug))
            .cloned()
            .collect();
        if !summary.removed.is_empty() {
            tracing::info!(removed = ?summary.removed, "dropping selections no longer in the TOC");
        }

        self.selections = rows;
        summary
    }

    pub fn selection_set(&self) -> SelectionSet {
        self.selections
            .iter()
            .map(|row| (row.slug.clone(), row.include))
            .collect()
    }

    pub fn apply_selection(&mut self, slug: &str, include: bool) -> Result<(), StitchError> {
        let row = self
            .selections
            .iter_mut()
            .find(|row| row.slug == slug)
            .ok_or_else(|| StitchError::Settings(format!("unknown slug '{slug}'")))?;
        row.include = include;
        Ok(())
    }
}

/// JSON schema describing the settings file.
pub fn settings_schema() -> Result<serde_json::Value, StitchError> {
    Ok(serde_json::to_value(schemars::schema_for!(ProjectSettings))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entries(titles: &[(u8, &str)]) -> Vec<TocEntry> {
        titles
            .iter()
            .map(|(level, title)| TocEntry::heading(*level, *title))
            .collect()
    }

    #[test]
    fn fresh_settings_include_everything() {
        let settings = ProjectSettings::from_entries(&entries(&[(2, "Intro"), (3, "Detail")]));
        assert_eq!(settings.selections.len(), 2);
        assert!(settings.selections.iter().all(|row| row.include));
        assert_eq!(settings.output.filename, "my_doc.md");
        assert_eq!(settings.toc.title, "Table of Contents");
    }

    #[test]
    fn reconcile_keeps_flags_adds_and_drops_by_slug() {
        let mut settings = ProjectSettings::from_entries(&entries(&[(2, "Intro"), (2, "Old Part")]));
        settings.apply_selection("intro", false).unwrap();

        let summary = settings.reconcile(&entries(&[(2, "New Part"), (3, "Intro!")]));
        assert_eq!(summary.added, vec!["new-part"]);
        assert_eq!(summary.removed, vec!["old-part"]);

        let rows: Vec<_> = settings
            .selections
            .iter()
            .map(|r| (r.slug.as_str(), r.title.as_str(), r.level, r.include))
            .collect();
        assert_eq!(
            rows,
            vec![("new-part", "New Part", 2, true), ("intro", "Intro!", 3, false)]
        );
    }

    #[test]
    fn unknown_slug_cannot_be_selected() {
        let mut settings = ProjectSettings::from_entries(&entries(&[(2, "Intro")]));
        let err = settings.apply_selection("nope", true).unwrap_err();
        assert!(matches!(err, StitchError::Settings(_)));
    }

    #[test]
    fn save_and_load_preserve_settings() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("stitcher_settings.yaml");
        assert_eq!(ProjectSettings::load(&path).unwrap(), None);

        let mut settings = ProjectSettings::from_entries(&entries(&[(2, "Intro")]));
        settings.output.mode = WriteMode::Timestamped;
        settings.metadata.set("author", "Ada");
        settings.save(&path).unwrap();

        let loaded = ProjectSettings::load(&path).unwrap().unwrap();
        assert_eq!(loaded, settings);
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("mode: timestamped"));
        assert!(raw.contains("pdf_engine_preference: auto"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("stitcher_settings.yaml");
        fs::write(&path, "output:\n  filename: handbook.md\n").unwrap();
        let loaded = ProjectSettings::load(&path).unwrap().unwrap();
        assert_eq!(loaded.output.filename, "handbook.md");
        assert_eq!(loaded.output.mode, WriteMode::Overwrite);
        assert!(loaded.toc.page_breaks);
    }

    #[test]
    fn malformed_file_is_a_settings_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("stitcher_settings.yaml");
        fs::write(&path, "selections: [unterminated\n").unwrap();
        assert!(matches!(
            ProjectSettings::load(&path).unwrap_err(),
            StitchError::Settings(_)
        ));
    }

    #[test]
    fn schema_describes_top_level_sections() {
        let schema = settings_schema().unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for key in ["version", "selections", "metadata", "output", "toc", "matcher"] {
            assert!(properties.contains_key(key), "{key}");
        }
    }
}
