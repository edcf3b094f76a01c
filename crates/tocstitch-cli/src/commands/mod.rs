use serde::Serialize;
use tocstitch::{BuildReport, OutlineItem, ReconcileSummary};

use crate::error::ExitStatus;

pub mod build;
pub mod init;
pub mod outline;
pub mod schema;
pub mod select;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    SettingsInitialized {
        settings_path: String,
        created: bool,
        entries: usize,
        changes: ReconcileSummary,
    },
    Outline {
        items: Vec<OutlineItem>,
    },
    SelectionUpdated {
        settings_path: String,
        include: bool,
        slugs: Vec<String>,
    },
    Built {
        output_path: String,
        report: BuildReport,
        conversion: build::ConversionSummary,
    },
    Schema {
        schema: serde_json::Value,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            CommandResult::Built { conversion, .. } => conversion.exit_status(),
            _ => ExitStatus::Ok,
        }
    }
}
