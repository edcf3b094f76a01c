use clap::{ArgMatches, Command};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;
use crate::util::display_relative;

pub fn command() -> Command {
    Command::new("init").about(
        "Create stitcher_settings.yaml from the table of contents, or reconcile an existing one",
    )
}

pub fn run(session: &CliSession, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let entries = session.entries()?;
    let created = session.settings.is_none();

    let (settings, changes) = match &session.settings {
        Some(existing) => {
            let mut settings = existing.clone();
            let changes = settings.reconcile(&entries);
            (settings, changes)
        }
        None => {
            let settings = tocstitch::ProjectSettings::from_entries(&entries);
            let changes = tocstitch::ReconcileSummary {
                added: settings.selections.iter().map(|row| row.slug.clone()).collect(),
                removed: Vec::new(),
            };
            (settings, changes)
        }
    };

    let path = session.save_settings(&settings)?;
    Ok(CommandResult::SettingsInitialized {
        settings_path: display_relative(session.paths.root(), &path),
        created,
        entries: settings.selections.len(),
        changes,
    })
}
