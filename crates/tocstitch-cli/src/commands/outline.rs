use clap::{ArgMatches, Command};
use tocstitch::BuildRequest;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;

pub fn command() -> Command {
    Command::new("outline")
        .about("Show the TOC tree with slugs, include flags and the file each title resolves to")
}

pub fn run(session: &CliSession, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let entries = session.entries()?;
    let settings = session.reconciled_settings(&entries);
    let request = BuildRequest::from_settings(&settings);
    let items = session.stitcher().outline(&request)?;
    Ok(CommandResult::Outline { items })
}
