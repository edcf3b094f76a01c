use clap::{ArgMatches, Command};

use crate::commands::CommandResult;
use crate::error::CliError;

pub fn command() -> Command {
    Command::new("schema").about("Print the JSON schema of stitcher_settings.yaml")
}

pub fn run(_matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let schema = tocstitch::settings_schema()?;
    Ok(CommandResult::Schema { schema })
}
