use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::util::display_relative;

pub fn command() -> Command {
    Command::new("select")
        .about("Include or exclude sections by slug; excluding a section drops its subtree")
        .arg(
            Arg::new("slug")
                .value_name("SLUG")
                .required(true)
                .num_args(1..)
                .help("Slugs as printed by `outline`."),
        )
        .arg(
            Arg::new("include")
                .long("include")
                .action(ArgAction::SetTrue)
                .help("Include the sections in future builds."),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .action(ArgAction::SetTrue)
                .help("Leave the sections out of future builds."),
        )
        .group(
            ArgGroup::new("flag")
                .args(["include", "exclude"])
                .required(true),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let include = matches.get_flag("include");
    let slugs: Vec<String> = matches
        .get_many::<String>("slug")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let entries = session.entries()?;
    let mut settings = session.reconciled_settings(&entries);
    for slug in &slugs {
        settings
            .apply_selection(slug, include)
            .map_err(|err| CliError::new(err.to_string(), ExitStatus::Usage))?;
    }

    let path = session.save_settings(&settings)?;
    Ok(CommandResult::SelectionUpdated {
        settings_path: display_relative(session.paths.root(), &path),
        include,
        slugs,
    })
}
