use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use crate::commands;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::formatter::{OutputFormat, emit_result};
use crate::util::Verbosity;

const NAME: &str = "tocstitch";

pub fn run() -> ExitCode {
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses arguments, resolves the working directory and dispatches to the
/// subcommand. Returns a `sysexits`-compatible exit code.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;

    let verbosity = Verbosity {
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
    };
    init_tracing(verbosity.verbose);
    let output = if verbosity.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // `schema` describes the settings format and needs no working directory.
    if let Some(("schema", sub)) = matches.subcommand() {
        return emit_result(commands::schema::run(sub)?, output);
    }

    let dir_override = matches.get_one::<String>("dir").cloned();
    let session = CliSession::bootstrap(dir_override, verbosity)?;
    if session.verbosity.verbose {
        tracing::info!(
            root = %session.paths.root().display(),
            toc = %session.paths.toc_path().display(),
            settings = %session.paths.settings_path().display(),
            "resolved working directory"
        );
    }

    let result = dispatch(&session, &matches)?;
    emit_result(result, output)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Stitch Markdown fragments into one document, ordered by a table of contents")
        .arg(
            Arg::new("dir")
                .long("dir")
                .global(true)
                .value_name("PATH")
                .help("Working directory holding the fragments and Table_of_Contents.md. Defaults to the current directory."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit JSON instead of human-readable text."),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log each inserted section, match tier and heading shift to stderr."),
        )
        .subcommand_required(true)
        .subcommand(commands::init::command())
        .subcommand(commands::outline::command())
        .subcommand(commands::select::command())
        .subcommand(commands::build::command())
        .subcommand(commands::schema::command())
}

fn dispatch(
    session: &CliSession,
    matches: &ArgMatches,
) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("init", sub)) => commands::init::run(session, sub),
        Some(("outline", sub)) => commands::outline::run(session, sub),
        Some(("select", sub)) => commands::select::run(session, sub),
        Some(("build", sub)) => commands::build::run(session, sub),
        _ => Err(CliError::new("missing command", ExitStatus::Usage)),
    }
}
