use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tocstitch::{BuildRequest, EnginePreference, StitchError, WriteMode, converter_for};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};
use crate::util::display_relative;

/// Result of the optional conversion step after the Markdown was written.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionSummary {
    Skipped,
    Converted { output: String, engine: String },
    Unavailable { message: String },
    Failed { message: String },
}

impl ConversionSummary {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            ConversionSummary::Skipped | ConversionSummary::Converted { .. } => ExitStatus::Ok,
            ConversionSummary::Unavailable { .. } => ExitStatus::Unavailable,
            ConversionSummary::Failed { .. } => ExitStatus::Software,
        }
    }
}

pub fn command() -> Command {
    Command::new("build")
        .about("Stitch the fragments into one document and optionally convert it")
        .arg(
            Arg::new("output")
                .long("output")
                .value_name("NAME")
                .help("Output file name for this build. Defaults to output.filename in the settings."),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_name("MODE")
                .value_parser(["overwrite", "timestamped", "append"])
                .help("How the output file is written for this build."),
        )
        .arg(
            Arg::new("engine")
                .long("engine")
                .value_name("ENGINE")
                .value_parser(["auto", "xelatex", "wkhtmltopdf", "html"])
                .help("Conversion engine for this build. `html` renders in-process."),
        )
        .arg(
            Arg::new("no-convert")
                .long("no-convert")
                .action(ArgAction::SetTrue)
                .help("Only write the Markdown document."),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let entries = session.entries()?;
    let settings = session.reconciled_settings(&entries);

    let mut request = BuildRequest::from_settings(&settings);
    if let Some(output) = matches.get_one::<String>("output") {
        request.output.filename = output.clone();
    }
    if let Some(mode) = matches.get_one::<String>("mode") {
        request.output.mode = mode.parse::<WriteMode>()?;
    }
    if let Some(engine) = matches.get_one::<String>("engine") {
        request.output.engine = engine.parse::<EnginePreference>()?;
    }

    let stitcher = session.stitcher();
    let report = stitcher.build(&request)?;
    session.save_settings(&settings)?;

    let conversion = if matches.get_flag("no-convert") {
        ConversionSummary::Skipped
    } else {
        let converter = converter_for(request.output.engine);
        match stitcher.convert(&request, &report, converter.as_ref()) {
            Ok(outcome) => ConversionSummary::Converted {
                output: display_relative(session.paths.root(), &outcome.output),
                engine: outcome.engine,
            },
            Err(err @ StitchError::ConversionUnavailable { .. }) => {
                tracing::warn!(error = %err, "conversion skipped");
                ConversionSummary::Unavailable {
                    message: err.to_string(),
                }
            }
            Err(err @ StitchError::ConversionFailed { .. }) => ConversionSummary::Failed {
                message: err.to_string(),
            },
            Err(err) => return Err(err.into()),
        }
    };

    Ok(CommandResult::Built {
        output_path: display_relative(session.paths.root(), &report.output_path),
        report,
        conversion,
    })
}
