use std::process::ExitCode;

use serde_json::json;
use tocstitch::{OutlineItem, SectionStatus};

use crate::commands::CommandResult;
use crate::commands::build::ConversionSummary;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a `CommandResult` as human-readable text or a single JSON line and maps the
/// outcome onto the process exit code.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => print_json(&result)?,
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) {
    match result {
        CommandResult::SettingsInitialized {
            settings_path,
            created,
            entries,
            changes,
        } => {
            if *created {
                println!("Created settings at {settings_path} ({entries} sections)");
            } else if changes.is_empty() {
                println!("Settings at {settings_path} already match the table of contents");
            } else {
                println!(
                    "Reconciled settings at {settings_path} (+{} / -{})",
                    changes.added.len(),
                    changes.removed.len()
                );
                for slug in &changes.added {
                    println!("  + {slug}");
                }
                for slug in &changes.removed {
                    println!("  - {slug}");
                }
            }
        }
        CommandResult::Outline { items } => {
            println!("Outline ({} sections):", items.len());
            for item in items {
                print_outline_item(item);
            }
        }
        CommandResult::SelectionUpdated {
            settings_path,
            include,
            slugs,
        } => {
            let verb = if *include { "Included" } else { "Excluded" };
            println!("{verb} {} (saved to {settings_path})", slugs.join(", "));
        }
        CommandResult::Built {
            output_path,
            report,
            conversion,
        } => {
            println!("Wrote {output_path} ({} bytes)", report.bytes_written);
            for diagnostic in &report.diagnostics {
                println!("  [WARN] {diagnostic}");
            }
            match conversion {
                ConversionSummary::Skipped => {}
                ConversionSummary::Converted { output, engine } => {
                    println!("Converted to {output} with {engine}");
                }
                ConversionSummary::Unavailable { message } => {
                    println!("Conversion unavailable: {message}");
                }
                ConversionSummary::Failed { message } => {
                    println!("Conversion failed: {message}");
                }
            }
        }
        CommandResult::Schema { schema } => {
            let rendered =
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
            println!("{rendered}");
        }
    }
}

fn print_outline_item(item: &OutlineItem) {
    let indent = "  ".repeat(usize::from(item.level.max(1)));
    let mark = if item.include { 'x' } else { ' ' };
    let detail = match &item.status {
        SectionStatus::Inserted {
            file,
            strategy,
            shift,
            ..
        } => format!("{file} via {strategy}, shift {shift:+}"),
        SectionStatus::Toc => "table of contents".to_string(),
        SectionStatus::CoveredByToc => "listed in table of contents".to_string(),
        SectionStatus::Excluded => "excluded".to_string(),
        SectionStatus::Missing => "missing".to_string(),
        SectionStatus::Ambiguous { candidates } => {
            format!("ambiguous: {}", candidates.join(", "))
        }
    };
    println!("{indent}[{mark}] {} ({}): {detail}", item.title, item.slug);
}

fn print_json(result: &CommandResult) -> Result<(), CliError> {
    let payload = json!(result);
    println!("{payload}");
    Ok(())
}
