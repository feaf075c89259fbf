use std::process::ExitCode;

use serde_json::json;
use speccat::{Operation, Webhook};

use crate::commands::CommandResult;
use crate::commands::catalog::TagListing;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a `CommandResult` as text or a single JSON line and converts the
/// outcome into its exit code.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result)?,
        OutputFormat::Json => print_json(&result),
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) -> Result<(), CliError> {
    match result {
        CommandResult::Discovery {
            root,
            spec_dir,
            identifiers,
            used_fallback,
        } => {
            if *used_fallback {
                println!("No specifications found in {spec_dir} under {root}; using fallback:");
            } else {
                println!("Specifications ({}) in {spec_dir}:", identifiers.len());
            }
            for identifier in identifiers {
                println!("  - {identifier}");
            }
        }
        CommandResult::Catalog {
            identifier,
            operations,
            webhooks,
            groups,
        } => {
            println!("Catalog for {identifier}");
            match groups {
                Some(groups) => print_groups(groups),
                None => {
                    println!("  Operations ({}):", operations.len());
                    for operation in operations {
                        println!("    {}", operation_label(operation));
                    }
                }
            }
            println!("  Webhooks ({}):", webhooks.len());
            for webhook in webhooks {
                println!("    {}", webhook_label(webhook));
            }
        }
        CommandResult::Document { document, .. } => {
            println!("{}", serde_json::to_string_pretty(document)?);
        }
        CommandResult::Check { reports, healthy } => {
            let verdict = if *healthy { "OK" } else { "FAIL" };
            println!("Catalog check: {verdict} ({} specifications)", reports.len());
            for report in reports {
                if report.ok {
                    println!(
                        "  [OK] {} ({} operations, {} webhooks)",
                        report.identifier, report.operations, report.webhooks
                    );
                } else {
                    let message = report.message.as_deref().unwrap_or("unknown error");
                    println!("  [ERR] {}: {message}", report.identifier);
                }
            }
        }
        CommandResult::Schema { schema } => {
            println!("{}", serde_json::to_string_pretty(schema)?);
        }
    }
    Ok(())
}

fn print_json(result: &CommandResult) {
    let payload = json!(result);
    println!("{payload}");
}

fn print_groups(groups: &[TagListing]) {
    for group in groups {
        let title = group.tag.as_deref().unwrap_or("(untagged)");
        println!("  {title} ({}):", group.operations.len());
        for operation in &group.operations {
            println!("    {}", operation_label(operation));
        }
    }
}

fn operation_label(operation: &Operation) -> String {
    let method = operation.method.as_str().to_ascii_uppercase();
    match operation.tags.as_deref() {
        Some(tags) if !tags.is_empty() => {
            format!("{method} {} [{}]", operation.path, tags.join(", "))
        }
        _ => format!("{method} {}", operation.path),
    }
}

fn webhook_label(webhook: &Webhook) -> String {
    let method = webhook.method.as_str().to_ascii_uppercase();
    match webhook.tags.as_deref() {
        Some(tags) if !tags.is_empty() => format!("{method} {} [{}]", webhook.name, tags.join(", ")),
        _ => format!("{method} {}", webhook.name),
    }
}
