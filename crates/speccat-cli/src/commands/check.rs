use clap::{ArgMatches, Command};
use serde::Serialize;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};

#[derive(Clone, Debug, Serialize)]
pub struct CheckReport {
    pub identifier: String,
    pub ok: bool,
    pub operations: usize,
    pub webhooks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<u8>,
}

pub fn command() -> Command {
    Command::new("check").about("Resolve every discovered specification and report failures")
}

pub fn run(session: &CliSession, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let identifiers = session.service.identifiers();

    let reports = session.block_on(async {
        // Resolve concurrently; reports keep discovery order.
        let handles: Vec<_> = identifiers
            .into_iter()
            .map(|identifier| {
                let service = session.service.clone();
                tokio::spawn(async move {
                    let outcome = service.get_catalog(&identifier).await;
                    (identifier, outcome)
                })
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            let (identifier, outcome) = handle.await.map_err(|err| {
                CliError::new(format!("check task failed: {err}"), ExitStatus::Software)
            })?;
            reports.push(match outcome {
                Ok(view) => CheckReport {
                    identifier: identifier.to_string(),
                    ok: true,
                    operations: view.operations.len(),
                    webhooks: view.webhooks.len(),
                    message: None,
                    exit_code: None,
                },
                Err(err) => CheckReport {
                    identifier: identifier.to_string(),
                    ok: false,
                    operations: 0,
                    webhooks: 0,
                    exit_code: Some(ExitStatus::for_error(&err).code()),
                    message: Some(err.to_string()),
                },
            });
        }
        Ok::<_, CliError>(reports)
    })?;

    let healthy = reports.iter().all(|report| report.ok);
    Ok(CommandResult::Check { reports, healthy })
}
