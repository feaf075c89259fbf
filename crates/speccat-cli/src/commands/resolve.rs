use clap::{Arg, ArgMatches, Command};
use speccat::SpecIdentifier;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::{CliError, ExitStatus};

pub fn command() -> Command {
    Command::new("resolve")
        .about("Print a specification with every $ref expanded")
        .arg(
            Arg::new("identifier")
                .value_name("ID")
                .required(true)
                .help("Specification identifier, e.g. ./openapi/pets.yaml"),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let identifier = matches
        .get_one::<String>("identifier")
        .map(|value| SpecIdentifier::new(value.as_str()))
        .ok_or_else(|| CliError::new("missing identifier", ExitStatus::Usage))?;
    let document = session.block_on(session.service.resolve(&identifier))?;
    Ok(CommandResult::Document {
        identifier: identifier.to_string(),
        document: document.root().clone(),
    })
}
