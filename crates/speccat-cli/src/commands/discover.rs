use clap::{ArgMatches, Command};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;
use crate::util;

pub fn command() -> Command {
    Command::new("discover").about("List the specification identifiers found under the root")
}

pub fn run(session: &CliSession, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let discovery = session.service.resolver().discovery();
    let spec_dir = session.root().join(&session.config.spec_dir);
    Ok(CommandResult::Discovery {
        root: session.root().display().to_string(),
        spec_dir: util::root_relative(session.root(), &spec_dir),
        identifiers: discovery
            .identifiers()
            .iter()
            .map(ToString::to_string)
            .collect(),
        used_fallback: discovery.used_fallback(),
    })
}
