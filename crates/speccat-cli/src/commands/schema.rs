use clap::Command;

use crate::commands::CommandResult;
use crate::error::CliError;

pub fn command() -> Command {
    Command::new("schema").about("Print the JSON Schema of the catalog payload")
}

pub fn run() -> Result<CommandResult, CliError> {
    let schema = serde_json::to_value(speccat::catalog_schema())?;
    Ok(CommandResult::Schema { schema })
}
