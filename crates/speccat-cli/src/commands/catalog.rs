use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use speccat::{Catalog, Operation};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;

/// Owned form of a tag group so it can travel inside a `CommandResult`.
#[derive(Clone, Debug, Serialize)]
pub struct TagListing {
    pub tag: Option<String>,
    pub operations: Vec<Operation>,
}

pub fn command() -> Command {
    Command::new("catalog")
        .about("List the operations and webhooks of a specification")
        .arg(
            Arg::new("identifier")
                .value_name("ID")
                .help("Specification identifier, e.g. ./openapi/pets.yaml. Defaults to the first one discovered."),
        )
        .arg(
            Arg::new("by-tag")
                .long("by-tag")
                .action(ArgAction::SetTrue)
                .help("Group operations by tag."),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let identifier = session.identifier_or_default(matches.get_one::<String>("identifier"))?;
    let view = session.block_on(session.service.get_catalog(&identifier))?;

    let groups = matches.get_flag("by-tag").then(|| {
        let catalog = Catalog {
            operations: view.operations.clone(),
            webhooks: Vec::new(),
        };
        group_by_tag(&catalog)
    });

    Ok(CommandResult::Catalog {
        identifier: identifier.to_string(),
        operations: view.operations,
        webhooks: view.webhooks,
        groups,
    })
}

fn group_by_tag(catalog: &Catalog) -> Vec<TagListing> {
    catalog
        .by_tag()
        .into_iter()
        .map(|group| TagListing {
            tag: group.tag.map(str::to_string),
            operations: group.operations.into_iter().cloned().collect(),
        })
        .collect()
}
