use serde::Serialize;
use serde_json::Value;
use speccat::{Operation, Webhook};

use crate::error::ExitStatus;

pub mod catalog;
pub mod check;
pub mod discover;
pub mod resolve;
pub mod schema;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    Discovery {
        root: String,
        spec_dir: String,
        identifiers: Vec<String>,
        used_fallback: bool,
    },
    Catalog {
        identifier: String,
        operations: Vec<Operation>,
        webhooks: Vec<Webhook>,
        #[serde(skip_serializing_if = "Option::is_none")]
        groups: Option<Vec<catalog::TagListing>>,
    },
    Document {
        identifier: String,
        document: Value,
    },
    Check {
        reports: Vec<check::CheckReport>,
        healthy: bool,
    },
    Schema {
        schema: Value,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            CommandResult::Check { healthy, .. } => {
                if *healthy {
                    ExitStatus::Ok
                } else {
                    ExitStatus::Data
                }
            }
            _ => ExitStatus::Ok,
        }
    }
}
