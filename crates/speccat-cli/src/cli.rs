use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use tracing_subscriber::EnvFilter;

use crate::commands;
use crate::context::{CliSession, ConfigOverrides};
use crate::error::{CliError, ExitStatus};
use crate::formatter::{OutputFormat, emit_result};
use crate::util::{self, Verbosity};

const NAME: &str = "speccat";

pub fn run() -> ExitCode {
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses arguments, opens the catalog service for the selected root, and
/// dispatches the subcommand. Returns a `sysexits`-compatible exit code.
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

    // The schema is static; it needs no root and no discovery.
    if let Some(("schema", _)) = matches.subcommand() {
        return emit_result(commands::schema::run()?, output);
    }

    let overrides = ConfigOverrides {
        spec_dir: matches.get_one::<PathBuf>("spec-dir").cloned(),
        local: matches.get_flag("local"),
        timeout_secs: matches.get_one::<u64>("timeout").copied(),
    };
    let root_override = matches.get_one::<String>("root").cloned();
    let session = CliSession::bootstrap(root_override, overrides, verbosity)?;
    if session.verbosity.verbose {
        tracing::info!(
            root = %session.root().display(),
            spec_dir = %util::root_relative(session.root(), &session.root().join(&session.config.spec_dir)),
            allow_remote = session.config.allow_remote,
            timeout_secs = session.config.resolve_timeout_secs,
            "resolved catalog context"
        );
    }

    let result = dispatch(&session, &matches);
    session.shutdown();
    emit_result(result?, output)
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "error" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Discover, dereference, and catalog API specifications")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("PATH")
                .global(true)
                .help("Directory holding the specification folder. Defaults to the current directory."),
        )
        .arg(
            Arg::new("spec-dir")
                .long("spec-dir")
                .value_name("DIR")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Specification folder relative to the root (overrides speccat.yaml)."),
        )
        .arg(
            Arg::new("local")
                .long("local")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Refuse to fetch http(s) references."),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .global(true)
                .value_parser(value_parser!(u64).range(1..))
                .help("Upper bound on a single resolution, in seconds."),
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
                .help("Log the resolved root and effective settings."),
        )
        .subcommand_required(true)
        .subcommand(commands::discover::command())
        .subcommand(commands::catalog::command())
        .subcommand(commands::resolve::command())
        .subcommand(commands::check::command())
        .subcommand(commands::schema::command())
}

fn dispatch(
    session: &CliSession,
    matches: &ArgMatches,
) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("discover", sub)) => commands::discover::run(session, sub),
        Some(("catalog", sub)) => commands::catalog::run(session, sub),
        Some(("resolve", sub)) => commands::resolve::run(session, sub),
        Some(("check", sub)) => commands::check::run(session, sub),
        _ => Err(CliError::new("missing command", ExitStatus::Usage)),
    }
}
