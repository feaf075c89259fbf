use std::process::ExitCode;

fn main() -> ExitCode {
    speccat_cli::run()
}
