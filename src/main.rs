use std::process::ExitCode;

fn main() -> ExitCode {
    derefmove::projects::cli::start_cli()
}
