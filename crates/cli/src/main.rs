use std::process::ExitCode;

fn main() -> ExitCode {
    reviva_cli::run()
}
