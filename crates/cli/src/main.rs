use std::process::ExitCode;

fn main() -> ExitCode {
    opsdesk_cli::run()
}
