use std::process::ExitCode;

fn main() -> ExitCode {
    boutiq_cli::run()
}
