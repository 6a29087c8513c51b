use std::process::ExitCode;

fn main() -> ExitCode {
    aura_cli::run()
}
