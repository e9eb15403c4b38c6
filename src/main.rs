use std::process::ExitCode;

fn main() -> ExitCode {
    skelmap::cli::run()
}
