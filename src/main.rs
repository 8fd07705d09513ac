use std::process::ExitCode;

fn main() -> ExitCode {
    docsort::run()
}
