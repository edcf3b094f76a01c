use std::process::ExitCode;

fn main() -> ExitCode {
    tocstitch_cli::run()
}
