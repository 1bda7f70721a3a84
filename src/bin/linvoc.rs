use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    linvoc_cli::run()
}
