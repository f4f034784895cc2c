mod app;

use std::env;
use std::process::ExitCode;

use tracing::error;

use app::bootstrap::{build_app, init_tracing, parse_args, usage_text, CliCommand};

fn main() -> ExitCode {
    init_tracing();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let cli = match parse_args(&args) {
        Ok(CliCommand::Run(cli)) => cli,
        Ok(CliCommand::Help) => {
            println!("{}", usage_text());
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    match build_app(cli) {
        Ok(app) => app::loop_runner::run(app),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
