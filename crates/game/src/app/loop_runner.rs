use std::process::ExitCode;

use rule_engine::{run_headless, save_game};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        mut game,
        loop_config,
        script,
        save_path,
    } = app;

    let summary = match run_headless(&mut game, &loop_config, &script) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "run_failed");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = save_path {
        if let Err(err) = save_game(&game, &path) {
            error!(error = %err, path = %path.display(), "save_failed");
            return ExitCode::FAILURE;
        }
    }

    info!(
        ticks_run = summary.ticks_run,
        final_tick = summary.final_tick,
        level_advances = summary.level_advances,
        dropped_backlog_ms = summary.dropped_backlog.as_millis() as u64,
        "shutdown"
    );
    ExitCode::SUCCESS
}
