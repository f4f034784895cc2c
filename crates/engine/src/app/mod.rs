mod input;
mod loop_runner;
mod metrics;

pub use input::{InputScript, InputScriptError};
pub use loop_runner::{run_headless, AppError, LoopConfig, RunSummary};
pub use metrics::LoopMetricsSnapshot;
