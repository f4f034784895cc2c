use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sim::{Game, GameError, GameState, SimEvent};

use super::input::InputScript;
use super::metrics::{LoopMetricsSnapshot, MetricsAccumulator};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many ticks of the current session.
    pub max_ticks: Option<u64>,
    /// Pace ticks against the wall clock instead of running flat out.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
            realtime: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("a headless run without realtime pacing needs a tick limit")]
    Unbounded,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub final_tick: u64,
    pub final_state: Option<GameState>,
    pub level_advances: u32,
    pub events_emitted: u64,
    pub dropped_backlog: Duration,
    pub reached_tick_limit: bool,
    pub last_metrics: Option<LoopMetricsSnapshot>,
}

/// Drives `game` on a fixed timestep until it finishes or the tick limit is
/// hit. Scripted presses are keyed by game tick.
pub fn run_headless(
    game: &mut Game,
    config: &LoopConfig,
    script: &InputScript,
) -> Result<RunSummary, AppError> {
    if !config.realtime && config.max_ticks.is_none() {
        return Err(AppError::Unbounded);
    }

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        max_ticks = config.max_ticks,
        realtime = config.realtime,
        scripted_presses = script.len(),
        "loop_config"
    );

    if let Some(last_tick) = script_overrun(script, game.tick(), config.max_ticks) {
        warn!(
            last_press_tick = last_tick,
            start_tick = game.tick(),
            max_ticks = config.max_ticks,
            "scripted_presses_past_tick_limit"
        );
    }

    let mut summary = RunSummary::default();
    if game.state() == GameState::Stopped {
        game.start_game()?;
    }

    let origin = Instant::now();
    let mut virtual_elapsed = Duration::ZERO;
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = origin;
    let mut metrics = MetricsAccumulator::new(metrics_log_interval, origin);

    'frames: while game.state() != GameState::Finished {
        let (now, raw_frame_dt) = if config.realtime {
            let now = Instant::now();
            let raw = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            (now, raw)
        } else {
            virtual_elapsed = virtual_elapsed.saturating_add(fixed_dt);
            (origin + virtual_elapsed, fixed_dt)
        };

        accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));
        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if config.max_ticks.is_some_and(|limit| summary.ticks_run >= limit) {
                summary.reached_tick_limit = true;
                break 'frames;
            }
            run_tick(game, script, &mut summary, &mut metrics)?;
            if game.state() == GameState::Finished {
                break 'frames;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            summary.dropped_backlog = summary.dropped_backlog.saturating_add(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        metrics.record_frame(raw_frame_dt);
        if let Some(snapshot) = metrics.maybe_snapshot(now) {
            summary.last_metrics = Some(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                triggers_per_tick = snapshot.triggers_per_tick,
                actions_per_tick = snapshot.actions_per_tick,
                tick = game.tick(),
                "loop_metrics"
            );
        }

        if config.max_ticks.is_some_and(|limit| summary.ticks_run >= limit) {
            summary.reached_tick_limit = true;
            break;
        }
        if config.realtime {
            thread::sleep(fixed_dt.saturating_sub(accumulator));
        }
    }

    summary.final_tick = game.tick();
    summary.final_state = Some(game.state());
    info!(
        ticks_run = summary.ticks_run,
        final_tick = summary.final_tick,
        state = %game.state(),
        level_advances = summary.level_advances,
        events = summary.events_emitted,
        "run_finished"
    );
    Ok(summary)
}

fn run_tick(
    game: &mut Game,
    script: &InputScript,
    summary: &mut RunSummary,
    metrics: &mut MetricsAccumulator,
) -> Result<(), AppError> {
    for key in script.presses_at(game.tick() + 1) {
        game.press_key(key.as_str());
    }
    let report = game.step()?;
    summary.ticks_run += 1;
    metrics.record_tick(&report);

    for event in game.drain_events() {
        log_event(&event);
        summary.events_emitted += 1;
    }

    if report.level_advanced {
        summary.level_advances += 1;
        if game.state() == GameState::Stopped {
            game.start_game()?;
        }
    }
    Ok(())
}

/// Last scripted tick when it falls beyond the ticks this run will reach.
fn script_overrun(script: &InputScript, start_tick: u64, max_ticks: Option<u64>) -> Option<u64> {
    let last_tick = script.last_tick()?;
    let final_tick = start_tick.saturating_add(max_ticks?);
    (last_tick > final_tick).then_some(last_tick)
}

fn log_event(event: &SimEvent) {
    match event {
        SimEvent::ActorAdded { actor_id, name } => {
            debug!(actor_id = actor_id.0, name = %name, "actor_added");
        }
        SimEvent::ActorDestroyed { actor_id, name } => {
            debug!(actor_id = actor_id.0, name = %name, "actor_destroyed");
        }
        SimEvent::AttributeChanged {
            actor_id,
            attribute,
            value,
        } => {
            debug!(actor_id = actor_id.0, attribute = ?attribute, value, "attribute_changed");
        }
        SimEvent::LevelAdvanced { from, to } => {
            info!(from, to, "level_entered");
        }
        SimEvent::SceneShift {
            source,
            direction,
            speed,
        } => {
            debug!(source = source.0, direction = %direction, speed, "scene_shift");
        }
        SimEvent::PlaySound { source, sound } => {
            debug!(source = source.0, sound = %sound, "play_sound");
        }
        SimEvent::GameCompleted => {
            info!("game_completed_event");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
