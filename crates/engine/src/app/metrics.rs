use std::time::{Duration, Instant};

use crate::sim::TickReport;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub triggers_per_tick: f32,
    pub actions_per_tick: f32,
}

/// Rolling window over loop frames and simulation ticks.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    triggers: u64,
    actions: u64,
    frame_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval_start: start,
            interval,
            frames: 0,
            ticks: 0,
            triggers: 0,
            actions: 0,
            frame_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, report: &TickReport) {
        self.ticks = self.ticks.saturating_add(1);
        self.triggers = self.triggers.saturating_add(u64::from(report.triggers_dispatched));
        self.actions = self.actions.saturating_add(u64::from(report.actions_performed));
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };
        let per_tick = |total: u64| {
            if self.ticks == 0 {
                0.0
            } else {
                total as f32 / self.ticks as f32
            }
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            triggers_per_tick: per_tick(self.triggers),
            actions_per_tick: per_tick(self.actions),
        };

        self.interval_start = now;
        self.frames = 0;
        self.ticks = 0;
        self.triggers = 0;
        self.actions = 0;
        self.frame_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(triggers: u32, actions: u32) -> TickReport {
        TickReport {
            triggers_dispatched: triggers,
            actions_performed: actions,
            ..TickReport::default()
        }
    }

    #[test]
    fn snapshot_computes_expected_values() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);

        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_tick(&report(2, 1));
        accumulator.record_tick(&report(0, 0));
        accumulator.record_tick(&report(4, 3));
        accumulator.record_tick(&report(2, 0));

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert!((snapshot.triggers_per_tick - 2.0).abs() < 0.001);
        assert!((snapshot.actions_per_tick - 1.0).abs() < 0.001);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_frame(Duration::from_millis(16));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn snapshot_resets_window() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_tick(&report(1, 1));
        assert!(accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .is_some());

        let empty = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second window");
        assert_eq!(empty.tps, 0.0);
        assert_eq!(empty.actions_per_tick, 0.0);
    }
}
