use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use super::engine::SimulationEngine;
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::rendering::DrawTarget;
use super::session::{Session, SessionConfig, TickError, TickSummary};

const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(250);
const DEFAULT_METRICS_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub tick_rate_hz: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_advance: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 25,
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            max_ticks_per_advance: 5,
            metrics_log_interval: DEFAULT_METRICS_LOG_INTERVAL,
        }
    }
}

impl LoopConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }

    fn normalized(self) -> Self {
        Self {
            tick_rate_hz: self.tick_rate_hz.max(1),
            max_frame_delta: normalize_non_zero_duration(
                self.max_frame_delta,
                DEFAULT_MAX_FRAME_DELTA,
            ),
            max_ticks_per_advance: self.max_ticks_per_advance.max(1),
            metrics_log_interval: normalize_non_zero_duration(
                self.metrics_log_interval,
                DEFAULT_METRICS_LOG_INTERVAL,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoopError {
    #[error("frame loop already started (state {state:?})")]
    AlreadyStarted { state: LoopState },
    #[error("frame loop is not running (state {state:?})")]
    NotRunning { state: LoopState },
    #[error("frame loop is not paused (state {state:?})")]
    NotPaused { state: LoopState },
    #[error("failed to initialize session: {0}")]
    Initialize(#[from] TickError),
}

/// Outcome of one [`FrameLoop::advance`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    pub ticks_run: u32,
    pub failed_ticks: u32,
    pub dropped_backlog: Duration,
}

/// Fixed-rate driver owning the engine and the session.
///
/// Wall time handed to [`advance`](Self::advance) is turned into whole
/// ticks; a tick whose engine calls fail draws nothing and the loop keeps
/// going.
pub struct FrameLoop<E> {
    engine: E,
    session: Session,
    config: LoopConfig,
    tick_period: Duration,
    state: LoopState,
    accumulator: Duration,
    last_advance: Option<Instant>,
    ticks_run: u64,
    failed_ticks: u64,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
}

impl<E: SimulationEngine> FrameLoop<E> {
    pub fn new(
        engine: E,
        config: LoopConfig,
        session_config: SessionConfig,
    ) -> Result<Self, LoopError> {
        Self::with_metrics(engine, config, session_config, MetricsHandle::default())
    }

    pub fn with_metrics(
        mut engine: E,
        config: LoopConfig,
        session_config: SessionConfig,
        metrics_handle: MetricsHandle,
    ) -> Result<Self, LoopError> {
        let config = config.normalized();
        let session = Session::new(session_config, &mut engine)?;
        Ok(Self {
            engine,
            session,
            config,
            tick_period: config.tick_period(),
            state: LoopState::Idle,
            accumulator: Duration::ZERO,
            last_advance: None,
            ticks_run: 0,
            failed_ticks: 0,
            metrics: MetricsAccumulator::new(config.metrics_log_interval, Instant::now()),
            metrics_handle,
        })
    }

    pub fn start(&mut self, now: Instant) -> Result<(), LoopError> {
        if self.state != LoopState::Idle {
            warn!(state = ?self.state, "loop_start_rejected");
            return Err(LoopError::AlreadyStarted { state: self.state });
        }
        self.state = LoopState::Running;
        self.accumulator = Duration::ZERO;
        self.last_advance = Some(now);
        self.metrics.restart(now);
        info!(
            tick_rate_hz = self.config.tick_rate_hz,
            tick_period_ms = self.tick_period.as_millis() as u64,
            max_frame_delta_ms = self.config.max_frame_delta.as_millis() as u64,
            max_ticks_per_advance = self.config.max_ticks_per_advance,
            "loop_started"
        );
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), LoopError> {
        if self.state != LoopState::Running {
            return Err(LoopError::NotRunning { state: self.state });
        }
        self.state = LoopState::Paused;
        info!(ticks_run = self.ticks_run, "loop_paused");
        Ok(())
    }

    /// Continues from `now`; time spent paused is never caught up.
    pub fn resume(&mut self, now: Instant) -> Result<(), LoopError> {
        if self.state != LoopState::Paused {
            return Err(LoopError::NotPaused { state: self.state });
        }
        self.state = LoopState::Running;
        self.last_advance = Some(now);
        info!(ticks_run = self.ticks_run, "loop_resumed");
        Ok(())
    }

    pub fn toggle_pause(&mut self, now: Instant) -> Result<(), LoopError> {
        match self.state {
            LoopState::Running => self.pause(),
            LoopState::Paused => self.resume(now),
            LoopState::Idle => Err(LoopError::NotRunning { state: self.state }),
        }
    }

    pub fn stop(&mut self) {
        if self.state == LoopState::Idle {
            return;
        }
        self.state = LoopState::Idle;
        self.accumulator = Duration::ZERO;
        self.last_advance = None;
        info!(
            ticks_run = self.ticks_run,
            failed_ticks = self.failed_ticks,
            "loop_stopped"
        );
    }

    /// Runs every whole tick period elapsed since the previous call, up to
    /// `max_ticks_per_advance`. Does nothing unless running.
    pub fn advance<T>(&mut self, now: Instant, target: &mut T) -> AdvanceReport
    where
        T: DrawTarget + ?Sized,
    {
        if self.state != LoopState::Running {
            return AdvanceReport::default();
        }
        let last = self.last_advance.unwrap_or(now);
        let raw_frame_dt = now.saturating_duration_since(last);
        self.last_advance = Some(now);

        let clamped = clamp_frame_delta(raw_frame_dt, self.config.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped);
        let plan = plan_sim_steps(
            self.accumulator,
            self.tick_period,
            self.config.max_ticks_per_advance,
        );

        let mut report = AdvanceReport {
            dropped_backlog: plan.dropped_backlog,
            ..AdvanceReport::default()
        };
        for _ in 0..plan.ticks_to_run {
            report.ticks_run += 1;
            if self.run_one_tick(target).is_err() {
                report.failed_ticks += 1;
            }
        }
        self.accumulator = plan.remaining_accumulator;

        if plan.dropped_backlog > Duration::ZERO {
            self.metrics.record_dropped_backlog(plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_advance = self.config.max_ticks_per_advance,
                "tick_backlog_dropped"
            );
        }

        self.metrics.record_frame(raw_frame_dt);
        if let Some(snapshot) = self.metrics.maybe_snapshot(now) {
            self.metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                failed_ticks = snapshot.failed_ticks,
                dropped_backlog_ms = snapshot.dropped_backlog_ms,
                episode = self.session.episode(),
                "loop_metrics"
            );
        }
        report
    }

    fn run_one_tick<T>(&mut self, target: &mut T) -> Result<TickSummary, TickError>
    where
        T: DrawTarget + ?Sized,
    {
        self.ticks_run = self.ticks_run.saturating_add(1);
        let result = self.session.run_tick(&mut self.engine, target);
        self.metrics.record_tick(result.is_ok());
        if let Err(error) = &result {
            self.failed_ticks = self.failed_ticks.saturating_add(1);
            warn!(
                tick = self.ticks_run,
                stage = %error.stage,
                error = %error.source,
                "tick_failed"
            );
        }
        result
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> LoopConfig {
        self.config
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn metrics_handle(&self) -> MetricsHandle {
        self.metrics_handle.clone()
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
    max_ticks_per_advance: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_advance {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::replace(&mut accumulator, Duration::ZERO)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::{ControlKey, KeyState};
    use crate::app::rendering::DrawList;
    use crate::app::session::ConfigUpdate;
    use crate::app::test_engine::{EngineCall, RecordingEngine};

    const TICK: Duration = Duration::from_millis(40);

    fn running_loop() -> (FrameLoop<RecordingEngine>, Instant) {
        let mut frame_loop = FrameLoop::new(
            RecordingEngine::default(),
            LoopConfig::default(),
            SessionConfig::default(),
        )
        .expect("frame loop");
        let start = Instant::now();
        frame_loop.start(start).expect("start");
        frame_loop.engine_mut().take_calls();
        (frame_loop, start)
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let result = plan_sim_steps(Duration::from_millis(100), TICK, 5);

        assert_eq!(result.ticks_to_run, 2);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(20));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(250), TICK, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(130));
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let config = LoopConfig {
            tick_rate_hz: 0,
            max_frame_delta: Duration::ZERO,
            max_ticks_per_advance: 0,
            metrics_log_interval: Duration::ZERO,
        }
        .normalized();
        assert_eq!(config.tick_rate_hz, 1);
        assert_eq!(config.max_frame_delta, DEFAULT_MAX_FRAME_DELTA);
        assert_eq!(config.max_ticks_per_advance, 1);
        assert_eq!(config.metrics_log_interval, DEFAULT_METRICS_LOG_INTERVAL);
    }

    #[test]
    fn default_tick_period_is_forty_milliseconds() {
        assert_eq!(LoopConfig::default().tick_period(), TICK);
    }

    #[test]
    fn idle_loop_does_not_tick() {
        let mut frame_loop = FrameLoop::new(
            RecordingEngine::default(),
            LoopConfig::default(),
            SessionConfig::default(),
        )
        .expect("frame loop");
        let mut frames: Vec<DrawList> = Vec::new();

        let report = frame_loop.advance(Instant::now() + Duration::from_secs(1), &mut frames);
        assert_eq!(report, AdvanceReport::default());
        assert_eq!(frame_loop.state(), LoopState::Idle);
        assert!(frames.is_empty());
    }

    #[test]
    fn second_start_is_rejected() {
        let (mut frame_loop, start) = running_loop();
        assert_eq!(
            frame_loop.start(start),
            Err(LoopError::AlreadyStarted {
                state: LoopState::Running
            })
        );
        frame_loop.pause().expect("pause");
        assert!(matches!(
            frame_loop.start(start),
            Err(LoopError::AlreadyStarted { .. })
        ));
        assert_eq!(frame_loop.state(), LoopState::Paused);
    }

    #[test]
    fn advance_runs_whole_ticks_and_carries_remainder() {
        let (mut frame_loop, start) = running_loop();
        let mut frames: Vec<DrawList> = Vec::new();

        let first = frame_loop.advance(start + Duration::from_millis(100), &mut frames);
        assert_eq!(first.ticks_run, 2);
        let second = frame_loop.advance(start + Duration::from_millis(120), &mut frames);
        assert_eq!(second.ticks_run, 1);

        assert_eq!(frames.len(), 3);
        assert_eq!(frame_loop.ticks_run(), 3);
        assert_eq!(frame_loop.engine().stepped_keys().len(), 3);
    }

    #[test]
    fn backlog_beyond_cap_is_dropped() {
        let (mut frame_loop, start) = running_loop();
        let mut frames: Vec<DrawList> = Vec::new();

        // A 2 s stall is first clamped to 250 ms, then capped at 5 ticks.
        let report = frame_loop.advance(start + Duration::from_secs(2), &mut frames);
        assert_eq!(report.ticks_run, 5);
        assert_eq!(report.dropped_backlog, Duration::from_millis(50));

        let next = frame_loop.advance(start + Duration::from_millis(2030), &mut frames);
        assert_eq!(next.ticks_run, 0);
    }

    #[test]
    fn paused_loop_does_not_tick_or_catch_up() {
        let (mut frame_loop, start) = running_loop();
        let mut frames: Vec<DrawList> = Vec::new();
        frame_loop.advance(start + TICK, &mut frames);
        frame_loop.pause().expect("pause");

        let report = frame_loop.advance(start + Duration::from_secs(5), &mut frames);
        assert_eq!(report.ticks_run, 0);

        let resumed_at = start + Duration::from_secs(10);
        frame_loop.resume(resumed_at).expect("resume");
        let report = frame_loop.advance(resumed_at + TICK, &mut frames);
        assert_eq!(report.ticks_run, 1);
        assert_eq!(frame_loop.ticks_run(), 2);
    }

    #[test]
    fn pause_and_resume_require_matching_state() {
        let (mut frame_loop, start) = running_loop();
        assert!(matches!(
            frame_loop.resume(start),
            Err(LoopError::NotPaused { .. })
        ));
        frame_loop.toggle_pause(start).expect("pause");
        assert_eq!(frame_loop.state(), LoopState::Paused);
        frame_loop.toggle_pause(start).expect("resume");
        assert_eq!(frame_loop.state(), LoopState::Running);
    }

    #[test]
    fn stop_allows_restart() {
        let (mut frame_loop, start) = running_loop();
        frame_loop.stop();
        assert_eq!(frame_loop.state(), LoopState::Idle);
        assert!(matches!(
            frame_loop.pause(),
            Err(LoopError::NotRunning { .. })
        ));
        frame_loop.start(start).expect("restart");
        assert_eq!(frame_loop.state(), LoopState::Running);
    }

    #[test]
    fn failing_ticks_are_counted_and_loop_continues() {
        let (mut frame_loop, start) = running_loop();
        let mut frames: Vec<DrawList> = Vec::new();
        frame_loop.engine_mut().fail_geometry = true;

        let report = frame_loop.advance(start + TICK * 2, &mut frames);
        assert_eq!(report.ticks_run, 2);
        assert_eq!(report.failed_ticks, 2);
        assert!(frames.is_empty());
        assert_eq!(frame_loop.state(), LoopState::Running);

        frame_loop.engine_mut().fail_geometry = false;
        let report = frame_loop.advance(start + TICK * 3, &mut frames);
        assert_eq!(report.failed_ticks, 0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frame_loop.failed_ticks(), 2);
    }

    #[test]
    fn live_keys_and_updates_reach_the_next_tick() {
        let (mut frame_loop, start) = running_loop();
        let mut frames: Vec<DrawList> = Vec::new();
        frame_loop.session_mut().set_live_key(ControlKey::O, true);
        frame_loop
            .session_mut()
            .queue_update(ConfigUpdate::SetInertiaMultiplier(0.5));

        frame_loop.advance(start + TICK, &mut frames);

        assert_eq!(
            frame_loop.engine().calls,
            vec![
                EngineCall::SetInertiaMultiplier(0.5),
                EngineCall::Step(KeyState::new(false, false, true, false)),
            ]
        );
    }

    #[test]
    fn metrics_are_published_each_interval() {
        let (mut frame_loop, start) = running_loop();
        let handle = frame_loop.metrics_handle();
        let mut frames: Vec<DrawList> = Vec::new();

        let mut now = start;
        for _ in 0..25 {
            now += TICK;
            frame_loop.advance(now, &mut frames);
        }

        let snapshot = handle.snapshot();
        assert!((snapshot.tps - 25.0).abs() < 0.5, "tps={}", snapshot.tps);
        assert!((snapshot.frame_time_ms - 40.0).abs() < 0.5);
        assert_eq!(snapshot.failed_ticks, 0);
    }
}
