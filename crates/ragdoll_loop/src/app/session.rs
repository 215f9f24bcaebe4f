use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use super::actions::Action;
use super::engine::{EngineError, PhysicsParams, SimulationEngine};
use super::input::{ControlKey, KeyState};
use super::multiplexer::{InputMultiplexer, InputSource};
use super::rendering::{DrawTarget, ProjectionConfig, ProjectionState, Viewport};
use super::sequence::{parse_sequence, SequenceError};
use super::stabilizer::{StabilizerConfig, StabilizerKind, StabilizerSettings};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub physics: PhysicsParams,
    pub angle_stabilizer: StabilizerSettings,
    pub height_stabilizer: StabilizerSettings,
    pub projection: ProjectionConfig,
    pub viewport: Viewport,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsParams::default(),
            angle_stabilizer: StabilizerSettings::default(),
            height_stabilizer: StabilizerSettings::default(),
            projection: ProjectionConfig::default(),
            viewport: Viewport {
                width: 1000,
                height: 300,
            },
        }
    }
}

/// A configuration change queued from outside the tick and applied at the
/// start of the next one.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    SetStabilizerEnabled {
        kind: StabilizerKind,
        enabled: bool,
    },
    SetStabilizerStrength {
        kind: StabilizerKind,
        strength: f32,
    },
    SetStabilizerGains {
        kind: StabilizerKind,
        gain_k: f32,
        gain_c: f32,
    },
    SetGravity(f32),
    SetTorqueMultiplier(f32),
    SetInertiaMultiplier(f32),
    /// Takes effect through a world reset.
    SetPointFeet(bool),
    /// Resets the world, then replays these actions from the first tick.
    LoadSequence(Vec<Action>),
    /// Resets the world and replays the last loaded run from its start.
    RestartSequence,
    Reset,
    Resize(Viewport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    ApplyUpdates,
    ReadTorso,
    ApplyTorque,
    ApplyImpulse,
    Step,
    Geometry,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickStage::ApplyUpdates => "apply_updates",
            TickStage::ReadTorso => "read_torso",
            TickStage::ApplyTorque => "apply_torque",
            TickStage::ApplyImpulse => "apply_impulse",
            TickStage::Step => "step",
            TickStage::Geometry => "geometry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("tick failed during {stage}: {source}")]
pub struct TickError {
    pub stage: TickStage,
    #[source]
    pub source: EngineError,
}

impl TickError {
    fn at(stage: TickStage) -> impl FnOnce(EngineError) -> TickError {
        move |source| TickError { stage, source }
    }
}

/// What one completed tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummary {
    pub keys: KeyState,
    pub source: InputSource,
    pub torque: Option<f32>,
    pub impulse: Option<f32>,
    pub primitive_count: usize,
}

/// Everything a running frame loop mutates between ticks.
#[derive(Debug)]
pub struct Session {
    live_keys: KeyState,
    multiplexer: InputMultiplexer,
    angle: StabilizerConfig,
    height: StabilizerConfig,
    physics: PhysicsParams,
    projection: ProjectionState,
    pending: VecDeque<ConfigUpdate>,
    episode: u64,
}

impl Session {
    /// Builds the session and runs the first world reset, which also fixes
    /// the first episode's stabilizer setpoints.
    pub fn new<E: SimulationEngine + ?Sized>(
        config: SessionConfig,
        engine: &mut E,
    ) -> Result<Self, TickError> {
        let mut session = Self {
            live_keys: KeyState::NONE,
            multiplexer: InputMultiplexer::new(),
            angle: StabilizerConfig::new(StabilizerKind::Angle, config.angle_stabilizer),
            height: StabilizerConfig::new(StabilizerKind::Height, config.height_stabilizer),
            physics: config.physics,
            projection: ProjectionState::new(config.projection, config.viewport),
            pending: VecDeque::new(),
            episode: 0,
        };
        session
            .reset(engine)
            .map_err(TickError::at(TickStage::ApplyUpdates))?;
        Ok(session)
    }

    pub fn live_keys(&self) -> KeyState {
        self.live_keys
    }

    pub fn set_live_key(&mut self, key: ControlKey, is_down: bool) {
        self.live_keys.set(key, is_down);
    }

    pub fn set_live_keys(&mut self, keys: KeyState) {
        self.live_keys = keys;
    }

    pub fn queue_update(&mut self, update: ConfigUpdate) {
        debug!(update = ?update, "config_update_queued");
        self.pending.push_back(update);
    }

    pub fn pending_updates(&self) -> usize {
        self.pending.len()
    }

    /// Parses `text` and queues it for replay. A malformed text is rejected
    /// whole and queues nothing.
    pub fn load_sequence(&mut self, text: &str) -> Result<usize, SequenceError> {
        let actions = parse_sequence(text)?;
        let count = actions.len();
        self.queue_update(ConfigUpdate::LoadSequence(actions));
        Ok(count)
    }

    pub fn multiplexer(&self) -> &InputMultiplexer {
        &self.multiplexer
    }

    pub fn stabilizer(&self, kind: StabilizerKind) -> &StabilizerConfig {
        match kind {
            StabilizerKind::Angle => &self.angle,
            StabilizerKind::Height => &self.height,
        }
    }

    fn stabilizer_mut(&mut self, kind: StabilizerKind) -> &mut StabilizerConfig {
        match kind {
            StabilizerKind::Angle => &mut self.angle,
            StabilizerKind::Height => &mut self.height,
        }
    }

    pub fn physics(&self) -> PhysicsParams {
        self.physics
    }

    pub fn projection(&self) -> &ProjectionState {
        &self.projection
    }

    /// Number of world resets so far, counting the initial one.
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Recreates the world and returns every per-episode value to its start.
    /// If the engine fails, the session keeps the previous episode's state.
    pub fn reset<E: SimulationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
    ) -> Result<(), EngineError> {
        engine.set_point_feet(self.physics.point_feet);
        engine.reset_world()?;
        engine.set_gravity(0.0, self.physics.gravity);
        engine.set_max_torque_multiplier(self.physics.torque_multiplier);
        engine.set_body_inertia_multiplier(self.physics.inertia_multiplier);

        let initial = engine.torso_state()?;
        self.live_keys.clear();
        self.multiplexer.clear();
        self.angle.rebase(&initial);
        self.height.rebase(&initial);
        self.episode = self.episode.saturating_add(1);
        info!(
            episode = self.episode,
            angle_setpoint = self.angle.setpoint,
            height_setpoint = self.height.setpoint,
            "world_reset"
        );
        Ok(())
    }

    /// Drains every queued update, returning the first engine failure.
    pub fn apply_pending<E: SimulationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
    ) -> Result<(), EngineError> {
        let mut first_error = None;
        while let Some(update) = self.pending.pop_front() {
            if let Err(error) = self.apply_update(engine, update) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn apply_update<E: SimulationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        update: ConfigUpdate,
    ) -> Result<(), EngineError> {
        match update {
            ConfigUpdate::SetStabilizerEnabled { kind, enabled } => {
                self.stabilizer_mut(kind).enabled = enabled;
                info!(kind = ?kind, enabled, "stabilizer_toggled");
            }
            ConfigUpdate::SetStabilizerStrength { kind, strength } => {
                self.stabilizer_mut(kind).set_strength(strength);
            }
            ConfigUpdate::SetStabilizerGains {
                kind,
                gain_k,
                gain_c,
            } => {
                let stabilizer = self.stabilizer_mut(kind);
                stabilizer.gain_k = gain_k;
                stabilizer.gain_c = gain_c;
            }
            ConfigUpdate::SetGravity(gravity) => {
                self.physics.gravity = gravity;
                engine.set_gravity(0.0, gravity);
            }
            ConfigUpdate::SetTorqueMultiplier(multiplier) => {
                self.physics.torque_multiplier = multiplier;
                engine.set_max_torque_multiplier(multiplier);
            }
            ConfigUpdate::SetInertiaMultiplier(multiplier) => {
                self.physics.inertia_multiplier = multiplier;
                engine.set_body_inertia_multiplier(multiplier);
            }
            ConfigUpdate::SetPointFeet(enabled) => {
                self.physics.point_feet = enabled;
                self.reset(engine)?;
            }
            ConfigUpdate::LoadSequence(actions) => {
                self.reset(engine)?;
                self.multiplexer.load(actions);
                let queue = self.multiplexer.queue();
                info!(
                    actions = queue.actions_in_run().len(),
                    total_ticks = queue.total_duration_ticks(),
                    "sequence_loaded"
                );
            }
            ConfigUpdate::RestartSequence => {
                let actions = self.multiplexer.queue().actions_in_run().to_vec();
                self.reset(engine)?;
                self.multiplexer.load(actions);
            }
            ConfigUpdate::Reset => self.reset(engine)?,
            ConfigUpdate::Resize(viewport) => {
                self.projection.resize(viewport);
                debug!(
                    width = viewport.width,
                    height = viewport.height,
                    "viewport_resized"
                );
            }
        }
        Ok(())
    }

    /// One control tick: pending updates, input, corrections, step, then
    /// projection handed to `target`. Nothing is drawn if any engine call
    /// fails.
    pub fn run_tick<E, T>(
        &mut self,
        engine: &mut E,
        target: &mut T,
    ) -> Result<TickSummary, TickError>
    where
        E: SimulationEngine + ?Sized,
        T: DrawTarget + ?Sized,
    {
        self.apply_pending(engine)
            .map_err(TickError::at(TickStage::ApplyUpdates))?;

        let keys = self.multiplexer.next(self.live_keys);
        let source = self.multiplexer.last_source().unwrap_or(InputSource::Live);

        let (torque, impulse) = if self.angle.enabled || self.height.enabled {
            let state = engine
                .torso_state()
                .map_err(TickError::at(TickStage::ReadTorso))?;
            (self.angle.correction(&state), self.height.correction(&state))
        } else {
            (None, None)
        };
        if let Some(torque) = torque {
            engine
                .apply_torque(torque)
                .map_err(TickError::at(TickStage::ApplyTorque))?;
        }
        if let Some(impulse) = impulse {
            engine
                .apply_impulse(0.0, impulse)
                .map_err(TickError::at(TickStage::ApplyImpulse))?;
        }

        engine.step(keys).map_err(TickError::at(TickStage::Step))?;

        let snapshot = engine
            .geometry()
            .and_then(|snapshot| snapshot.validate().map(|()| snapshot))
            .map_err(TickError::at(TickStage::Geometry))?;
        let draw_list = self.projection.project(&snapshot);
        target.submit(&draw_list);

        Ok(TickSummary {
            keys,
            source,
            torque,
            impulse,
            primitive_count: draw_list.primitives.len(),
        })
    }
}
