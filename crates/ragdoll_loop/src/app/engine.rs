use serde::Deserialize;
use thiserror::Error;

use super::input::KeyState;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Torso pose and rates, read by the stabilizers. `y` grows downward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TorsoState {
    pub angle: f32,
    pub angular_velocity: f32,
    pub y: f32,
    pub vertical_velocity: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadCircle {
    pub center: Vec2,
    pub radius: f32,
}

/// World-space geometry of the ragdoll for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometrySnapshot {
    pub torso_x: f32,
    /// Each polygon is closed implicitly between its last and first vertex.
    pub body_polygons: Vec<Vec<Vec2>>,
    pub head: HeadCircle,
    pub ground_height: f32,
}

impl GeometrySnapshot {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.torso_x.is_finite() {
            return Err(EngineError::malformed("torso_x is not finite"));
        }
        if !self.ground_height.is_finite() {
            return Err(EngineError::malformed("ground_height is not finite"));
        }
        if !self.head.center.is_finite() || !self.head.radius.is_finite() {
            return Err(EngineError::malformed("head circle is not finite"));
        }
        if self.head.radius < 0.0 {
            return Err(EngineError::malformed(format!(
                "head radius {} is negative",
                self.head.radius
            )));
        }
        for (index, polygon) in self.body_polygons.iter().enumerate() {
            if polygon.len() < 3 {
                return Err(EngineError::malformed(format!(
                    "body polygon {index} has {} vertices",
                    polygon.len()
                )));
            }
            if !polygon.iter().all(|vertex| vertex.is_finite()) {
                return Err(EngineError::malformed(format!(
                    "body polygon {index} has a non-finite vertex"
                )));
            }
        }
        Ok(())
    }
}

/// Slider-derived engine parameters, re-applied after every world reset.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsParams {
    /// Vertical gravity; positive pulls down.
    pub gravity: f32,
    pub torque_multiplier: f32,
    pub inertia_multiplier: f32,
    pub point_feet: bool,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            gravity: 10.0,
            torque_multiplier: 1.0,
            inertia_multiplier: 1.0,
            point_feet: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("simulation engine unavailable: {0}")]
    Unavailable(String),
    #[error("malformed geometry snapshot: {reason}")]
    MalformedSnapshot { reason: String },
    #[error("engine rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
}

impl EngineError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            reason: reason.into(),
        }
    }
}

/// The physics engine as seen by the frame loop.
///
/// Corrections (`apply_torque`, `apply_impulse`) only take effect in the
/// same tick when issued before `step`. `set_point_feet` needs a
/// `reset_world` to show up.
pub trait SimulationEngine {
    fn step(&mut self, keys: KeyState) -> Result<(), EngineError>;

    fn torso_state(&self) -> Result<TorsoState, EngineError>;

    fn geometry(&self) -> Result<GeometrySnapshot, EngineError>;

    fn apply_torque(&mut self, torque: f32) -> Result<(), EngineError>;

    fn apply_impulse(&mut self, x: f32, y: f32) -> Result<(), EngineError>;

    fn reset_world(&mut self) -> Result<(), EngineError>;

    fn set_gravity(&mut self, x: f32, y: f32);

    fn set_max_torque_multiplier(&mut self, multiplier: f32);

    fn set_body_inertia_multiplier(&mut self, multiplier: f32);

    fn set_point_feet(&mut self, enabled: bool);
}

impl<E: SimulationEngine + ?Sized> SimulationEngine for Box<E> {
    fn step(&mut self, keys: KeyState) -> Result<(), EngineError> {
        (**self).step(keys)
    }

    fn torso_state(&self) -> Result<TorsoState, EngineError> {
        (**self).torso_state()
    }

    fn geometry(&self) -> Result<GeometrySnapshot, EngineError> {
        (**self).geometry()
    }

    fn apply_torque(&mut self, torque: f32) -> Result<(), EngineError> {
        (**self).apply_torque(torque)
    }

    fn apply_impulse(&mut self, x: f32, y: f32) -> Result<(), EngineError> {
        (**self).apply_impulse(x, y)
    }

    fn reset_world(&mut self) -> Result<(), EngineError> {
        (**self).reset_world()
    }

    fn set_gravity(&mut self, x: f32, y: f32) {
        (**self).set_gravity(x, y)
    }

    fn set_max_torque_multiplier(&mut self, multiplier: f32) {
        (**self).set_max_torque_multiplier(multiplier)
    }

    fn set_body_inertia_multiplier(&mut self, multiplier: f32) {
        (**self).set_body_inertia_multiplier(multiplier)
    }

    fn set_point_feet(&mut self, enabled: bool) {
        (**self).set_point_feet(enabled)
    }
}
