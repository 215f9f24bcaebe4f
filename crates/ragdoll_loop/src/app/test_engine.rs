use std::cell::Cell;

use super::engine::{
    EngineError, GeometrySnapshot, HeadCircle, SimulationEngine, TorsoState, Vec2,
};
use super::input::KeyState;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    Step(KeyState),
    ApplyTorque(f32),
    ApplyImpulse(f32, f32),
    ResetWorld,
    SetGravity(f32, f32),
    SetTorqueMultiplier(f32),
    SetInertiaMultiplier(f32),
    SetPointFeet(bool),
}

pub(crate) const INITIAL_TORSO: TorsoState = TorsoState {
    angle: -1.251,
    angular_velocity: 0.0,
    y: -1.926,
    vertical_velocity: 0.0,
};

/// Records every call; the torso walks forward one unit per step.
#[derive(Debug)]
pub(crate) struct RecordingEngine {
    pub calls: Vec<EngineCall>,
    pub torso: TorsoState,
    pub torso_x: f32,
    pub torso_reads: Cell<u32>,
    pub resets: u32,
    pub fail_step: bool,
    pub fail_torso: bool,
    pub fail_geometry: bool,
    pub malformed_geometry: bool,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            torso: INITIAL_TORSO,
            torso_x: 2.525,
            torso_reads: Cell::new(0),
            resets: 0,
            fail_step: false,
            fail_torso: false,
            fail_geometry: false,
            malformed_geometry: false,
        }
    }
}

impl RecordingEngine {
    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn stepped_keys(&self) -> Vec<KeyState> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Step(keys) => Some(*keys),
                _ => None,
            })
            .collect()
    }
}

impl SimulationEngine for RecordingEngine {
    fn step(&mut self, keys: KeyState) -> Result<(), EngineError> {
        self.calls.push(EngineCall::Step(keys));
        if self.fail_step {
            return Err(EngineError::Unavailable("step failed".to_string()));
        }
        self.torso_x += 1.0;
        Ok(())
    }

    fn torso_state(&self) -> Result<TorsoState, EngineError> {
        self.torso_reads.set(self.torso_reads.get() + 1);
        if self.fail_torso {
            return Err(EngineError::Unavailable("torso unreadable".to_string()));
        }
        Ok(self.torso)
    }

    fn geometry(&self) -> Result<GeometrySnapshot, EngineError> {
        if self.fail_geometry {
            return Err(EngineError::Unavailable("no world".to_string()));
        }
        let radius = if self.malformed_geometry { -1.0 } else { 1.1 };
        Ok(GeometrySnapshot {
            torso_x: self.torso_x,
            body_polygons: vec![vec![
                Vec2::new(self.torso_x - 1.0, -3.0),
                Vec2::new(self.torso_x + 1.0, -3.0),
                Vec2::new(self.torso_x, 0.0),
            ]],
            head: HeadCircle {
                center: Vec2::new(self.torso_x + 1.4, -5.7),
                radius,
            },
            ground_height: 8.908,
        })
    }

    fn apply_torque(&mut self, torque: f32) -> Result<(), EngineError> {
        self.calls.push(EngineCall::ApplyTorque(torque));
        Ok(())
    }

    fn apply_impulse(&mut self, x: f32, y: f32) -> Result<(), EngineError> {
        self.calls.push(EngineCall::ApplyImpulse(x, y));
        Ok(())
    }

    fn reset_world(&mut self) -> Result<(), EngineError> {
        self.calls.push(EngineCall::ResetWorld);
        self.resets += 1;
        self.torso = INITIAL_TORSO;
        self.torso_x = 2.525;
        Ok(())
    }

    fn set_gravity(&mut self, x: f32, y: f32) {
        self.calls.push(EngineCall::SetGravity(x, y));
    }

    fn set_max_torque_multiplier(&mut self, multiplier: f32) {
        self.calls.push(EngineCall::SetTorqueMultiplier(multiplier));
    }

    fn set_body_inertia_multiplier(&mut self, multiplier: f32) {
        self.calls.push(EngineCall::SetInertiaMultiplier(multiplier));
    }

    fn set_point_feet(&mut self, enabled: bool) {
        self.calls.push(EngineCall::SetPointFeet(enabled));
    }
}
