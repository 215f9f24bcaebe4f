use serde::Deserialize;

use super::engine::TorsoState;

/// Forward lean subtracted from the starting torso angle to form the angle
/// setpoint, so the runner is held slightly pitched rather than upright.
pub const ANGLE_LEAN_OFFSET: f32 = 0.2;

const ANGLE_GAIN_K_PER_STRENGTH: f32 = 100.0;
const ANGLE_GAIN_C_PER_STRENGTH: f32 = 10.0;
const HEIGHT_GAIN_K_PER_STRENGTH: f32 = 0.6;
const HEIGHT_GAIN_C_PER_STRENGTH: f32 = 0.06;

/// PD law: `gain_k * (setpoint - current) - gain_c * current_rate`.
///
/// No integral term and no saturation; negative gains just flip the sign.
pub fn compute(current: f32, current_rate: f32, setpoint: f32, gain_k: f32, gain_c: f32) -> f32 {
    gain_k * (setpoint - current) - gain_c * current_rate
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerKind {
    /// Torque on the torso about its angle.
    Angle,
    /// Vertical impulse on the torso about its height.
    Height,
}

impl StabilizerKind {
    pub fn gains_for_strength(self, strength: f32) -> (f32, f32) {
        match self {
            StabilizerKind::Angle => (
                strength * ANGLE_GAIN_K_PER_STRENGTH,
                strength * ANGLE_GAIN_C_PER_STRENGTH,
            ),
            StabilizerKind::Height => (
                strength * HEIGHT_GAIN_K_PER_STRENGTH,
                strength * HEIGHT_GAIN_C_PER_STRENGTH,
            ),
        }
    }

    /// Setpoint for an episode whose torso started at `initial`.
    pub fn setpoint(self, initial: &TorsoState) -> f32 {
        match self {
            StabilizerKind::Angle => initial.angle - ANGLE_LEAN_OFFSET,
            StabilizerKind::Height => initial.y,
        }
    }

    fn measure(self, state: &TorsoState) -> (f32, f32) {
        match self {
            StabilizerKind::Angle => (state.angle, state.angular_velocity),
            StabilizerKind::Height => (state.y, state.vertical_velocity),
        }
    }
}

/// User-facing stabilizer settings as they appear in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StabilizerSettings {
    pub enabled: bool,
    pub strength: f32,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizerConfig {
    pub kind: StabilizerKind,
    pub enabled: bool,
    pub gain_k: f32,
    pub gain_c: f32,
    pub setpoint: f32,
}

impl StabilizerConfig {
    pub fn new(kind: StabilizerKind, settings: StabilizerSettings) -> Self {
        let (gain_k, gain_c) = kind.gains_for_strength(settings.strength);
        Self {
            kind,
            enabled: settings.enabled,
            gain_k,
            gain_c,
            setpoint: 0.0,
        }
    }

    pub fn set_strength(&mut self, strength: f32) {
        let (gain_k, gain_c) = self.kind.gains_for_strength(strength);
        self.gain_k = gain_k;
        self.gain_c = gain_c;
    }

    pub fn rebase(&mut self, initial: &TorsoState) {
        self.setpoint = self.kind.setpoint(initial);
    }

    /// Correction for this tick, or `None` when disabled so that no engine
    /// call is made at all.
    pub fn correction(&self, state: &TorsoState) -> Option<f32> {
        if !self.enabled {
            return None;
        }
        let (current, rate) = self.kind.measure(state);
        Some(compute(current, rate, self.setpoint, self.gain_k, self.gain_c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "actual={actual} expected={expected}"
        );
    }

    #[test]
    fn angle_correction_pulls_toward_lean_setpoint() {
        let theta0 = -1.251;
        let output = compute(theta0, 0.0, theta0 - ANGLE_LEAN_OFFSET, 100.0, 10.0);
        assert_close(output, -20.0);
    }

    #[test]
    fn output_is_linear_in_gains() {
        let single = compute(0.3, -1.5, 1.1, 40.0, 4.0);
        let doubled = compute(0.3, -1.5, 1.1, 80.0, 8.0);
        assert_close(doubled, 2.0 * single);
    }

    #[test]
    fn rate_term_damps_motion() {
        assert_close(compute(0.0, 2.0, 0.0, 0.0, 3.0), -6.0);
    }

    #[test]
    fn negative_gains_flip_sign_without_failing() {
        let positive = compute(1.0, 0.0, 2.0, 5.0, 0.0);
        let negative = compute(1.0, 0.0, 2.0, -5.0, 0.0);
        assert_close(negative, -positive);
    }

    #[test]
    fn strength_maps_to_kind_specific_gains() {
        assert_eq!(StabilizerKind::Angle.gains_for_strength(2.0), (200.0, 20.0));
        let (k, c) = StabilizerKind::Height.gains_for_strength(10.0);
        assert_close(k, 6.0);
        assert_close(c, 0.6);
    }

    #[test]
    fn setpoints_follow_episode_start() {
        let initial = TorsoState {
            angle: -1.0,
            angular_velocity: 0.5,
            y: -2.0,
            vertical_velocity: 0.1,
        };
        assert_close(StabilizerKind::Angle.setpoint(&initial), -1.2);
        assert_close(StabilizerKind::Height.setpoint(&initial), -2.0);
    }

    #[test]
    fn disabled_stabilizer_yields_no_correction() {
        let config = StabilizerConfig::new(
            StabilizerKind::Angle,
            StabilizerSettings {
                enabled: false,
                strength: 5.0,
            },
        );
        assert_eq!(config.correction(&TorsoState::default()), None);
    }

    #[test]
    fn height_correction_uses_vertical_channel() {
        let mut config = StabilizerConfig::new(
            StabilizerKind::Height,
            StabilizerSettings {
                enabled: true,
                strength: 10.0,
            },
        );
        config.rebase(&TorsoState {
            y: -2.0,
            ..TorsoState::default()
        });

        let state = TorsoState {
            angle: 3.0,
            angular_velocity: 3.0,
            y: -1.0,
            vertical_velocity: 2.0,
        };
        let output = config.correction(&state).expect("enabled");
        assert_close(output, 6.0 * (-2.0 - -1.0) - 0.6 * 2.0);
    }
}
