use std::f32::consts::FRAC_PI_2;

use ragdoll_loop::{
    EngineError, GeometrySnapshot, HeadCircle, KeyState, SimulationEngine, TorsoState, Vec2,
};

const TICK_SECONDS: f32 = 0.04;
const GROUND_HEIGHT: f32 = 8.908_13;

const INITIAL_TORSO_X: f32 = 2.525;
const INITIAL_TORSO_Y: f32 = -1.926;
const INITIAL_TORSO_ANGLE: f32 = -1.251;
/// Straight up in a y-down world.
const UPRIGHT_ANGLE: f32 = -FRAC_PI_2;

const TORSO_HALF_LENGTH: f32 = 2.0;
const TORSO_HALF_WIDTH: f32 = 0.6;
const SHOULDER_OFFSET: f32 = 1.6;
const HEAD_RADIUS: f32 = 1.1;
const NECK_LENGTH: f32 = 0.9;
const THIGH_LENGTH: f32 = 4.3;
const SHIN_LENGTH: f32 = 4.3;
const LIMB_HALF_WIDTH: f32 = 0.35;
const FOOT_LENGTH: f32 = 1.4;
const UPPER_ARM_LENGTH: f32 = 2.5;
const FOREARM_LENGTH: f32 = 2.3;
const ARM_HALF_WIDTH: f32 = 0.25;

const HIP_SWING: f32 = 0.6;
const KNEE_BEND: f32 = 0.9;
const JOINT_RATE_PER_TICK: f32 = 0.2;
const TORSO_INERTIA: f32 = 20.0;
const TORSO_MASS: f32 = 4.0;
const TOPPLE_GAIN: f32 = 0.05;
const ANGULAR_DAMPING: f32 = 0.98;

/// Kinematic stand-in for a physics engine.
///
/// Joints chase key-driven targets, the torso tips under gravity and
/// answers corrective torque and impulse, and the lowest leg point is held
/// on the ground. Scissoring the hips carries the body forward. There is no
/// collision or contact solving beyond that.
#[derive(Debug, Clone)]
pub(crate) struct PuppetEngine {
    torso_x: f32,
    torso_y: f32,
    torso_angle: f32,
    angular_velocity: f32,
    vertical_velocity: f32,
    hips: [f32; 2],
    knees: [f32; 2],
    pending_torque: f32,
    pending_impulse: f32,
    gravity: f32,
    torque_multiplier: f32,
    inertia_multiplier: f32,
    point_feet_requested: bool,
    point_feet: bool,
}

impl Default for PuppetEngine {
    fn default() -> Self {
        let mut engine = Self {
            torso_x: 0.0,
            torso_y: 0.0,
            torso_angle: 0.0,
            angular_velocity: 0.0,
            vertical_velocity: 0.0,
            hips: [0.0; 2],
            knees: [0.0; 2],
            pending_torque: 0.0,
            pending_impulse: 0.0,
            gravity: 10.0,
            torque_multiplier: 1.0,
            inertia_multiplier: 1.0,
            point_feet_requested: false,
            point_feet: false,
        };
        engine.rebuild_world();
        engine
    }
}

impl PuppetEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn rebuild_world(&mut self) {
        self.torso_x = INITIAL_TORSO_X;
        self.torso_y = INITIAL_TORSO_Y;
        self.torso_angle = INITIAL_TORSO_ANGLE;
        self.angular_velocity = 0.0;
        self.vertical_velocity = 0.0;
        self.hips = [0.0; 2];
        self.knees = [0.0; 2];
        self.pending_torque = 0.0;
        self.pending_impulse = 0.0;
        self.point_feet = self.point_feet_requested;
    }

    fn up(&self) -> Vec2 {
        Vec2::new(self.torso_angle.cos(), self.torso_angle.sin())
    }

    fn torso_center(&self) -> Vec2 {
        Vec2::new(self.torso_x, self.torso_y)
    }

    fn hip(&self) -> Vec2 {
        along(self.torso_center(), self.up(), -TORSO_HALF_LENGTH)
    }

    fn shoulder(&self) -> Vec2 {
        along(self.torso_center(), self.up(), SHOULDER_OFFSET)
    }

    /// Knee, ankle and toe for leg `side`.
    fn leg(&self, side: usize) -> [Vec2; 4] {
        let hip = self.hip();
        let thigh_dir = hanging(self.hips[side]);
        let knee = along(hip, thigh_dir, THIGH_LENGTH);
        let shin_dir = hanging(self.hips[side] - self.knees[side]);
        let ankle = along(knee, shin_dir, SHIN_LENGTH);
        let toe = Vec2::new(ankle.x + FOOT_LENGTH, ankle.y);
        [hip, knee, ankle, toe]
    }

    fn arm(&self, side: usize) -> [Vec2; 3] {
        let shoulder = self.shoulder();
        // Arms counter-swing the opposite hip.
        let swing = -self.hips[side];
        let elbow = along(shoulder, hanging(swing), UPPER_ARM_LENGTH);
        let hand = along(elbow, hanging(swing + 0.4), FOREARM_LENGTH);
        [shoulder, elbow, hand]
    }

    fn lowest_leg_point(&self) -> f32 {
        (0..2)
            .flat_map(|side| {
                let [_, knee, ankle, toe] = self.leg(side);
                [knee.y, ankle.y, toe.y]
            })
            .fold(f32::NEG_INFINITY, f32::max)
            + LIMB_HALF_WIDTH
    }

    fn drive_joints(&mut self, keys: KeyState) {
        let hip_target = match (keys.q(), keys.w()) {
            (true, false) => [HIP_SWING, -HIP_SWING],
            (false, true) => [-HIP_SWING, HIP_SWING],
            _ => [0.0, 0.0],
        };
        let knee_target = match (keys.o(), keys.p()) {
            (true, false) => [KNEE_BEND, 0.0],
            (false, true) => [0.0, KNEE_BEND],
            _ => [0.0, 0.0],
        };
        let rate = JOINT_RATE_PER_TICK * self.torque_multiplier / self.inertia_multiplier.max(0.1);
        for side in 0..2 {
            self.hips[side] = approach(self.hips[side], hip_target[side], rate);
            self.knees[side] = approach(self.knees[side], knee_target[side], rate);
        }
    }
}

impl SimulationEngine for PuppetEngine {
    fn step(&mut self, keys: KeyState) -> Result<(), EngineError> {
        let spread_before = self.hips[0] - self.hips[1];
        self.drive_joints(keys);
        let spread_after = self.hips[0] - self.hips[1];
        self.torso_x += 0.5 * THIGH_LENGTH * (spread_after - spread_before).abs();

        let inertia = TORSO_INERTIA * self.inertia_multiplier.max(0.1);
        let topple = self.gravity * TOPPLE_GAIN * (self.torso_angle - UPRIGHT_ANGLE).sin();
        self.angular_velocity += TICK_SECONDS * (self.pending_torque / inertia + topple);
        self.angular_velocity *= ANGULAR_DAMPING;
        self.torso_angle += self.angular_velocity * TICK_SECONDS;

        self.vertical_velocity += self.pending_impulse / TORSO_MASS + self.gravity * TICK_SECONDS;
        self.torso_y += self.vertical_velocity * TICK_SECONDS;
        let penetration = self.lowest_leg_point() - GROUND_HEIGHT;
        if penetration > 0.0 {
            self.torso_y -= penetration;
            self.vertical_velocity = self.vertical_velocity.min(0.0);
        }

        self.pending_torque = 0.0;
        self.pending_impulse = 0.0;
        Ok(())
    }

    fn torso_state(&self) -> Result<TorsoState, EngineError> {
        Ok(TorsoState {
            angle: self.torso_angle,
            angular_velocity: self.angular_velocity,
            y: self.torso_y,
            vertical_velocity: self.vertical_velocity,
        })
    }

    fn geometry(&self) -> Result<GeometrySnapshot, EngineError> {
        let mut body_polygons = Vec::with_capacity(11);
        body_polygons.push(segment_quad(
            self.hip(),
            along(self.torso_center(), self.up(), TORSO_HALF_LENGTH),
            TORSO_HALF_WIDTH,
        ));
        for side in 0..2 {
            let [hip, knee, ankle, toe] = self.leg(side);
            body_polygons.push(segment_quad(hip, knee, LIMB_HALF_WIDTH));
            body_polygons.push(segment_quad(knee, ankle, LIMB_HALF_WIDTH));
            if !self.point_feet {
                body_polygons.push(segment_quad(ankle, toe, LIMB_HALF_WIDTH));
            }
        }
        for side in 0..2 {
            let [shoulder, elbow, hand] = self.arm(side);
            body_polygons.push(segment_quad(shoulder, elbow, ARM_HALF_WIDTH));
            body_polygons.push(segment_quad(elbow, hand, ARM_HALF_WIDTH));
        }

        Ok(GeometrySnapshot {
            torso_x: self.torso_x,
            body_polygons,
            head: HeadCircle {
                center: along(
                    self.torso_center(),
                    self.up(),
                    TORSO_HALF_LENGTH + NECK_LENGTH + HEAD_RADIUS,
                ),
                radius: HEAD_RADIUS,
            },
            ground_height: GROUND_HEIGHT,
        })
    }

    fn apply_torque(&mut self, torque: f32) -> Result<(), EngineError> {
        self.pending_torque += torque;
        Ok(())
    }

    fn apply_impulse(&mut self, _x: f32, y: f32) -> Result<(), EngineError> {
        self.pending_impulse += y;
        Ok(())
    }

    fn reset_world(&mut self) -> Result<(), EngineError> {
        self.rebuild_world();
        Ok(())
    }

    fn set_gravity(&mut self, _x: f32, y: f32) {
        self.gravity = y;
    }

    fn set_max_torque_multiplier(&mut self, multiplier: f32) {
        self.torque_multiplier = multiplier;
    }

    fn set_body_inertia_multiplier(&mut self, multiplier: f32) {
        self.inertia_multiplier = multiplier;
    }

    fn set_point_feet(&mut self, enabled: bool) {
        self.point_feet_requested = enabled;
    }
}

fn along(origin: Vec2, direction: Vec2, distance: f32) -> Vec2 {
    Vec2::new(
        origin.x + direction.x * distance,
        origin.y + direction.y * distance,
    )
}

/// Unit vector pointing down, swung forward by `angle`.
fn hanging(angle: f32) -> Vec2 {
    Vec2::new(angle.sin(), angle.cos())
}

fn approach(current: f32, target: f32, max_step: f32) -> f32 {
    current + (target - current).clamp(-max_step, max_step)
}

fn segment_quad(from: Vec2, to: Vec2, half_width: f32) -> Vec<Vec2> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt().max(f32::EPSILON);
    let nx = -dy / length * half_width;
    let ny = dx / length * half_width;
    vec![
        Vec2::new(from.x + nx, from.y + ny),
        Vec2::new(to.x + nx, to.y + ny),
        Vec2::new(to.x - nx, to.y - ny),
        Vec2::new(from.x - nx, from.y - ny),
    ]
}
