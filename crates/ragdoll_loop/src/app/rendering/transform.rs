use serde::Deserialize;
use tracing::warn;

use crate::app::{GeometrySnapshot, Vec2};

pub const PIXELS_PER_WORLD: f32 = 17.0;
pub const DASH_SPACING_PX: f32 = 25.0;
/// Each ground dash slants back-and-down from its anchor by this much.
pub const DASH_OFFSET_PX: Vec2 = Vec2 { x: -8.0, y: 12.0 };
const MAX_GROUND_Y_OFFSET_PX: f32 = 300.0;
const GROUND_Y_OFFSET_DIVISOR: f32 = 2.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectionConfig {
    pub pixels_per_world: f32,
    pub dash_spacing_px: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            pixels_per_world: PIXELS_PER_WORLD,
            dash_spacing_px: DASH_SPACING_PX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Body,
    Ground,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawPrimitive {
    FilledPolygon {
        vertices: Vec<Vec2>,
        paint: Paint,
    },
    FilledCircle {
        center: Vec2,
        radius: f32,
        paint: Paint,
    },
    Line {
        from: Vec2,
        to: Vec2,
        paint: Paint,
    },
}

/// Screen-space primitives for one tick, in draw order: body polygons,
/// head, ground line, then ground dashes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    pub viewport: Option<Viewport>,
    pub primitives: Vec<DrawPrimitive>,
}

/// Torso-locked side-scrolling camera.
///
/// The scale is fixed at construction; viewport changes only move the
/// screen origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionState {
    scale: f32,
    dash_spacing: f32,
    viewport: Viewport,
    x_offset: f32,
    y_offset: f32,
    dash_phase: f32,
}

impl ProjectionState {
    /// A dash spacing that is not a positive finite number falls back to
    /// [`DASH_SPACING_PX`].
    pub fn new(config: ProjectionConfig, viewport: Viewport) -> Self {
        let spacing_is_valid = config.dash_spacing_px.is_finite() && config.dash_spacing_px > 0.0;
        let dash_spacing = if spacing_is_valid {
            config.dash_spacing_px
        } else {
            warn!(
                dash_spacing_px = config.dash_spacing_px,
                fallback_px = DASH_SPACING_PX,
                "dash_spacing_invalid"
            );
            DASH_SPACING_PX
        };
        let mut state = Self {
            scale: config.pixels_per_world,
            dash_spacing,
            viewport,
            x_offset: 0.0,
            y_offset: 0.0,
            dash_phase: 0.0,
        };
        state.resize(viewport);
        state
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.x_offset = viewport.width as f32 * 0.5;
        self.y_offset =
            MAX_GROUND_Y_OFFSET_PX.min(viewport.height as f32 / GROUND_Y_OFFSET_DIVISOR);
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.x_offset, self.y_offset)
    }

    /// Phase of the most recent projection, in `[0, dash_spacing)`.
    pub fn dash_phase(&self) -> f32 {
        self.dash_phase
    }

    pub fn world_to_screen(&self, world: Vec2, torso_x: f32) -> Vec2 {
        Vec2::new(
            self.scale * (world.x - torso_x) + self.x_offset,
            self.scale * world.y + self.y_offset,
        )
    }

    pub fn dash_phase_for(&self, torso_x: f32) -> f32 {
        let phase = (-self.scale * torso_x).rem_euclid(self.dash_spacing);
        // rem_euclid rounds tiny negative dividends up to exactly the spacing.
        if phase >= self.dash_spacing {
            0.0
        } else {
            phase
        }
    }

    pub fn dash_spacing(&self) -> f32 {
        self.dash_spacing
    }

    pub fn project(&mut self, snapshot: &GeometrySnapshot) -> DrawList {
        let torso_x = snapshot.torso_x;
        let mut primitives = Vec::with_capacity(snapshot.body_polygons.len() + 2);

        for polygon in &snapshot.body_polygons {
            primitives.push(DrawPrimitive::FilledPolygon {
                vertices: polygon
                    .iter()
                    .map(|vertex| self.world_to_screen(*vertex, torso_x))
                    .collect(),
                paint: Paint::Body,
            });
        }

        primitives.push(DrawPrimitive::FilledCircle {
            center: self.world_to_screen(snapshot.head.center, torso_x),
            radius: self.scale * snapshot.head.radius,
            paint: Paint::Body,
        });

        let ground_y = self.scale * snapshot.ground_height + self.y_offset;
        let width = self.viewport.width as f32;
        primitives.push(DrawPrimitive::Line {
            from: Vec2::new(0.0, ground_y),
            to: Vec2::new(width, ground_y),
            paint: Paint::Ground,
        });

        self.dash_phase = self.dash_phase_for(torso_x);
        let mut dash_x = self.dash_phase;
        while dash_x.is_finite() && dash_x < width {
            primitives.push(DrawPrimitive::Line {
                from: Vec2::new(dash_x, ground_y),
                to: Vec2::new(dash_x + DASH_OFFSET_PX.x, ground_y + DASH_OFFSET_PX.y),
                paint: Paint::Ground,
            });
            dash_x += self.dash_spacing;
        }

        DrawList {
            viewport: Some(self.viewport),
            primitives,
        }
    }
}
