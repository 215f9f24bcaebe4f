use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::Vec2;

use super::{DrawList, DrawPrimitive, DrawTarget, Paint, Viewport};

const CLEAR_COLOR: [u8; 4] = [244, 242, 236, 255];
const BODY_COLOR: [u8; 4] = [0x63, 0x10, 0x00, 255];
const GROUND_COLOR: [u8; 4] = [0x63, 0x60, 0x30, 255];

/// Rasterizes each submitted [`DrawList`] into a `pixels` frame buffer.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    frames_submitted: u64,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            frames_submitted: 0,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// Shows the last rasterized frame.
    pub fn present(&mut self) -> Result<(), Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }
        self.pixels.render()
    }
}

impl DrawTarget for Renderer {
    fn submit(&mut self, frame: &DrawList) {
        let Viewport { width, height } = self.viewport;
        rasterize_draw_list(self.pixels.frame_mut(), width, height, frame);
        self.frames_submitted = self.frames_submitted.saturating_add(1);
    }
}

pub(crate) fn rasterize_draw_list(frame: &mut [u8], width: u32, height: u32, list: &DrawList) {
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&CLEAR_COLOR);
    }
    for primitive in &list.primitives {
        match primitive {
            DrawPrimitive::FilledPolygon { vertices, paint } => {
                fill_polygon(frame, width, height, vertices, paint_color(*paint));
            }
            DrawPrimitive::FilledCircle {
                center,
                radius,
                paint,
            } => fill_circle(frame, width, height, *center, *radius, paint_color(*paint)),
            DrawPrimitive::Line { from, to, paint } => {
                draw_line(frame, width, *from, *to, paint_color(*paint));
            }
        }
    }
}

fn paint_color(paint: Paint) -> [u8; 4] {
    match paint {
        Paint::Body => BODY_COLOR,
        Paint::Ground => GROUND_COLOR,
    }
}

/// Even-odd scanline fill, sampling at pixel centers.
fn fill_polygon(frame: &mut [u8], width: u32, height: u32, vertices: &[Vec2], color: [u8; 4]) {
    if vertices.len() < 3 || width == 0 || height == 0 {
        return;
    }
    let (min_y, max_y) = vertices
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v.y), hi.max(v.y))
        });
    let first_row = (min_y.floor() as i32).max(0);
    let last_row = (max_y.ceil() as i32).min(height as i32 - 1);

    let mut crossings: Vec<f32> = Vec::with_capacity(vertices.len());
    for row in first_row..=last_row {
        let sample_y = row as f32 + 0.5;
        crossings.clear();
        for (index, a) in vertices.iter().enumerate() {
            let b = vertices[(index + 1) % vertices.len()];
            if (a.y <= sample_y) != (b.y <= sample_y) {
                let t = (sample_y - a.y) / (b.y - a.y);
                crossings.push(a.x + t * (b.x - a.x));
            }
        }
        crossings.sort_by(f32::total_cmp);
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil() as i32;
            let end = (span[1] - 0.5).floor() as i32;
            for x in start.max(0)..=end.min(width as i32 - 1) {
                write_pixel_rgba_clipped(frame, width as usize, x, row, color);
            }
        }
    }
}

fn fill_circle(
    frame: &mut [u8],
    width: u32,
    height: u32,
    center: Vec2,
    radius: f32,
    color: [u8; 4],
) {
    if radius <= 0.0 {
        return;
    }
    let first_row = ((center.y - radius).floor() as i32).max(0);
    let last_row = ((center.y + radius).ceil() as i32).min(height as i32 - 1);
    for row in first_row..=last_row {
        let dy = row as f32 + 0.5 - center.y;
        let span_sq = radius * radius - dy * dy;
        if span_sq < 0.0 {
            continue;
        }
        let half = span_sq.sqrt();
        let start = (center.x - half - 0.5).ceil() as i32;
        let end = (center.x + half - 0.5).floor() as i32;
        for x in start.max(0)..=end.min(width as i32 - 1) {
            write_pixel_rgba_clipped(frame, width as usize, x, row, color);
        }
    }
}

fn draw_line(frame: &mut [u8], width: u32, from: Vec2, to: Vec2, color: [u8; 4]) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let x = (from.x + dx * t).floor() as i32;
        let y = (from.y + dy * t).floor() as i32;
        write_pixel_rgba_clipped(frame, width as usize, x, y, color);
    }
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x as usize >= width {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[byte_offset..end].copy_from_slice(&color);
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 20;
    const H: u32 = 10;

    fn blank_frame() -> Vec<u8> {
        vec![0; (W * H * 4) as usize]
    }

    fn pixel(frame: &[u8], x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * W + x) * 4) as usize;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    #[test]
    fn renderer_type_is_non_generic() {
        let _renderer: Option<Renderer> = None;
    }

    #[test]
    fn empty_list_clears_frame() {
        let mut frame = blank_frame();
        rasterize_draw_list(&mut frame, W, H, &DrawList::default());
        assert_eq!(pixel(&frame, 0, 0), CLEAR_COLOR);
        assert_eq!(pixel(&frame, W - 1, H - 1), CLEAR_COLOR);
    }

    #[test]
    fn polygon_fills_interior_only() {
        let mut frame = blank_frame();
        let list = DrawList {
            viewport: None,
            primitives: vec![DrawPrimitive::FilledPolygon {
                vertices: vec![
                    Vec2::new(2.0, 2.0),
                    Vec2::new(6.0, 2.0),
                    Vec2::new(6.0, 6.0),
                    Vec2::new(2.0, 6.0),
                ],
                paint: Paint::Body,
            }],
        };
        rasterize_draw_list(&mut frame, W, H, &list);

        assert_eq!(pixel(&frame, 2, 2), BODY_COLOR);
        assert_eq!(pixel(&frame, 5, 5), BODY_COLOR);
        assert_eq!(pixel(&frame, 6, 3), CLEAR_COLOR);
        assert_eq!(pixel(&frame, 3, 6), CLEAR_COLOR);
        assert_eq!(pixel(&frame, 1, 3), CLEAR_COLOR);
    }

    #[test]
    fn circle_covers_center_not_corners() {
        let mut frame = blank_frame();
        let list = DrawList {
            viewport: None,
            primitives: vec![DrawPrimitive::FilledCircle {
                center: Vec2::new(10.0, 5.0),
                radius: 3.0,
                paint: Paint::Body,
            }],
        };
        rasterize_draw_list(&mut frame, W, H, &list);

        assert_eq!(pixel(&frame, 10, 5), BODY_COLOR);
        assert_eq!(pixel(&frame, 7, 2), CLEAR_COLOR);
        assert_eq!(pixel(&frame, 15, 5), CLEAR_COLOR);
    }

    #[test]
    fn line_spans_endpoints_and_clips_offscreen() {
        let mut frame = blank_frame();
        let list = DrawList {
            viewport: None,
            primitives: vec![DrawPrimitive::Line {
                from: Vec2::new(-5.0, 4.0),
                to: Vec2::new(30.0, 4.0),
                paint: Paint::Ground,
            }],
        };
        rasterize_draw_list(&mut frame, W, H, &list);

        for x in 0..W {
            assert_eq!(pixel(&frame, x, 4), GROUND_COLOR, "x={x}");
        }
        assert_eq!(pixel(&frame, 0, 5), CLEAR_COLOR);
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut frame = blank_frame();
        write_pixel_rgba_clipped(&mut frame, W as usize, -1, 0, BODY_COLOR);
        write_pixel_rgba_clipped(&mut frame, W as usize, W as i32, 0, BODY_COLOR);
        write_pixel_rgba_clipped(&mut frame, W as usize, 0, H as i32, BODY_COLOR);
        assert!(frame.iter().all(|byte| *byte == 0));
    }
}
