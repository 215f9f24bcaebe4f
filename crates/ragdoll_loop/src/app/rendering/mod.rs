mod renderer;
mod transform;

pub use renderer::Renderer;
pub use transform::{
    DrawList, DrawPrimitive, Paint, ProjectionConfig, ProjectionState, Viewport,
    DASH_OFFSET_PX, DASH_SPACING_PX, PIXELS_PER_WORLD,
};

/// Receives each tick's screen-space primitives.
pub trait DrawTarget {
    fn submit(&mut self, frame: &DrawList);
}

impl DrawTarget for Vec<DrawList> {
    fn submit(&mut self, frame: &DrawList) {
        self.push(frame.clone());
    }
}
