mod actions;
mod engine;
mod frame_loop;
mod input;
mod loop_runner;
mod metrics;
mod multiplexer;
mod rendering;
mod sequence;
mod session;
mod stabilizer;
#[cfg(test)]
mod test_engine;

pub use actions::{Action, ActionQueue};
pub use engine::{
    EngineError, GeometrySnapshot, HeadCircle, PhysicsParams, SimulationEngine, TorsoState, Vec2,
};
pub use frame_loop::{AdvanceReport, FrameLoop, LoopConfig, LoopError, LoopState};
pub use input::{ControlKey, KeyState};
pub use loop_runner::{run_app, run_app_with_metrics, AppError};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use multiplexer::{InputMultiplexer, InputSource};
pub use rendering::{
    DrawList, DrawPrimitive, DrawTarget, Paint, ProjectionConfig, ProjectionState, Renderer,
    Viewport, DASH_OFFSET_PX, DASH_SPACING_PX, PIXELS_PER_WORLD,
};
pub use sequence::{parse_sequence, SequenceError, STRIDE_PATTERN};
pub use session::{ConfigUpdate, Session, SessionConfig, TickError, TickStage, TickSummary};
pub use stabilizer::{
    compute, StabilizerConfig, StabilizerKind, StabilizerSettings, ANGLE_LEAN_OFFSET,
};
