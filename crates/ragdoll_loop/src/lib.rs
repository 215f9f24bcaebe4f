pub mod app;
pub mod config;

pub use app::{
    compute, parse_sequence, run_app, run_app_with_metrics, Action, ActionQueue, AdvanceReport,
    AppError, ConfigUpdate, ControlKey, DrawList, DrawPrimitive, DrawTarget, EngineError,
    FrameLoop, GeometrySnapshot, HeadCircle, InputMultiplexer, InputSource, KeyState, LoopConfig,
    LoopError, LoopMetricsSnapshot, LoopState, MetricsHandle, Paint, PhysicsParams,
    ProjectionConfig, ProjectionState, Renderer, SequenceError, Session, SessionConfig,
    SimulationEngine, StabilizerConfig, StabilizerKind, StabilizerSettings, TickError, TickStage,
    TickSummary, TorsoState, Vec2, Viewport, ANGLE_LEAN_OFFSET, DASH_OFFSET_PX, DASH_SPACING_PX,
    PIXELS_PER_WORLD, STRIDE_PATTERN,
};
pub use config::{
    load_app_config, AppConfig, ConfigError, LoopSettings, WindowSettings, CONFIG_ENV_VAR,
    SEQUENCE_ENV_VAR,
};
