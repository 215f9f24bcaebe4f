use ragdoll_loop::{load_app_config, AppConfig, ConfigError};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::puppet::PuppetEngine;

pub(crate) struct AppWiring {
    pub(crate) config: AppConfig,
    pub(crate) engine: PuppetEngine,
}

pub(crate) fn build_app() -> Result<AppWiring, ConfigError> {
    init_tracing();
    info!("=== Ragdoll Runner Startup ===");

    let config = load_app_config()?;
    info!(
        tick_rate_hz = config.timing.tick_rate_hz,
        gravity = config.physics.gravity,
        angle_stabilizer = config.angle_stabilizer.enabled,
        height_stabilizer = config.height_stabilizer.enabled,
        sequence = config.sequence.as_deref().unwrap_or("-"),
        "config_resolved"
    );

    Ok(AppWiring {
        config,
        engine: PuppetEngine::new(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
