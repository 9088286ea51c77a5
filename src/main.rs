//! # Campus Chat
//!
//! Entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Database connection pool and migrations
//! - Optional Redis relay
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use campus_chat::config::Settings;
use campus_chat::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings decide the log format, so they load first
    let settings = Settings::load()?;
    campus_chat::telemetry::init_tracing(&settings.telemetry);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        redis = settings.redis.enabled,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
