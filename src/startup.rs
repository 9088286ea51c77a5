//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::application::events::{EventRelay, NoopRelay};
use crate::application::presence::PresenceStore;
use crate::application::services::{ChatServiceImpl, NotificationServiceImpl};
use crate::config::Settings;
use crate::infrastructure::cache::{self, LocalPresence, RedisPresence};
use crate::infrastructure::database;
use crate::infrastructure::pubsub::{spawn_subscriber, RedisRelay};
use crate::infrastructure::repositories::{
    PgMessageRepository, PgNotificationRepository, PgRoomRepository,
};
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::TokenVerifier;
use crate::presentation::websocket::Gateway;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Present only when cross-instance delivery is enabled
    pub redis: Option<ConnectionManager>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub gateway: Arc<Gateway>,
    pub presence: Arc<dyn PresenceStore>,
    pub verifier: Arc<TokenVerifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        db: PgPool,
        redis: Option<ConnectionManager>,
        instance_id: String,
        relay: Arc<dyn EventRelay>,
        presence: Arc<dyn PresenceStore>,
    ) -> Self {
        let snowflake = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id as u64,
            settings.snowflake.epoch,
        ));
        let gateway = Arc::new(Gateway::new(
            instance_id,
            relay,
            settings.websocket.heartbeat_interval_ms,
        ));
        let verifier = Arc::new(TokenVerifier::new(&settings.jwt));

        Self {
            db,
            redis,
            snowflake,
            gateway,
            presence,
            verifier,
            settings: Arc::new(settings),
        }
    }

    /// State for a gateway that runs alone: no relay, in-process presence.
    pub fn single_instance(settings: Settings, db: PgPool) -> Self {
        Self::new(
            settings,
            db,
            None,
            Uuid::new_v4().to_string(),
            Arc::new(NoopRelay),
            Arc::new(LocalPresence::new()),
        )
    }

    pub fn chat_service(&self) -> ChatServiceImpl<PgRoomRepository, PgMessageRepository> {
        ChatServiceImpl::new(
            Arc::new(PgRoomRepository::new(self.db.clone())),
            Arc::new(PgMessageRepository::new(self.db.clone())),
            self.gateway.clone(),
            self.snowflake.clone(),
        )
    }

    pub fn notification_service(&self) -> NotificationServiceImpl<PgNotificationRepository> {
        NotificationServiceImpl::new(
            Arc::new(PgNotificationRepository::new(self.db.clone())),
            self.gateway.clone(),
            self.snowflake.clone(),
        )
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    gateway: Arc<Gateway>,
    subscriber: Option<JoinHandle<()>>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        handlers::health::init_server_start();

        let db = database::create_pool(&settings.database)
            .await
            .context("failed to connect to PostgreSQL")?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db)
                .await
                .context("failed to apply migrations")?;
            tracing::info!("Database migrations applied");
        }

        let addr = settings.server_addr();

        let (state, subscriber) = if settings.redis.enabled {
            let instance_id = Uuid::new_v4().to_string();
            let conn = cache::create_redis_client(&settings.redis)
                .await
                .context("failed to connect to Redis")?;
            let client = redis::Client::open(settings.redis.url.as_str())?;
            let channel = settings.redis.channel.clone();

            let relay = Arc::new(RedisRelay::start(
                conn.clone(),
                channel.clone(),
                instance_id.clone(),
            ));
            let presence = Arc::new(RedisPresence::new(
                conn.clone(),
                settings.redis.presence_ttl_secs,
            ));

            let state = AppState::new(settings, db, Some(conn), instance_id.clone(), relay, presence);
            let subscriber = spawn_subscriber(client, channel, instance_id, state.gateway.clone());
            (state, Some(subscriber))
        } else {
            (AppState::single_instance(settings, db), None)
        };

        tracing::info!(
            instance_id = state.gateway.instance_id(),
            relay = state.gateway.relay_name(),
            presence = state.presence.name(),
            "Gateway initialized"
        );

        let gateway = state.gateway.clone();
        let router = routes::create_router(state);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            gateway,
            subscriber,
        })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(subscriber) = self.subscriber {
            subscriber.abort();
        }

        tracing::info!(
            sessions = self.gateway.session_count(),
            "Server stopped; dropping remaining gateway sessions"
        );
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
