//! Health Handlers
//!
//! `/health` and `/health/live` answer from memory. `/health/ready` also
//! checks the stores the gateway needs: PostgreSQL for history and
//! membership, and Redis when events are relayed across instances.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::startup::AppState;

const DATABASE_SLOW_MS: u64 = 100;
const REDIS_SLOW_MS: u64 = 50;

static STARTED: Lazy<(Instant, DateTime<Utc>)> = Lazy::new(|| (Instant::now(), Utc::now()));

/// Pin the uptime origin to process start rather than the first request.
pub fn init_server_start() {
    Lazy::force(&STARTED);
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// What this gateway instance is doing right now
#[derive(Debug, Serialize)]
pub struct GatewaySummary {
    pub instance_id: String,
    pub active_connections: usize,
    pub relay: &'static str,
    pub presence: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
}

impl GatewaySummary {
    fn of(state: &AppState) -> Self {
        let (since, started_at) = &*STARTED;
        Self {
            instance_id: state.gateway.instance_id().to_owned(),
            active_connections: state.gateway.session_count(),
            relay: state.gateway.relay_name(),
            presence: state.presence.name(),
            uptime_seconds: since.elapsed().as_secs(),
            started_at: started_at.to_rfc3339(),
        }
    }
}

/// Result of checking one backing store
#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct Dependencies {
    pub database: DependencyCheck,
    /// Only checked when cross-instance delivery is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<DependencyCheck>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub gateway: GatewaySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Process is up and the gateway registry answers.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION"),
        gateway: GatewaySummary::of(&state),
        dependencies: None,
    })
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// 503 when the database is gone; Redis trouble only degrades the instance,
/// since local rooms keep working without the relay.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = check_dependency(
        "database",
        DATABASE_SLOW_MS,
        sqlx::query("SELECT 1").execute(&state.db),
    )
    .await;

    let redis = match state.redis.clone() {
        Some(mut conn) => Some(
            check_dependency(
                "redis",
                REDIS_SLOW_MS,
                async move { redis::cmd("PING").query_async::<String>(&mut conn).await },
            )
            .await,
        ),
        None => None,
    };

    let status = overall_status(&database, redis.as_ref());
    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            gateway: GatewaySummary::of(&state),
            dependencies: Some(Dependencies { database, redis }),
        }),
    )
}

/// Time a round trip. Failures are logged here and reported without detail.
async fn check_dependency<T, E, F>(name: &'static str, slow_ms: u64, round_trip: F) -> DependencyCheck
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    match round_trip.await {
        Ok(_) => {
            let latency = start.elapsed().as_millis() as u64;
            DependencyCheck {
                status: classify_latency(latency, slow_ms),
                latency_ms: Some(latency),
            }
        }
        Err(e) => {
            tracing::warn!(dependency = name, error = %e, "Dependency check failed");
            DependencyCheck {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
            }
        }
    }
}

fn classify_latency(latency_ms: u64, slow_ms: u64) -> HealthStatus {
    if latency_ms < slow_ms {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

fn overall_status(database: &DependencyCheck, redis: Option<&DependencyCheck>) -> HealthStatus {
    if database.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }

    let relay_ok = redis.map_or(true, |r| r.status == HealthStatus::Healthy);
    if database.status == HealthStatus::Healthy && relay_ok {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}
