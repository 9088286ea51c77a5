//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use std::any::Any;

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, cors, logging};
use crate::presentation::websocket::ws_handler;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Create the main router with its middleware stack
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket gateway; authenticates from the query string or header
        .route("/gateway", get(ws_handler))
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        // Only matched routes, so the path label stays bounded
        .route_layer(middleware::from_fn(logging::track_metrics))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(logging::create_trace_layer())
                .layer(cors::create_cors_layer(&state.settings.cors))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(state)
}

/// API v1 routes, all behind bearer authentication
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/rooms", room_routes())
        .route("/presence/{user_id}", get(handlers::presence::user_presence))
        .nest("/notifications", notification_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        .layer(CompressionLayer::new())
}

fn room_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::rooms::list_rooms).post(handlers::rooms::create_room),
        )
        .route(
            "/{room_id}",
            get(handlers::rooms::get_room).delete(handlers::rooms::delete_room),
        )
        .route("/{room_id}/members", post(handlers::rooms::add_member))
        .route(
            "/{room_id}/members/{user_id}",
            delete(handlers::rooms::remove_member),
        )
        .route(
            "/{room_id}/messages",
            get(handlers::messages::get_messages).post(handlers::messages::send_message),
        )
        .route(
            "/{room_id}/messages/{message_id}",
            delete(handlers::messages::delete_message),
        )
        .route("/{room_id}/presence", get(handlers::presence::room_presence))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::notifications::list_notifications)
                .post(handlers::notifications::create_notification),
        )
        .route("/unread-count", get(handlers::notifications::unread_count))
        .route("/read-all", post(handlers::notifications::mark_all_read))
        .route("/{id}", delete(handlers::notifications::delete_notification))
        .route("/{id}/read", patch(handlers::notifications::mark_read))
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    AppError::Internal(format!("Handler panicked: {detail}")).into_response()
}
