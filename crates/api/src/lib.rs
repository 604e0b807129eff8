//! HTTP surface of the phone plan CQRS pipeline.
//!
//! Exposes the plan commands and the projected view over REST, runs the
//! event processors in-process, and reports through tracing and Prometheus.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use pipeline::{Pipeline, StartupError};
use routes::plans::AppState;

/// Registers descriptions for every counter the pipeline emits.
pub fn describe_metrics() {
    metrics::describe_counter!("plan_changes_total", "Plan changes committed and published");
    metrics::describe_counter!(
        "plan_publish_after_commit_failures_total",
        "Plan changes committed whose event could not be published"
    );
    metrics::describe_counter!("usage_updates_total", "Usage events published");
    metrics::describe_counter!(
        "projection_events_processed_total",
        "Events applied to the plan projection"
    );
    metrics::describe_counter!(
        "projection_event_errors_total",
        "Events that exhausted their apply retries"
    );
    metrics::describe_counter!(
        "projection_events_skipped_total",
        "Events checkpointed without being applied"
    );
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/plan/change", post(routes::plans::change))
        .route("/plan/usage", post(routes::plans::usage))
        .route("/plan/{user_id}", get(routes::plans::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
