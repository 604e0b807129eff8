//! Plan command and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::UserId;
use domain::{ChangePlan, PhonePlan, PlanCommandService, PlanRepository, RecordUsage, UsageAck};
use event_bus::EventBus;
use projections::{PhonePlanView, PlanQueryService, ProcessorMonitor, ViewStore};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub commands: PlanCommandService<Arc<dyn PlanRepository>, Arc<dyn EventBus>>,
    pub queries: PlanQueryService<Arc<dyn ViewStore>>,
    /// Running processors, reported by the health check.
    pub processors: Vec<ProcessorMonitor>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn PlanRepository>,
        bus: Arc<dyn EventBus>,
        views: Arc<dyn ViewStore>,
    ) -> Self {
        Self {
            commands: PlanCommandService::new(repository, bus),
            queries: PlanQueryService::new(views),
            processors: Vec::new(),
        }
    }

    pub fn with_processors(mut self, processors: Vec<ProcessorMonitor>) -> Self {
        self.processors = processors;
        self
    }
}

/// POST /plan/change — create or merge a plan and publish PLAN_CHANGED.
#[tracing::instrument(skip(state, cmd), fields(user_id = %cmd.user_id))]
pub async fn change(
    State(state): State<Arc<AppState>>,
    Json(cmd): Json<ChangePlan>,
) -> Result<Json<PhonePlan>, ApiError> {
    let plan = state.commands.change_plan(cmd).await?;
    Ok(Json(plan))
}

/// POST /plan/usage — publish USAGE_UPDATED for an existing plan.
#[tracing::instrument(skip(state, cmd), fields(user_id = %cmd.user_id))]
pub async fn usage(
    State(state): State<Arc<AppState>>,
    Json(cmd): Json<RecordUsage>,
) -> Result<Json<UsageAck>, ApiError> {
    let ack = state.commands.record_usage(cmd).await?;
    Ok(Json(ack))
}

/// GET /plan/{user_id} — read the projected view.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PhonePlanView>, ApiError> {
    let user_id = UserId::new(user_id);
    if user_id.is_blank() {
        return Err(ApiError::BadRequest("userId must not be empty".to_string()));
    }
    let view = state.queries.get_view(&user_id).await?;
    Ok(Json(view))
}
