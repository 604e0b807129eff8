//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use projections::PartitionState;
use serde::Serialize;

use super::plans::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `"degraded"` while any partition is stalled.
    pub status: &'static str,
    pub processors: Vec<ProcessorHealth>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorHealth {
    pub topic: String,
    pub partitions: Vec<PartitionState>,
    pub stalled_partitions: Vec<u32>,
}

/// GET /health — reports the state of every processor partition.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let processors: Vec<ProcessorHealth> = state
        .processors
        .iter()
        .map(|monitor| ProcessorHealth {
            topic: monitor.topic().to_string(),
            partitions: monitor.partition_states(),
            stalled_partitions: monitor
                .stalled_partitions()
                .into_iter()
                .map(|p| p.as_u32())
                .collect(),
        })
        .collect();

    let degraded = processors.iter().any(|p| !p.stalled_partitions.is_empty());
    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        processors,
    })
}
