use crate::{
    error::ApiError,
    models::{BacklogEntry, SlaHistory, SYSTEM_PRINCIPAL},
    services::SlaSweepResult,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct SweepRequest {
    /// Defaults to the reserved system principal; external job triggers
    /// normally omit it.
    #[serde(default)]
    pub actor_id: Option<Uuid>,
}

/// POST /api/sla/sweep - Breach-detection sweep, hit by an external job
/// trigger on its own cadence
pub async fn run_sweep(
    State(app_state): State<AppState>,
    request: Option<Json<SweepRequest>>,
) -> Result<Json<SlaSweepResult>, ApiError> {
    let actor = request
        .and_then(|Json(r)| r.actor_id)
        .unwrap_or(SYSTEM_PRINCIPAL);

    let result = app_state.sla_service.update_sla_status(actor).await?;
    Ok(Json(result))
}

/// GET /api/sla/overdue - Non-terminal entries past their due date
pub async fn list_overdue(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<BacklogEntry>>, ApiError> {
    let entries = app_state.sla_service.overdue().await?;
    Ok(Json(entries))
}

/// GET /api/sla/due-soon - Entries due inside the configured window
pub async fn list_due_soon(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<BacklogEntry>>, ApiError> {
    let entries = app_state.sla_service.due_soon().await?;
    Ok(Json(entries))
}

/// GET /api/backlog/:id/sla-history - Breach records for an entry
pub async fn list_sla_history(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SlaHistory>>, ApiError> {
    app_state.workflow_service.get_entry(&id).await?;
    let history = app_state.audit_service.sla_history(&id).await?;
    Ok(Json(history))
}
