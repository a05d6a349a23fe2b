use crate::{
    error::ApiError,
    models::{
        Activity, BacklogEntry, BacklogEntryCreate, BacklogFilter, BacklogListResponse,
        BacklogStatistics, BulkOperationResult, Comment, CommentCreate, RiskPriority,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assignee_id: Uuid,
    pub by_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub comments: String,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub reason: String,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    pub priority: RiskPriority,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignRequest {
    pub entry_ids: Vec<Uuid>,
    pub assignee_id: Uuid,
    pub by_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BulkApproveRequest {
    pub entry_ids: Vec<Uuid>,
    #[serde(default)]
    pub comments: String,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BulkPriorityRequest {
    pub entry_ids: Vec<Uuid>,
    pub priority: RiskPriority,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    #[serde(default)]
    pub include_internal: bool,
}

/// POST /api/backlog - Create a backlog entry
pub async fn create_entry(
    State(app_state): State<AppState>,
    Json(request): Json<BacklogEntryCreate>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state.workflow_service.create_entry(request).await?;
    Ok(Json(entry))
}

/// GET /api/backlog - List entries by filter criteria
pub async fn list_entries(
    State(app_state): State<AppState>,
    Query(filter): Query<BacklogFilter>,
) -> Result<Json<BacklogListResponse>, ApiError> {
    let response = app_state.workflow_service.list(&filter).await?;
    Ok(Json(response))
}

/// GET /api/backlog/statistics - Dashboard aggregates
pub async fn get_statistics(
    State(app_state): State<AppState>,
) -> Result<Json<BacklogStatistics>, ApiError> {
    let stats = app_state.workflow_service.statistics().await?;
    Ok(Json(stats))
}

/// GET /api/backlog/:id - Fetch a single entry
pub async fn get_entry(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state.workflow_service.get_entry(&id).await?;
    Ok(Json(entry))
}

/// POST /api/backlog/:id/assign-analyst
pub async fn assign_to_analyst(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .assign_to_analyst(&id, request.assignee_id, request.by_id)
        .await?;
    Ok(Json(entry))
}

/// POST /api/backlog/:id/assign-manager
pub async fn assign_to_manager(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .assign_to_manager(&id, request.assignee_id, request.by_id)
        .await?;
    Ok(Json(entry))
}

/// POST /api/backlog/:id/analyst-approve
pub async fn analyst_approve(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .analyst_approve(&id, request.comments, request.actor_id)
        .await?;
    Ok(Json(entry))
}

/// POST /api/backlog/:id/analyst-reject
pub async fn analyst_reject(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .analyst_reject(&id, request.reason, request.actor_id)
        .await?;
    Ok(Json(entry))
}

/// POST /api/backlog/:id/manager-approve
pub async fn manager_approve(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .manager_approve(&id, request.comments, request.actor_id)
        .await?;
    Ok(Json(entry))
}

/// POST /api/backlog/:id/manager-reject
pub async fn manager_reject(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .manager_reject(&id, request.reason, request.actor_id)
        .await?;
    Ok(Json(entry))
}

/// POST /api/backlog/:id/escalate
pub async fn escalate(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EscalateRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .escalate(&id, request.reason, request.actor_id)
        .await?;
    Ok(Json(entry))
}

/// PATCH /api/backlog/:id/priority
pub async fn set_priority(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PriorityRequest>,
) -> Result<Json<BacklogEntry>, ApiError> {
    let entry = app_state
        .workflow_service
        .set_priority(&id, request.priority, request.actor_id)
        .await?;
    Ok(Json(entry))
}

/// GET /api/backlog/:id/activities - Ordered audit trail for an entry
pub async fn list_activities(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    // 404 for unknown entries rather than an empty list
    app_state.workflow_service.get_entry(&id).await?;
    let activities = app_state.audit_service.activities(&id).await?;
    Ok(Json(activities))
}

/// GET /api/backlog/:id/comments - Comment stream, internal comments gated
/// by the access-control layer upstream
pub async fn list_comments(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CommentQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    app_state.workflow_service.get_entry(&id).await?;
    let comments = app_state
        .audit_service
        .comments(&id, query.include_internal)
        .await?;
    Ok(Json(comments))
}

/// POST /api/backlog/:id/comments
pub async fn add_comment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CommentCreate>,
) -> Result<Json<Comment>, ApiError> {
    let comment = app_state.workflow_service.add_comment(&id, request).await?;
    Ok(Json(comment))
}

/// POST /api/backlog/bulk/assign-analyst
pub async fn bulk_assign_to_analyst(
    State(app_state): State<AppState>,
    Json(request): Json<BulkAssignRequest>,
) -> Result<Json<BulkOperationResult>, ApiError> {
    let result = app_state
        .workflow_service
        .bulk_assign_to_analyst(&request.entry_ids, request.assignee_id, request.by_id)
        .await?;
    Ok(Json(result))
}

/// POST /api/backlog/bulk/assign-manager
pub async fn bulk_assign_to_manager(
    State(app_state): State<AppState>,
    Json(request): Json<BulkAssignRequest>,
) -> Result<Json<BulkOperationResult>, ApiError> {
    let result = app_state
        .workflow_service
        .bulk_assign_to_manager(&request.entry_ids, request.assignee_id, request.by_id)
        .await?;
    Ok(Json(result))
}

/// POST /api/backlog/bulk/manager-approve
pub async fn bulk_approve_by_manager(
    State(app_state): State<AppState>,
    Json(request): Json<BulkApproveRequest>,
) -> Result<Json<BulkOperationResult>, ApiError> {
    let result = app_state
        .workflow_service
        .bulk_approve_by_manager(&request.entry_ids, request.comments, request.actor_id)
        .await?;
    Ok(Json(result))
}

/// POST /api/backlog/bulk/priority
pub async fn bulk_set_priority(
    State(app_state): State<AppState>,
    Json(request): Json<BulkPriorityRequest>,
) -> Result<Json<BulkOperationResult>, ApiError> {
    let result = app_state
        .workflow_service
        .bulk_set_priority(&request.entry_ids, request.priority, request.actor_id)
        .await?;
    Ok(Json(result))
}
