use crate::{
    error::ApiError,
    models::{RiskLevel, RiskMatrix, RiskMatrixCell, RiskMatrixCreate, RiskMatrixUpdate},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CellLookupQuery {
    pub impact: i32,
    pub likelihood: i32,
    #[serde(default)]
    pub exposure: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct CellLookupResponse {
    pub level: RiskLevel,
    pub score: f64,
}

/// POST /api/matrices - Create a matrix
pub async fn create_matrix(
    State(app_state): State<AppState>,
    Json(request): Json<RiskMatrixCreate>,
) -> Result<Json<RiskMatrix>, ApiError> {
    let matrix = app_state.matrix_service.create_matrix(request).await?;
    Ok(Json(matrix))
}

/// GET /api/matrices - List all matrices
pub async fn list_matrices(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<RiskMatrix>>, ApiError> {
    let matrices = app_state.matrix_service.list_matrices().await?;
    Ok(Json(matrices))
}

/// GET /api/matrices/:id
pub async fn get_matrix(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiskMatrix>, ApiError> {
    let matrix = app_state.matrix_service.get_matrix(&id).await?;
    Ok(Json(matrix))
}

/// PUT /api/matrices/:id
pub async fn update_matrix(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RiskMatrixUpdate>,
) -> Result<Json<RiskMatrix>, ApiError> {
    let matrix = app_state.matrix_service.update_matrix(&id, request).await?;
    Ok(Json(matrix))
}

/// DELETE /api/matrices/:id
pub async fn delete_matrix(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    app_state.matrix_service.delete_matrix(&id).await?;
    Ok(Json(json!({ "deleted": id })))
}

/// POST /api/matrices/:id/generate - Regenerate the full cell set
pub async fn generate_cells(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let cell_count = app_state.matrix_service.generate_cells(&id).await?;
    Ok(Json(json!({ "matrix_id": id, "cell_count": cell_count })))
}

/// POST /api/matrices/:id/set-default - Validate and promote to default
pub async fn set_default(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiskMatrix>, ApiError> {
    let matrix = app_state.matrix_service.set_default(&id).await?;
    Ok(Json(matrix))
}

/// GET /api/matrices/:id/cells
pub async fn list_cells(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RiskMatrixCell>>, ApiError> {
    app_state.matrix_service.get_matrix(&id).await?;
    let cells = app_state.matrix_repository.list_cells(&id).await?;
    Ok(Json(cells))
}

/// GET /api/matrices/:id/lookup?impact=&likelihood=&exposure= - Point lookup
pub async fn lookup_cell(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CellLookupQuery>,
) -> Result<Json<CellLookupResponse>, ApiError> {
    let level = app_state
        .matrix_service
        .calculate_risk_level(&id, query.impact, query.likelihood, query.exposure)
        .await?;
    let score = app_state
        .matrix_service
        .calculate_risk_score(&id, query.impact, query.likelihood, query.exposure)
        .await?;
    Ok(Json(CellLookupResponse { level, score }))
}

/// GET /api/matrices/classify?score= - Classify a qualitative score through
/// the active default matrix
pub async fn classify_score(
    State(app_state): State<AppState>,
    Query(query): Query<ClassifyQuery>,
) -> Result<Json<Value>, ApiError> {
    let level = app_state.matrix_service.classify_score(query.score).await?;
    Ok(Json(json!({ "score": query.score, "level": level })))
}
