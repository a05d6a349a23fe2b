use crate::{
    config::Settings,
    database::DatabasePool,
    repositories::{
        audit_repo::SqlxAuditRepository, backlog_repo::SqlxBacklogRepository,
        matrix_repo::SqlxMatrixRepository, risk_repo::SqlxRiskDirectory,
        user_repo::SqlxUserDirectory, AuditRepository, BacklogRepository, MatrixRepository,
        RiskDirectory, UserDirectory,
    },
    services::{
        AuditService, Clock, MatrixService, RiskMaterializer, SlaService, SystemClock,
        WorkflowService,
    },
};
use std::sync::Arc;

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db_pool: DatabasePool,
    pub workflow_service: Arc<WorkflowService>,
    pub matrix_service: Arc<MatrixService>,
    pub sla_service: Arc<SlaService>,
    pub audit_service: Arc<AuditService>,
    pub backlog_repository: Arc<dyn BacklogRepository + Send + Sync>,
    pub matrix_repository: Arc<dyn MatrixRepository + Send + Sync>,
    pub risk_directory: Arc<dyn RiskDirectory + Send + Sync>,
    pub user_directory: Arc<dyn UserDirectory + Send + Sync>,
    pub audit_repository: Arc<dyn AuditRepository + Send + Sync>,
}

impl AppState {
    /// Create new application state with dependency injection
    pub async fn new(settings: Settings) -> Result<Self, crate::error::ApiError> {
        let db_pool = crate::database::create_connection_pool(&settings.database_url).await?;
        Self::new_with_pool(settings, db_pool).await
    }

    /// Create new application state with an existing database pool
    pub async fn new_with_pool(
        settings: Settings,
        db_pool: DatabasePool,
    ) -> Result<Self, crate::error::ApiError> {
        let settings = Arc::new(settings);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // Create repositories
        let backlog_repository: Arc<dyn BacklogRepository + Send + Sync> =
            Arc::new(SqlxBacklogRepository::new(db_pool.clone()));
        let matrix_repository: Arc<dyn MatrixRepository + Send + Sync> =
            Arc::new(SqlxMatrixRepository::new(db_pool.clone()));
        let risk_directory: Arc<dyn RiskDirectory + Send + Sync> =
            Arc::new(SqlxRiskDirectory::new(db_pool.clone()));
        let user_directory: Arc<dyn UserDirectory + Send + Sync> =
            Arc::new(SqlxUserDirectory::new(db_pool.clone()));
        let audit_repository: Arc<dyn AuditRepository + Send + Sync> =
            Arc::new(SqlxAuditRepository::new(db_pool.clone()));

        // Create services with dependency injection
        let audit_service = Arc::new(AuditService::new(audit_repository.clone()));

        let matrix_service = Arc::new(MatrixService::new(
            matrix_repository.clone(),
            settings.clone(),
        ));

        let materializer = Arc::new(RiskMaterializer::new(
            risk_directory.clone(),
            matrix_service.clone(),
        ));

        let sla_service = Arc::new(SlaService::new(
            backlog_repository.clone(),
            matrix_service.clone(),
            audit_service.clone(),
            clock.clone(),
            settings.clone(),
        ));

        let workflow_service = Arc::new(WorkflowService::new(
            backlog_repository.clone(),
            risk_directory.clone(),
            user_directory.clone(),
            matrix_service.clone(),
            materializer,
            audit_service.clone(),
            clock,
            settings.clone(),
        ));

        Ok(Self {
            settings,
            db_pool,
            workflow_service,
            matrix_service,
            sla_service,
            audit_service,
            backlog_repository,
            matrix_repository,
            risk_directory,
            user_directory,
            audit_repository,
        })
    }
}
