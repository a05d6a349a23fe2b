use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tokio::signal;

use riskdesk_backend::{config, handlers, middleware, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first
    let settings = config::Settings::new()?;

    // Initialize structured logging with configuration
    middleware::init_logging(&settings.log_level, &settings.log_format)?;

    tracing::info!("Starting Riskdesk Backend v{}", env!("CARGO_PKG_VERSION"));

    // Create application state with dependency injection
    let app_state = AppState::new(settings.clone()).await?;

    // Create CORS layer with configuration
    let cors_layer = middleware::create_cors_layer(settings.cors_allow_origins.clone());

    let api_routes = Router::new()
        // Health check endpoints
        .route("/api/health", get(handlers::health_check))
        .route("/api/health/ready", get(handlers::readiness_check))
        .route("/api/health/live", get(handlers::liveness_check))
        // Backlog workflow endpoints
        .route("/api/backlog", post(handlers::backlog_handlers::create_entry))
        .route("/api/backlog", get(handlers::backlog_handlers::list_entries))
        .route("/api/backlog/statistics", get(handlers::backlog_handlers::get_statistics))
        .route("/api/backlog/:id", get(handlers::backlog_handlers::get_entry))
        .route("/api/backlog/:id/assign-analyst", post(handlers::backlog_handlers::assign_to_analyst))
        .route("/api/backlog/:id/assign-manager", post(handlers::backlog_handlers::assign_to_manager))
        .route("/api/backlog/:id/analyst-approve", post(handlers::backlog_handlers::analyst_approve))
        .route("/api/backlog/:id/analyst-reject", post(handlers::backlog_handlers::analyst_reject))
        .route("/api/backlog/:id/manager-approve", post(handlers::backlog_handlers::manager_approve))
        .route("/api/backlog/:id/manager-reject", post(handlers::backlog_handlers::manager_reject))
        .route("/api/backlog/:id/escalate", post(handlers::backlog_handlers::escalate))
        .route("/api/backlog/:id/priority", patch(handlers::backlog_handlers::set_priority))
        .route("/api/backlog/:id/activities", get(handlers::backlog_handlers::list_activities))
        .route("/api/backlog/:id/comments", get(handlers::backlog_handlers::list_comments))
        .route("/api/backlog/:id/comments", post(handlers::backlog_handlers::add_comment))
        .route("/api/backlog/:id/sla-history", get(handlers::sla_handlers::list_sla_history))
        // Bulk workflow endpoints
        .route("/api/backlog/bulk/assign-analyst", post(handlers::backlog_handlers::bulk_assign_to_analyst))
        .route("/api/backlog/bulk/assign-manager", post(handlers::backlog_handlers::bulk_assign_to_manager))
        .route("/api/backlog/bulk/manager-approve", post(handlers::backlog_handlers::bulk_approve_by_manager))
        .route("/api/backlog/bulk/priority", post(handlers::backlog_handlers::bulk_set_priority))
        // Risk matrix endpoints
        .route("/api/matrices", post(handlers::matrix_handlers::create_matrix))
        .route("/api/matrices", get(handlers::matrix_handlers::list_matrices))
        .route("/api/matrices/classify", get(handlers::matrix_handlers::classify_score))
        .route("/api/matrices/:id", get(handlers::matrix_handlers::get_matrix))
        .route("/api/matrices/:id", put(handlers::matrix_handlers::update_matrix))
        .route("/api/matrices/:id", delete(handlers::matrix_handlers::delete_matrix))
        .route("/api/matrices/:id/generate", post(handlers::matrix_handlers::generate_cells))
        .route("/api/matrices/:id/set-default", post(handlers::matrix_handlers::set_default))
        .route("/api/matrices/:id/cells", get(handlers::matrix_handlers::list_cells))
        .route("/api/matrices/:id/lookup", get(handlers::matrix_handlers::lookup_cell))
        // SLA endpoints
        .route("/api/sla/sweep", post(handlers::sla_handlers::run_sweep))
        .route("/api/sla/overdue", get(handlers::sla_handlers::list_overdue))
        .route("/api/sla/due-soon", get(handlers::sla_handlers::list_due_soon));

    // Build our application with routes
    let app = Router::new()
        .merge(api_routes)
        .with_state(app_state)
        // Apply middleware layers (global)
        .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
        .layer(middleware::create_logging_layer())
        .layer(cors_layer);

    // Run the server with graceful shutdown
    let addr: std::net::SocketAddr = settings.bind_addr.parse()?;
    tracing::info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
