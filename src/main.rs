use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{error, info};

use word_study_api::{
    auth::{require_admin, require_auth},
    config::Config,
    db::Database,
    handlers::{
        admin, auth, dashboard, health_check, login_page, study, study_sessions, words,
    },
    middleware::{create_middleware_stack, init_tracing},
    AppState,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize database connection
    let database = match Database::new(config.database.clone()).await {
        Ok(db) => {
            info!("Database connection established");
            Arc::new(db)
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    // Run database migrations
    if let Err(e) = database.migrate().await {
        error!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }
    info!("Database migrations completed successfully");

    let state = AppState {
        db: database,
        study: config.study.clone(),
    };

    // Create the Axum router with all endpoints
    let app = create_router(state);

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Start the server with graceful shutdown handling
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Create the Axum router with all endpoints and middleware.
/// Three tiers: public, authenticated, and admin (auth + role gate).
fn create_router(state: AppState) -> Router {
    // Admin routes sit behind both gates
    let admin_routes = Router::new()
        .route("/admin/users", get(admin::get_all_users))
        .route("/admin/users/:id", get(admin::get_user_by_id))
        .route("/admin/users/:id", patch(admin::update_user))
        .route("/admin/users/:id", delete(admin::delete_user))
        .layer(from_fn(require_admin));

    let authenticated_routes = Router::new()
        // Landing page
        .route("/dashboard", get(dashboard))
        // Session token lifecycle
        .route("/auth/logout", delete(auth::logout))
        // Word management
        .route("/words", get(words::get_all_words))
        .route("/words", post(words::create_word))
        .route("/words/:id", get(words::get_word_by_id))
        .route("/words/:id", put(words::update_word))
        .route("/words/:id", delete(words::delete_word))
        .route("/words/:id/save-notes", post(words::save_notes))
        .route("/words/:id/record-study", post(words::record_study))
        .route("/words/import-csv", post(words::import_csv))
        // Study flows
        .route("/study", get(study::auto_review_index))
        .route("/study-sessions", get(study_sessions::get_all_sessions))
        .route("/study-sessions", post(study_sessions::create_session))
        .route("/study-sessions/:id", get(study_sessions::get_session_by_id))
        .route("/study-sessions/:id", put(study_sessions::update_session))
        .route("/study-sessions/:id", delete(study_sessions::delete_session))
        .route("/study-sessions/:id/review", get(study::session_review))
        .route(
            "/study-sessions/:id/words/:word_id/detach",
            delete(study_sessions::detach_word),
        )
        .route(
            "/study-sessions/:id/export-csv",
            get(study_sessions::export_csv),
        )
        .merge(admin_routes)
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Public endpoints
        .route("/health", get(health_check))
        .route("/login", get(login_page))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(authenticated_routes)
        // Add shared state
        .with_state(state)
        // Apply middleware stack
        .layer(create_middleware_stack())
}

/// Graceful shutdown signal handler
/// Listens for SIGTERM and SIGINT signals
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
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        },
    }
}
