// Library root for the word study API

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod transfer;

use std::sync::Arc;

// Re-export commonly used types
pub use db::Database;
pub use error::{ApiError, ApiResult};
pub use models::{Role, StudySession, User, Word};

/// Shared application state: the repository plus the study-policy knobs.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub study: config::StudyConfig,
}
