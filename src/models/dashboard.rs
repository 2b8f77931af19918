use serde::Serialize;

/// Per-user counts shown on the landing page after login.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub word_count: i64,
    pub words_due: i64,
    pub study_session_count: i64,
    pub review_count: i64,
}
