// Models module
// Domain entities and request payloads

pub mod dashboard;
pub mod review;
pub mod study_session;
pub mod tag;
pub mod user;
pub mod word;

pub use review::ReviewRecord;
pub use study_session::{StudySession, StudySessionDetail, StudySessionSummary};
pub use tag::Tag;
pub use user::{Role, User};
pub use word::{Word, WordWithTags};
