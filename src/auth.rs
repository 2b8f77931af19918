// Access control boundary
// Two gates: `require_auth` resolves a session token to a user, and
// `require_admin` additionally demands the admin role. Handlers behind the
// gates read the user from request extensions.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Extension,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::user::{Role, User},
    AppState,
};

/// Authenticated identity attached to the request by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        CurrentUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// The raw session token, kept around so logout can revoke it.
#[derive(Debug, Clone, Copy)]
pub struct AuthToken(pub Uuid);

/// Salted SHA-256 in the form `sha256$<salt>$<hex digest>`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    format!("sha256${}${:x}", salt, hasher.finalize())
}

/// Hash a new password with a fresh random salt.
pub fn new_password_hash(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    hash_password(password, &salt)
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(salt), Some(_)) => hash_password(password, salt) == stored,
        _ => false,
    }
}

/// Pull the session token from `Authorization: Bearer` or the
/// `session_token` cookie.
fn extract_token(request: &Request) -> Option<Uuid> {
    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                if let Ok(token) = Uuid::parse_str(token.trim()) {
                    return Some(token);
                }
            }
        }
    }

    if let Some(value) = request.headers().get(header::COOKIE) {
        if let Ok(value) = value.to_str() {
            for pair in value.split(';') {
                if let Some((name, token)) = pair.trim().split_once('=') {
                    if name == "session_token" {
                        if let Ok(token) = Uuid::parse_str(token.trim()) {
                            return Some(token);
                        }
                    }
                }
            }
        }
    }

    None
}

/// First gate: the request must carry a valid, unexpired session token.
/// Anything else is bounced to the login flow.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&request).ok_or(ApiError::Unauthenticated)?;

    let user = state
        .db
        .find_user_by_session_token(token)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    request.extensions_mut().insert(AuthToken(token));
    request.extensions_mut().insert(CurrentUser::from(user));

    Ok(next.run(request).await)
}

/// Second gate for admin routes. Runs after `require_auth`, so an
/// authenticated non-admin gets a 403 rather than a redirect.
pub async fn require_admin(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.role.is_admin() {
        return Err(ApiError::forbidden("Administrator role required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = new_password_hash("correct-horse");
        assert!(hash.starts_with("sha256$"));
        assert!(verify_password("correct-horse", &hash));
        assert!(!verify_password("wrong-horse", &hash));
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let a = new_password_hash("correct-horse");
        let b = new_password_hash("correct-horse");
        assert_ne!(a, b);
        assert!(verify_password("correct-horse", &a));
        assert!(verify_password("correct-horse", &b));
    }

    #[test]
    fn test_verify_rejects_malformed_stored_hash() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", "md5$salt$digest"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_extract_token_from_bearer_header() {
        let token = Uuid::new_v4();
        let request = Request::builder()
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_token(&request), Some(token));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let token = Uuid::new_v4();
        let request = Request::builder()
            .header("cookie", format!("theme=dark; session_token={}", token))
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_token(&request), Some(token));
    }

    #[test]
    fn test_extract_token_missing_or_invalid() {
        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_token(&bare), None);

        let garbage = Request::builder()
            .header("authorization", "Bearer not-a-uuid")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&garbage), None);
    }
}
