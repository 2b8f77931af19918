use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// 管理画面でのアクセス制御に使うロール。DB には小文字の TEXT として保存する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// 登録済みユーザーを表すドメインモデル。
/// `password_hash` は `skip_serializing` でレスポンスに出さない。
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// アカウント登録 API が受け取るペイロード。新規ユーザーは常に `member` になる。
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 管理者によるユーザー更新の入力。更新しないフィールドは `None`。
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl RegisterRequest {
    /// 登録時のビジネスルール (空欄禁止・文字数上限・メール形式) を検証する。
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name cannot be empty".to_string());
        }

        if self.name.len() > 100 {
            return Err("Name cannot exceed 100 characters".to_string());
        }

        if self.email.trim().is_empty() {
            return Err("Email cannot be empty".to_string());
        }

        if !is_valid_email(self.email.trim()) {
            return Err("Invalid email format".to_string());
        }

        if self.email.len() > 255 {
            return Err("Email cannot exceed 255 characters".to_string());
        }

        if self.password.len() < 8 {
            return Err("Password must be at least 8 characters".to_string());
        }

        Ok(())
    }

    pub fn get_normalized_name(&self) -> String {
        self.name.trim().to_string()
    }

    /// メールは大小区別しないため、トリムして小文字化しておく。
    pub fn get_normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

impl AdminUpdateUserRequest {
    /// 更新時は少なくとも 1 フィールドが必要。
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_none() && self.email.is_none() && self.role.is_none() {
            return Err(
                "At least one field (name, email or role) must be provided for update".to_string(),
            );
        }

        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err("Name cannot be empty".to_string());
            }

            if name.len() > 100 {
                return Err("Name cannot exceed 100 characters".to_string());
            }
        }

        if let Some(ref email) = self.email {
            if email.trim().is_empty() {
                return Err("Email cannot be empty".to_string());
            }

            if !is_valid_email(email.trim()) {
                return Err("Invalid email format".to_string());
            }

            if email.len() > 255 {
                return Err("Email cannot exceed 255 characters".to_string());
            }
        }

        Ok(())
    }

    pub fn get_normalized_name(&self) -> Option<String> {
        self.name.as_ref().map(|n| n.trim().to_string())
    }

    pub fn get_normalized_email(&self) -> Option<String> {
        self.email.as_ref().map(|e| e.trim().to_lowercase())
    }
}

/// シンプルなメールフォーマット検証。正規表現を使わず最小限のルールのみ。
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();

    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || local.len() > 64 {
        return false;
    }

    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    if !domain.contains('.') {
        return false;
    }

    let valid_chars = |c: char| c.is_alphanumeric() || ".-_+".contains(c);

    local.chars().all(valid_chars) && domain.chars().all(|c| c.is_alphanumeric() || ".-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("member").unwrap(), Role::Member);
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::Member.as_str(), "member");
        assert!(Role::parse("superuser").is_err());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Member.is_admin());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
        let role: Role = serde_json::from_str(r#""member""#).unwrap();
        assert_eq!(role, Role::Member);
    }

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            password: "correct-horse".to_string(),
        };
        assert!(valid.validate().is_ok());

        let empty_name = RegisterRequest {
            name: "".to_string(),
            email: "john@example.com".to_string(),
            password: "correct-horse".to_string(),
        };
        assert!(empty_name.validate().is_err());

        let bad_email = RegisterRequest {
            name: "John Doe".to_string(),
            email: "invalid-email".to_string(),
            password: "correct-horse".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_register_request_normalization() {
        let request = RegisterRequest {
            name: "  John Doe  ".to_string(),
            email: "  John@Example.COM ".to_string(),
            password: "correct-horse".to_string(),
        };
        assert_eq!(request.get_normalized_name(), "John Doe");
        assert_eq!(request.get_normalized_email(), "john@example.com");
    }

    #[test]
    fn test_admin_update_request_validation() {
        let role_only = AdminUpdateUserRequest {
            name: None,
            email: None,
            role: Some(Role::Admin),
        };
        assert!(role_only.validate().is_ok());

        let empty = AdminUpdateUserRequest {
            name: None,
            email: None,
            role: None,
        };
        assert!(empty.validate().is_err());

        let bad_email = AdminUpdateUserRequest {
            name: None,
            email: Some("nope".to_string()),
            role: None,
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.co.uk"));
        assert!(is_valid_email("user+tag@example.org"));

        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@domain"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap(),
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            password_hash: "sha256$salt$digest".to_string(),
            role: Role::Member,
            created_at: DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_string(&user).expect("Failed to serialize user");
        assert!(!json.contains("password_hash"));
        assert!(json.contains(r#""role":"member""#));
    }
}
