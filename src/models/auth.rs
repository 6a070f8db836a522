use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of `/api/auth/login` and `/api/auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user_id: i64,
    pub email: String,
}

fn default_token_type() -> String {
    "bearer".into()
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Signup {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Response of `/api/auth/me`. The role is whatever the backend vouches
/// for; the client never decodes the token itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".into()
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_role_defaults_to_user() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id": 3, "email": "a@b.c"}"#).unwrap();
        assert_eq!(profile.role, "user");
        assert!(!profile.is_admin());
        assert!(profile.created_at.is_none());
    }

    #[test]
    fn test_token_type_defaults_to_bearer() {
        let token: AuthToken = serde_json::from_str(
            r#"{"access_token": "t", "user_id": 1, "email": "a@b.c"}"#,
        )
        .unwrap();
        assert_eq!(token.token_type, "bearer");
    }
}
