use serde::Deserialize;

use super::client::Auth;
use super::{ApiClient, ApiResult};
use crate::models::{
    auth::{Credentials, Signup},
    dashboard::{WhitelistAdded, WhitelistRequest, WhitelistResponse},
    AdminStats, AdminUser, Analytics, AuthToken, Insights, UserProfile, WhitelistEntry,
};

/// `/api/admin/users` has been seen both bare and wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserList {
    Bare(Vec<AdminUser>),
    Wrapped { users: Vec<AdminUser> },
}

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthToken> {
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/api/auth/login", &body, Auth::Anonymous).await
    }

    pub async fn signup(&self, email: &str, password: &str, confirm: &str) -> ApiResult<AuthToken> {
        let body = Signup {
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        };
        self.post("/api/auth/signup", &body, Auth::Anonymous).await
    }

    pub async fn me(&self) -> ApiResult<UserProfile> {
        self.get("/api/auth/me", &[]).await
    }

    pub async fn analytics(&self, period_days: u32) -> ApiResult<Analytics> {
        let mut query = self.user_query().await?;
        query.push(("period_days", period_days.to_string()));
        self.get("/api/dashboard/analytics", &query).await
    }

    pub async fn insights(&self) -> ApiResult<Insights> {
        let query = self.user_query().await?;
        self.get("/api/dashboard/insights", &query).await
    }

    pub async fn whitelist(&self) -> ApiResult<Vec<WhitelistEntry>> {
        let query = self.user_query().await?;
        let response: WhitelistResponse = self.get("/api/whitelist", &query).await?;
        Ok(response.whitelist)
    }

    /// Returns the backend's domain id for the whitelisted name, if it
    /// reports one.
    pub async fn add_to_whitelist(&self, domain_name: &str, reason: &str) -> ApiResult<Option<i64>> {
        let account = self.db().stored_account().await?;
        let body = WhitelistRequest {
            domain_name: domain_name.trim().to_lowercase(),
            user_reason: reason.to_string(),
            user_id: account.user_id,
        };
        let added: WhitelistAdded = self.post("/api/whitelist", &body, Auth::Bearer).await?;
        Ok(added.domain_id)
    }

    pub async fn remove_from_whitelist(&self, domain_id: i64) -> ApiResult<()> {
        let mut query = self.user_query().await?;
        query.push(("domain_id", domain_id.to_string()));
        self.delete("/api/whitelist", &query).await
    }

    pub async fn admin_stats(&self) -> ApiResult<AdminStats> {
        self.get("/api/admin/stats", &[]).await
    }

    pub async fn admin_users(&self) -> ApiResult<Vec<AdminUser>> {
        let list: UserList = self.get("/api/admin/users", &[]).await?;
        Ok(match list {
            UserList::Bare(users) | UserList::Wrapped { users } => users,
        })
    }

    pub async fn delete_user(&self, user_id: i64) -> ApiResult<()> {
        self.delete(&format!("/api/admin/users/{user_id}"), &[]).await
    }

    async fn user_query(&self) -> ApiResult<Vec<(&'static str, String)>> {
        let account = self.db().stored_account().await?;
        Ok(account
            .user_id
            .map(|id| vec![("user_id", id.to_string())])
            .unwrap_or_default())
    }
}
