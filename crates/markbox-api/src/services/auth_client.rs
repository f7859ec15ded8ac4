//! Session refresh against the auth service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use markbox_core::{Error, Result};

/// Which account collection a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Admin,
    User,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Admin => "admin",
            AccountKind::User => "user",
        }
    }

    /// Requests under `admin_prefix` refresh admin sessions.
    pub fn for_path(path: &str, admin_prefix: &str) -> Self {
        let prefix = admin_prefix.trim_end_matches('/');
        let is_admin = !prefix.is_empty()
            && path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if is_admin {
            AccountKind::Admin
        } else {
            AccountKind::User
        }
    }
}

/// Fresh token and account record returned by a successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRefresh {
    pub token: String,
    pub model: JsonValue,
}

/// Refreshes a session token.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn refresh(&self, kind: AccountKind, token: &str) -> Result<AuthRefresh>;
}

#[derive(Debug, Deserialize)]
struct AdminRefreshResponse {
    token: String,
    admin: JsonValue,
}

#[derive(Debug, Deserialize)]
struct UserRefreshResponse {
    token: String,
    record: JsonValue,
}

/// HTTP client for the auth service. Stateless; one instance serves every
/// request.
#[derive(Clone)]
pub struct HttpAuthService {
    client: Client,
    base_url: String,
}

impl HttpAuthService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn refresh_url(&self, kind: AccountKind) -> String {
        match kind {
            AccountKind::Admin => format!("{}/api/admins/auth-refresh", self.base_url),
            AccountKind::User => format!("{}/api/collections/users/auth-refresh", self.base_url),
        }
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn refresh(&self, kind: AccountKind, token: &str) -> Result<AuthRefresh> {
        let url = self.refresh_url(kind);
        debug!(account_kind = kind.as_str(), url = %url, "Refreshing session");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Unauthorized(format!(
                "Auth refresh returned {}: {}",
                status, body
            )));
        }

        match kind {
            AccountKind::Admin => {
                let body: AdminRefreshResponse = response.json().await?;
                Ok(AuthRefresh {
                    token: body.token,
                    model: body.admin,
                })
            }
            AccountKind::User => {
                let body: UserRefreshResponse = response.json().await?;
                Ok(AuthRefresh {
                    token: body.token,
                    model: body.record,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_kind_for_path() {
        assert_eq!(AccountKind::for_path("/admin", "/admin"), AccountKind::Admin);
        assert_eq!(
            AccountKind::for_path("/admin/users", "/admin/"),
            AccountKind::Admin
        );
        assert_eq!(
            AccountKind::for_path("/administrator", "/admin"),
            AccountKind::User
        );
        assert_eq!(
            AccountKind::for_path("/actions/add-bookmark", "/admin"),
            AccountKind::User
        );
        assert_eq!(AccountKind::for_path("/admin", ""), AccountKind::User);
    }

    #[test]
    fn test_refresh_urls() {
        let service = HttpAuthService::with_client(Client::new(), "http://auth.local/");
        assert_eq!(
            service.refresh_url(AccountKind::Admin),
            "http://auth.local/api/admins/auth-refresh"
        );
        assert_eq!(
            service.refresh_url(AccountKind::User),
            "http://auth.local/api/collections/users/auth-refresh"
        );
    }
}
