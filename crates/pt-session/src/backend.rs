//! Auth backend client
//!
//! `AuthBackend` is the seam the session manager talks through; the HTTP
//! implementation speaks the portal's JSON auth endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pt_access::Role;
use pt_config::BackendConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BackendError;
use crate::model::{Credentials, LoginGrant, PermissionGrant, TokenPair, UserProfile};

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, BackendError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, BackendError>;

    async fn fetch_permissions(&self, access_token: &str) -> Result<PermissionGrant, BackendError>;

    /// Revoke the refresh token. Best effort; the default does nothing.
    async fn logout(&self, _refresh_token: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: serde_json::Value,
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

impl From<WireUser> for UserProfile {
    fn from(user: WireUser) -> Self {
        // ids arrive as numbers or strings depending on the backend
        let id = match user.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Self {
            id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            role: user.role.as_deref().map(Role::from_backend).unwrap_or_default(),
            permissions: user.permissions.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionsResponse {
    permissions: Vec<String>,
    #[serde(default)]
    role: Option<String>,
}

/// JSON-over-HTTP auth backend
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpAuthBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn with_client(config: BackendConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Rejected { status, body })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, BackendError> {
        let url = self.url(&self.config.login_path);
        debug!(%url, username = %credentials.username, "Logging in");

        let response = self.client.post(&url).json(credentials).send().await?;
        if matches!(response.status(), StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            return Err(BackendError::InvalidCredentials);
        }
        let body: LoginResponse = Self::ensure_success(response).await?.json().await?;

        Ok(LoginGrant {
            access_token: body.access,
            refresh_token: body.refresh,
            expires_at: body.expires_at,
            user: body.user.into(),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, BackendError> {
        let url = self.url(&self.config.refresh_path);
        debug!(%url, "Refreshing token");

        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;
        let body: RefreshResponse = Self::ensure_success(response).await?.json().await?;
        if body.access.is_empty() {
            return Err(BackendError::Decode("empty access token".to_string()));
        }

        Ok(TokenPair {
            access_token: body.access,
            refresh_token: body.refresh.filter(|r| !r.is_empty()),
        })
    }

    async fn fetch_permissions(&self, access_token: &str) -> Result<PermissionGrant, BackendError> {
        let url = self.url(&self.config.permissions_path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let body: PermissionsResponse = Self::ensure_success(response).await?.json().await?;

        Ok(PermissionGrant {
            permissions: body.permissions.into(),
            role: body.role.as_deref().map(Role::from_backend),
        })
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), BackendError> {
        let url = self.url(&self.config.logout_path);
        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
