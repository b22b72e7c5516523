//! Directory service transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use orgscope_core::{DepartmentId, TenantId, UserId};

use crate::wire::{MembersResponse, TeamsResponse};
use crate::HierarchyFetchError;

/// Read-only access to the org directory, one method per endpoint.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// All teams of a tenant, optionally restricted to one department.
    async fn tenant_teams(
        &self,
        tenant_id: &TenantId,
        department_id: Option<&DepartmentId>,
    ) -> Result<TeamsResponse, HierarchyFetchError>;

    /// Teams in which `manager_id` appears as a manager.
    async fn manager_teams(
        &self,
        tenant_id: &TenantId,
        manager_id: &UserId,
    ) -> Result<TeamsResponse, HierarchyFetchError>;

    /// Direct members of the team led by `team_lead_id`.
    async fn team_members(
        &self,
        tenant_id: &TenantId,
        team_lead_id: &UserId,
    ) -> Result<MembersResponse, HierarchyFetchError>;
}

#[async_trait]
impl<C> DirectoryClient for std::sync::Arc<C>
where
    C: DirectoryClient + ?Sized,
{
    async fn tenant_teams(
        &self,
        tenant_id: &TenantId,
        department_id: Option<&DepartmentId>,
    ) -> Result<TeamsResponse, HierarchyFetchError> {
        (**self).tenant_teams(tenant_id, department_id).await
    }

    async fn manager_teams(
        &self,
        tenant_id: &TenantId,
        manager_id: &UserId,
    ) -> Result<TeamsResponse, HierarchyFetchError> {
        (**self).manager_teams(tenant_id, manager_id).await
    }

    async fn team_members(
        &self,
        tenant_id: &TenantId,
        team_lead_id: &UserId,
    ) -> Result<MembersResponse, HierarchyFetchError> {
        (**self).team_members(tenant_id, team_lead_id).await
    }
}

/// HTTP client for the directory REST API.
#[derive(Debug, Clone)]
pub struct HttpDirectoryClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpDirectoryClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: &str) -> Result<Self, HierarchyFetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HierarchyFetchError::transport(format!("invalid directory url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(HierarchyFetchError::transport(format!(
                "directory url '{base_url}' cannot carry a path"
            )));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| HierarchyFetchError::transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            token: None,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HierarchyFetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HierarchyFetchError::transport("directory url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url, query: &[(&str, &str)]) -> Result<String, HierarchyFetchError> {
        tracing::debug!(%url, "directory request");

        let mut req = self.http.get(url).timeout(self.timeout);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| self.map_reqwest(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.map_reqwest(e))?;

        if !status.is_success() {
            return Err(HierarchyFetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    fn map_reqwest(&self, err: reqwest::Error) -> HierarchyFetchError {
        if err.is_timeout() {
            HierarchyFetchError::Timeout(self.timeout)
        } else {
            HierarchyFetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn tenant_teams(
        &self,
        tenant_id: &TenantId,
        department_id: Option<&DepartmentId>,
    ) -> Result<TeamsResponse, HierarchyFetchError> {
        let url = self.endpoint(&["tenants", tenant_id.as_str(), "teams"])?;
        let query: Vec<(&str, &str)> = department_id
            .map(|d| vec![("department_id", d.as_str())])
            .unwrap_or_default();

        let body = self.get(url, &query).await?;
        TeamsResponse::from_json(&body)
    }

    async fn manager_teams(
        &self,
        tenant_id: &TenantId,
        manager_id: &UserId,
    ) -> Result<TeamsResponse, HierarchyFetchError> {
        let url = self.endpoint(&[
            "tenants",
            tenant_id.as_str(),
            "managers",
            manager_id.as_str(),
            "teams",
        ])?;

        let body = self.get(url, &[]).await?;
        TeamsResponse::from_json(&body)
    }

    async fn team_members(
        &self,
        tenant_id: &TenantId,
        team_lead_id: &UserId,
    ) -> Result<MembersResponse, HierarchyFetchError> {
        let url = self.endpoint(&[
            "tenants",
            tenant_id.as_str(),
            "team-leads",
            team_lead_id.as_str(),
            "members",
        ])?;

        let body = self.get(url, &[]).await?;
        MembersResponse::from_json(&body)
    }
}
