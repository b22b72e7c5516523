use std::sync::Arc;
use std::time::Duration;

use orgscope_auth::{AccessLevel, Principal};
use orgscope_core::{Clock, SystemClock};

use crate::client::DirectoryClient;
use crate::snapshot::HierarchySnapshot;
use crate::traverse::{self, Subtree};
use crate::HierarchyFetchError;

/// Retrieves the org-tree segment a principal's access level depends on.
///
/// Each level has its own endpoint and traversal; Individual never touches
/// the network. Failures are returned as-is, there is no retry here.
pub struct TeamHierarchyFetcher<C> {
    client: C,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
}

impl<C: DirectoryClient> TeamHierarchyFetcher<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upper bound on one directory round-trip, whatever the transport.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    #[tracing::instrument(skip_all, fields(principal_id = %principal.id, level = %level))]
    pub async fn fetch(
        &self,
        level: AccessLevel,
        principal: &Principal,
    ) -> Result<HierarchySnapshot, HierarchyFetchError> {
        let tenant = &principal.tenant_id;

        let snapshot = match level {
            AccessLevel::Individual => HierarchySnapshot::empty(self.clock.now()),
            AccessLevel::Tenant => {
                let resp = self.bounded(self.client.tenant_teams(tenant, None)).await?;
                traverse::snapshot_from_teams(&resp.results, Subtree::Whole, self.clock.now())
            }
            AccessLevel::Department => match principal.department_id.as_ref() {
                Some(department) => {
                    let resp = self
                        .bounded(self.client.tenant_teams(tenant, Some(department)))
                        .await?;
                    traverse::snapshot_from_teams(&resp.results, Subtree::Whole, self.clock.now())
                }
                None => {
                    tracing::warn!("department-level principal has no department; skipping fetch");
                    HierarchySnapshot::empty(self.clock.now())
                }
            },
            AccessLevel::ManagerTeam => {
                let resp = self
                    .bounded(self.client.manager_teams(tenant, &principal.id))
                    .await?;
                traverse::snapshot_from_teams(
                    &resp.results,
                    Subtree::ManagedBy(&principal.id),
                    self.clock.now(),
                )
            }
            AccessLevel::Team => {
                let resp = self
                    .bounded(self.client.team_members(tenant, &principal.id))
                    .await?;
                traverse::snapshot_from_members(&resp.results, self.clock.now())
            }
        };

        tracing::debug!(
            teams = snapshot.team_ids().len(),
            leads = snapshot.team_lead_user_ids().len(),
            members = snapshot.team_member_user_ids().len(),
            "hierarchy fetched"
        );
        Ok(snapshot)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, HierarchyFetchError>
    where
        F: Future<Output = Result<T, HierarchyFetchError>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(HierarchyFetchError::Timeout(self.request_timeout)),
        }
    }
}
