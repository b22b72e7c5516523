//! Session facade: the one entry point callers hold for a logged-in user.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use orgscope_auth::{AccessLevel, AuthContext, Principal};
use orgscope_core::{Clock, SystemClock};
use orgscope_directory::{DirectoryClient, HierarchySnapshot, TeamHierarchyFetcher};

use crate::{
    CacheState, EntityFilters, HierarchyCache, ScopeBuilder, ScopeConfig, ScopeError, ScopePredicate, ScopeQuery,
};

/// Data scope of one authenticated session.
///
/// Owns the session's hierarchy cache; dropping it at logout discards the
/// cached topology. The principal and its access level are fixed for the
/// lifetime of the value.
pub struct DataScope<C> {
    session_id: Uuid,
    principal: Principal,
    level: AccessLevel,
    cache: HierarchyCache<C>,
    builder: ScopeBuilder,
    clock: Arc<dyn Clock>,
}

impl<C> DataScope<C>
where
    C: DirectoryClient + 'static,
{
    pub fn new(principal: Principal, client: C, config: &ScopeConfig) -> Self {
        Self::with_clock(principal, client, config, Arc::new(SystemClock))
    }

    pub fn with_clock(principal: Principal, client: C, config: &ScopeConfig, clock: Arc<dyn Clock>) -> Self {
        let level = principal.access_level();
        let fetcher = TeamHierarchyFetcher::new(client)
            .with_clock(Arc::clone(&clock))
            .with_request_timeout(config.request_timeout);
        let cache = HierarchyCache::new(principal.id.clone(), fetcher, config.cache_ttl)
            .with_clock(Arc::clone(&clock));
        let session_id = Uuid::now_v7();

        tracing::info!(
            session_id = %session_id,
            principal_id = %principal.id,
            level = %level,
            "data scope opened"
        );

        Self {
            session_id,
            principal,
            level,
            cache,
            builder: ScopeBuilder::default(),
            clock,
        }
    }

    /// Scope for whoever the auth context currently holds.
    pub fn from_auth_context(
        auth: &dyn AuthContext,
        client: C,
        config: &ScopeConfig,
    ) -> Result<Self, ScopeError> {
        let principal = auth.current_principal().ok_or(ScopeError::Unauthenticated)?;
        Ok(Self::new(principal, client, config))
    }

    pub fn with_filters(mut self, filters: EntityFilters) -> Self {
        self.builder = ScopeBuilder::new(filters);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn access_level(&self) -> AccessLevel {
        self.level
    }

    pub fn status(&self) -> CacheState {
        self.cache.state()
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    pub fn cache(&self) -> &HierarchyCache<C> {
        &self.cache
    }

    /// Server-side scope. Never fails: if the hierarchy cannot be verified the
    /// result is the principal's own records with `degraded` set.
    pub async fn query_params(&self) -> ScopeQuery {
        match self.try_query_params().await {
            Ok(query) => query,
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, error = %err, "scope degraded to own records");
                ScopeBuilder::degraded_query(&self.principal)
            }
        }
    }

    pub async fn try_query_params(&self) -> Result<ScopeQuery, ScopeError> {
        let snapshot = self.snapshot().await?;
        Ok(ScopeBuilder::build_query(self.level, &self.principal, &snapshot))
    }

    /// Records of `entity_type` visible to this session.
    ///
    /// Unknown entity types are an error even when the hierarchy is
    /// unavailable; a failed refresh degrades to the principal's own records.
    pub async fn filter_data(&self, records: Vec<Value>, entity_type: &str) -> Result<Vec<Value>, ScopeError> {
        self.builder.filters().extractor(entity_type)?;

        let predicate = match self.snapshot().await {
            Ok(snapshot) => {
                self.builder
                    .build_predicate(self.level, &self.principal, &snapshot, entity_type)?
            }
            Err(ScopeError::Fetch(err)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    entity_type,
                    error = %err,
                    "filtering degraded to own records"
                );
                self.builder.degraded_predicate(&self.principal, entity_type)?
            }
            Err(other) => return Err(other),
        };
        Ok(self.apply(&predicate, records, entity_type))
    }

    pub async fn try_filter_data(&self, records: Vec<Value>, entity_type: &str) -> Result<Vec<Value>, ScopeError> {
        self.builder.filters().extractor(entity_type)?;

        let snapshot = self.snapshot().await?;
        let predicate = self
            .builder
            .build_predicate(self.level, &self.principal, &snapshot, entity_type)?;
        Ok(self.apply(&predicate, records, entity_type))
    }

    fn apply(&self, predicate: &ScopePredicate, records: Vec<Value>, entity_type: &str) -> Vec<Value> {
        let total = records.len();
        let kept = predicate.apply(records);
        tracing::debug!(
            session_id = %self.session_id,
            entity_type,
            total,
            kept = kept.len(),
            "records filtered"
        );
        kept
    }

    async fn snapshot(&self) -> Result<Arc<HierarchySnapshot>, ScopeError> {
        if !self.level.requires_hierarchy() {
            return Ok(Arc::new(HierarchySnapshot::empty(self.clock.now())));
        }
        self.cache.get_or_refresh(self.level, &self.principal).await
    }
}

impl<C> core::fmt::Debug for DataScope<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataScope")
            .field("session_id", &self.session_id)
            .field("principal", &self.principal)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl<C> Drop for DataScope<C> {
    fn drop(&mut self) {
        tracing::debug!(session_id = %self.session_id, "data scope closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orgscope_auth::{Role, StaticAuthContext};
    use orgscope_core::{DepartmentId, TenantId, UserId};
    use orgscope_directory::HierarchyFetchError;
    use orgscope_directory::wire::{MemberNode, MembersResponse, TeamsResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::LEADS;

    fn team_lead() -> Principal {
        Principal::new(UserId::new("u1"), Role::TEAM_LEAD, TenantId::new("t1"))
    }

    fn leads() -> Vec<Value> {
        vec![
            json!({ "id": 1, "assignedTo": "u1" }),
            json!({ "id": 2, "assignedTo": "u3" }),
            json!({ "id": 3, "assignedTo": "u4" }),
        ]
    }

    /// Directory that is always down.
    struct Unreachable;

    #[async_trait]
    impl DirectoryClient for Unreachable {
        async fn tenant_teams(
            &self,
            _tenant: &TenantId,
            _department: Option<&DepartmentId>,
        ) -> Result<TeamsResponse, HierarchyFetchError> {
            Err(HierarchyFetchError::transport("unreachable"))
        }

        async fn manager_teams(
            &self,
            _tenant: &TenantId,
            _manager: &UserId,
        ) -> Result<TeamsResponse, HierarchyFetchError> {
            Err(HierarchyFetchError::transport("unreachable"))
        }

        async fn team_members(
            &self,
            _tenant: &TenantId,
            _lead: &UserId,
        ) -> Result<MembersResponse, HierarchyFetchError> {
            Err(HierarchyFetchError::transport("unreachable"))
        }
    }

    /// Directory where lead u1 has members u2 and u3.
    #[derive(Default)]
    struct Roster {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DirectoryClient for Roster {
        async fn tenant_teams(
            &self,
            _tenant: &TenantId,
            _department: Option<&DepartmentId>,
        ) -> Result<TeamsResponse, HierarchyFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TeamsResponse { results: vec![] })
        }

        async fn manager_teams(
            &self,
            _tenant: &TenantId,
            _manager: &UserId,
        ) -> Result<TeamsResponse, HierarchyFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TeamsResponse { results: vec![] })
        }

        async fn team_members(
            &self,
            _tenant: &TenantId,
            _lead: &UserId,
        ) -> Result<MembersResponse, HierarchyFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MembersResponse {
                results: ["u2", "u3"]
                    .into_iter()
                    .map(|id| MemberNode {
                        member_user_id: Some(id.into()),
                    })
                    .collect(),
            })
        }
    }

    fn agent() -> Principal {
        Principal::new(UserId::new("u1"), Role::SALES_AGENT, TenantId::new("t1"))
    }

    #[tokio::test]
    async fn individual_scope_needs_no_directory() {
        let scope = DataScope::new(agent(), Unreachable, &ScopeConfig::default());

        let query = scope.try_query_params().await.unwrap();
        assert_eq!(query.user_ids.unwrap().len(), 1);
        assert!(!query.degraded);
        assert_eq!(scope.status(), CacheState::Empty);
    }

    #[tokio::test]
    async fn unknown_entity_type_is_reported_before_fetching() {
        let lead = Principal::new(UserId::new("u1"), Role::TEAM_LEAD, TenantId::new("t1"));
        let scope = DataScope::new(lead, Unreachable, &ScopeConfig::default());

        let err = scope.filter_data(vec![json!({})], "invoices").await.unwrap_err();
        assert_eq!(err, ScopeError::UnknownEntityType("invoices".into()));
    }

    #[tokio::test]
    async fn tenant_scope_degrades_when_directory_is_down() {
        let admin = Principal::new(UserId::new("a1"), Role::ADMIN, TenantId::new("t1"));
        let scope = DataScope::new(admin, Unreachable, &ScopeConfig::default());

        assert!(scope.try_query_params().await.unwrap_err().is_retryable());

        let query = scope.query_params().await;
        assert!(query.degraded);
        assert_eq!(query.user_ids.unwrap().into_iter().collect::<Vec<_>>(), vec![UserId::new("a1")]);
    }

    #[tokio::test]
    async fn try_filter_data_propagates_fetch_errors() {
        let scope = DataScope::new(team_lead(), Unreachable, &ScopeConfig::default());

        let err = scope.try_filter_data(leads(), LEADS).await.unwrap_err();
        assert_eq!(err, ScopeError::Fetch(HierarchyFetchError::transport("unreachable")));
        assert!(err.is_retryable());

        // The fail-closed variant still answers with own records.
        let kept = scope.filter_data(leads(), LEADS).await.unwrap();
        assert_eq!(kept, vec![json!({ "id": 1, "assignedTo": "u1" })]);
    }

    #[tokio::test]
    async fn try_filter_data_keeps_team_records() {
        let roster = Arc::new(Roster::default());
        let scope = DataScope::new(team_lead(), Arc::clone(&roster), &ScopeConfig::default());

        let kept = scope.try_filter_data(leads(), LEADS).await.unwrap();

        let ids: Vec<i64> = kept.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(roster.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn try_filter_data_rejects_unknown_entity_type_without_fetching() {
        let roster = Arc::new(Roster::default());
        let scope = DataScope::new(team_lead(), Arc::clone(&roster), &ScopeConfig::default());

        let err = scope.try_filter_data(leads(), "invoices").await.unwrap_err();

        assert_eq!(err, ScopeError::UnknownEntityType("invoices".into()));
        assert_eq!(roster.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scope.status(), CacheState::Empty);
    }

    #[test]
    fn auth_context_without_principal_is_unauthenticated() {
        let auth = StaticAuthContext::new();
        let err = DataScope::from_auth_context(&auth, Unreachable, &ScopeConfig::default()).unwrap_err();
        assert_eq!(err, ScopeError::Unauthenticated);

        auth.login(agent());
        let scope = DataScope::from_auth_context(&auth, Unreachable, &ScopeConfig::default()).unwrap();
        assert_eq!(scope.access_level(), AccessLevel::Individual);
    }
}
