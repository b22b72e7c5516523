//! Derivation of scope queries and client-side predicates.

use std::collections::BTreeSet;

use serde_json::Value;

use orgscope_auth::{AccessLevel, Principal};
use orgscope_directory::HierarchySnapshot;

use crate::filters::{EntityFilters, FieldExtractor, ScopeFields};
use crate::{ScopeError, ScopeQuery};

/// Builds scope queries and predicates for one principal's access level.
#[derive(Debug, Clone, Default)]
pub struct ScopeBuilder {
    filters: EntityFilters,
}

impl ScopeBuilder {
    pub fn new(filters: EntityFilters) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &EntityFilters {
        &self.filters
    }

    /// Server-side scope for `level`.
    ///
    /// ManagerTeam, Team and Individual always include the principal's own
    /// id. A Department principal without a department has nothing to scope
    /// by and collapses to [`Self::degraded_query`].
    pub fn build_query(
        level: AccessLevel,
        principal: &Principal,
        snapshot: &HierarchySnapshot,
    ) -> ScopeQuery {
        let tenant = ScopeQuery::tenant(principal.tenant_id.clone());
        let own = || BTreeSet::from([principal.id.clone()]);

        match level {
            AccessLevel::Tenant => tenant,
            AccessLevel::Department => match &principal.department_id {
                Some(department) => ScopeQuery {
                    department_id: Some(department.clone()),
                    ..tenant
                },
                None => {
                    tracing::warn!(principal_id = %principal.id, "department-level principal without department");
                    Self::degraded_query(principal)
                }
            },
            AccessLevel::ManagerTeam => {
                let mut users = own();
                users.extend(snapshot.team_lead_user_ids().iter().cloned());
                users.extend(snapshot.team_member_user_ids().iter().cloned());
                ScopeQuery {
                    team_ids: Some(snapshot.team_ids().clone()),
                    user_ids: Some(users),
                    ..tenant
                }
            }
            AccessLevel::Team => {
                let mut users = own();
                users.extend(snapshot.team_member_user_ids().iter().cloned());
                ScopeQuery {
                    user_ids: Some(users),
                    ..tenant
                }
            }
            AccessLevel::Individual => ScopeQuery {
                user_ids: Some(own()),
                ..tenant
            },
        }
    }

    /// Most restrictive scope: the principal's own records, flagged degraded.
    pub fn degraded_query(principal: &Principal) -> ScopeQuery {
        ScopeQuery {
            user_ids: Some(BTreeSet::from([principal.id.clone()])),
            degraded: true,
            ..ScopeQuery::tenant(principal.tenant_id.clone())
        }
    }

    /// Client-side predicate applying the same membership tests as
    /// [`Self::build_query`] to records of `entity_type`.
    pub fn build_predicate(
        &self,
        level: AccessLevel,
        principal: &Principal,
        snapshot: &HierarchySnapshot,
        entity_type: &str,
    ) -> Result<ScopePredicate, ScopeError> {
        let extractor = self.filters.extractor(entity_type)?;
        Ok(ScopePredicate::new(
            Self::build_query(level, principal, snapshot),
            extractor,
        ))
    }

    /// Predicate over [`Self::degraded_query`].
    pub fn degraded_predicate(
        &self,
        principal: &Principal,
        entity_type: &str,
    ) -> Result<ScopePredicate, ScopeError> {
        let extractor = self.filters.extractor(entity_type)?;
        Ok(ScopePredicate::new(Self::degraded_query(principal), extractor))
    }
}

/// Record filter derived from a [`ScopeQuery`].
///
/// Tests, in order: the record's tenant (when present) must match; with a
/// user constraint the assignee must be listed, or the record's team must be
/// one of the query's teams; with only a department constraint the record's
/// department must match. A record missing the tested field is rejected.
#[derive(Clone)]
pub struct ScopePredicate {
    query: ScopeQuery,
    extractor: FieldExtractor,
}

impl ScopePredicate {
    pub fn new(query: ScopeQuery, extractor: FieldExtractor) -> Self {
        Self { query, extractor }
    }

    pub fn query(&self) -> &ScopeQuery {
        &self.query
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.matches_fields(&(self.extractor)(record))
    }

    pub fn matches_fields(&self, fields: &ScopeFields) -> bool {
        let q = &self.query;

        if let Some(tenant) = &fields.tenant_id {
            if *tenant != q.tenant_id {
                return false;
            }
        }

        if let Some(users) = &q.user_ids {
            let assigned = fields
                .assigned_user_id
                .as_ref()
                .is_some_and(|user| users.contains(user));
            let in_team = match (&q.team_ids, &fields.team_id) {
                (Some(teams), Some(team)) => teams.contains(team),
                _ => false,
            };
            return assigned || in_team;
        }

        if let Some(department) = &q.department_id {
            return fields.department_id.as_ref() == Some(department);
        }

        true
    }

    /// Keep only matching records, preserving order.
    pub fn apply(&self, records: Vec<Value>) -> Vec<Value> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

impl core::fmt::Debug for ScopePredicate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopePredicate")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
