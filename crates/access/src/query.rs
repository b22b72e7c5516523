use std::collections::BTreeSet;

use serde::Serialize;

use orgscope_core::{DepartmentId, TeamId, TenantId, UserId};

/// Server-side scoping parameters for entity APIs.
///
/// Recomputed on demand from the current snapshot, never cached itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeQuery {
    pub tenant_id: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<DepartmentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_ids: Option<BTreeSet<TeamId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<BTreeSet<UserId>>,
    /// Set when the hierarchy could not be verified and the scope collapsed
    /// to the principal's own records.
    #[serde(skip_serializing_if = "is_false")]
    pub degraded: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ScopeQuery {
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            department_id: None,
            team_ids: None,
            user_ids: None,
            degraded: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Whether records of `user` fall inside the user-id constraint.
    ///
    /// `true` when the query carries no user constraint at all.
    pub fn allows_user(&self, user: &UserId) -> bool {
        self.user_ids.as_ref().is_none_or(|ids| ids.contains(user))
    }

    /// Request parameters understood by entity APIs: `tenant_id`,
    /// `department`, `team_ids`, `user_ids` (lists comma-joined, sorted).
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("tenant_id", self.tenant_id.to_string())];

        if let Some(department) = &self.department_id {
            pairs.push(("department", department.to_string()));
        }
        if let Some(teams) = &self.team_ids {
            pairs.push(("team_ids", join(teams.iter().map(TeamId::as_str))));
        }
        if let Some(users) = &self.user_ids {
            pairs.push(("user_ids", join(users.iter().map(UserId::as_str))));
        }

        pairs
    }
}

fn join<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    ids.collect::<Vec<_>>().join(",")
}
