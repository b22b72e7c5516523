use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use orgscope_core::{TeamId, UserId};

/// Time-boxed materialization of the org subtree relevant to a principal.
///
/// Built in one pass by [`crate::traverse`] and never mutated afterwards; the
/// cache replaces it wholesale. The three user-id sets are disjoint, with
/// precedence manager > team lead > member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchySnapshot {
    team_ids: BTreeSet<TeamId>,
    managed_user_ids: BTreeSet<UserId>,
    team_lead_user_ids: BTreeSet<UserId>,
    team_member_user_ids: BTreeSet<UserId>,
    fetched_at: DateTime<Utc>,
}

impl HierarchySnapshot {
    /// Snapshot with no teams and no users (Individual level, failed refresh).
    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self {
            team_ids: BTreeSet::new(),
            managed_user_ids: BTreeSet::new(),
            team_lead_user_ids: BTreeSet::new(),
            team_member_user_ids: BTreeSet::new(),
            fetched_at,
        }
    }

    pub(crate) fn from_parts(
        team_ids: BTreeSet<TeamId>,
        managed_user_ids: BTreeSet<UserId>,
        team_lead_user_ids: BTreeSet<UserId>,
        team_member_user_ids: BTreeSet<UserId>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            team_ids,
            managed_user_ids,
            team_lead_user_ids,
            team_member_user_ids,
            fetched_at,
        }
    }

    pub fn team_ids(&self) -> &BTreeSet<TeamId> {
        &self.team_ids
    }

    pub fn managed_user_ids(&self) -> &BTreeSet<UserId> {
        &self.managed_user_ids
    }

    pub fn team_lead_user_ids(&self) -> &BTreeSet<UserId> {
        &self.team_lead_user_ids
    }

    pub fn team_member_user_ids(&self) -> &BTreeSet<UserId> {
        &self.team_member_user_ids
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at)
    }

    /// Valid iff `now - fetched_at < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    pub fn is_empty(&self) -> bool {
        self.team_ids.is_empty()
            && self.managed_user_ids.is_empty()
            && self.team_lead_user_ids.is_empty()
            && self.team_member_user_ids.is_empty()
    }

    /// Whether `user` appears anywhere in the snapshot.
    pub fn contains_user(&self, user: &UserId) -> bool {
        self.managed_user_ids.contains(user)
            || self.team_lead_user_ids.contains(user)
            || self.team_member_user_ids.contains(user)
    }
}
