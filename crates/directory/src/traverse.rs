//! Depth-first traversal of directory trees into snapshot id sets.
//!
//! One pass over team → manager → team lead → member. Nodes with a null or
//! blank id contribute nothing themselves but their children are still
//! visited (unless a manager filter excludes the branch).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use orgscope_core::{TeamId, UserId};

use crate::snapshot::HierarchySnapshot;
use crate::wire::{ManagerNode, MemberNode, TeamLeadNode, TeamNode};

/// Restricts which manager subtrees are traversed.
#[derive(Debug, Clone, Copy)]
pub enum Subtree<'a> {
    /// Every manager of every team.
    Whole,
    /// Only manager nodes whose id equals the given user.
    ManagedBy(&'a UserId),
}

#[derive(Debug, Default)]
struct Accumulator {
    team_ids: BTreeSet<TeamId>,
    managers: BTreeSet<UserId>,
    leads: BTreeSet<UserId>,
    members: BTreeSet<UserId>,
}

impl Accumulator {
    fn visit_team(&mut self, team: &TeamNode, subtree: Subtree<'_>) {
        let mut visited_any = false;
        for manager in &team.managers {
            visited_any |= self.visit_manager(manager, subtree);
        }

        // A team counts when its tree is in scope: always for the whole
        // forest, only when one of its managers matched otherwise.
        let in_scope = match subtree {
            Subtree::Whole => true,
            Subtree::ManagedBy(_) => visited_any,
        };
        if in_scope {
            if let Some(id) = team_id(team.team_id.as_deref()) {
                self.team_ids.insert(id);
            }
        }
    }

    fn visit_manager(&mut self, manager: &ManagerNode, subtree: Subtree<'_>) -> bool {
        let id = user_id(manager.manager_user_id.as_deref());
        if let Subtree::ManagedBy(root) = subtree {
            if id.as_ref() != Some(root) {
                return false;
            }
        }

        if let Some(id) = id {
            self.managers.insert(id);
        }
        for lead in &manager.team_leads {
            self.visit_lead(lead);
        }
        true
    }

    fn visit_lead(&mut self, lead: &TeamLeadNode) {
        if let Some(id) = user_id(lead.team_lead_user_id.as_deref()) {
            self.leads.insert(id);
        }
        self.visit_members(&lead.members);
    }

    fn visit_members(&mut self, members: &[MemberNode]) {
        for member in members {
            if let Some(id) = user_id(member.member_user_id.as_deref()) {
                self.members.insert(id);
            }
        }
    }

    fn finish(mut self, fetched_at: DateTime<Utc>) -> HierarchySnapshot {
        // Someone listed under several tiers keeps only the highest one.
        self.leads.retain(|id| !self.managers.contains(id));
        self.members
            .retain(|id| !self.managers.contains(id) && !self.leads.contains(id));

        HierarchySnapshot::from_parts(
            self.team_ids,
            self.managers,
            self.leads,
            self.members,
            fetched_at,
        )
    }
}

fn user_id(raw: Option<&str>) -> Option<UserId> {
    raw.and_then(|s| UserId::parse(s).ok())
}

fn team_id(raw: Option<&str>) -> Option<TeamId> {
    raw.and_then(|s| TeamId::parse(s).ok())
}

/// Traverse a forest of teams. O(number of nodes).
pub fn snapshot_from_teams(
    teams: &[TeamNode],
    subtree: Subtree<'_>,
    fetched_at: DateTime<Utc>,
) -> HierarchySnapshot {
    let mut acc = Accumulator::default();
    for team in teams {
        acc.visit_team(team, subtree);
    }
    acc.finish(fetched_at)
}

/// Direct members of a team lead; no deeper structure exists.
pub fn snapshot_from_members(members: &[MemberNode], fetched_at: DateTime<Utc>) -> HierarchySnapshot {
    let mut acc = Accumulator::default();
    acc.visit_members(members);
    acc.finish(fetched_at)
}
