use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier as issued by the identity provider.
///
/// Roles are opaque strings at this layer; [`resolve`] maps them onto the
/// closed set of [`AccessLevel`]s the scoping engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const DEPARTMENT_HEAD: Role = Role(Cow::Borrowed("department_head"));
    pub const MANAGER: Role = Role(Cow::Borrowed("manager"));
    pub const TEAM_LEAD: Role = Role(Cow::Borrowed("team_lead"));
    pub const SALES_AGENT: Role = Role(Cow::Borrowed("sales_agent"));
    pub const SUPPORT_AGENT: Role = Role(Cow::Borrowed("support_agent"));
    pub const PROCESSOR: Role = Role(Cow::Borrowed("processor"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The access level this role grants.
    pub fn access_level(&self) -> AccessLevel {
        resolve(self)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How broadly a principal may view data, widest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Everything in the tenant.
    Tenant,
    /// Everything in the principal's department.
    Department,
    /// The principal's managed teams (team leads and their members).
    ManagerTeam,
    /// The principal's direct team members.
    Team,
    /// Only records assigned to the principal.
    Individual,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Tenant => "tenant",
            AccessLevel::Department => "department",
            AccessLevel::ManagerTeam => "manager_team",
            AccessLevel::Team => "team",
            AccessLevel::Individual => "individual",
        }
    }

    /// Whether scoping at this level needs an org-hierarchy snapshot.
    pub fn requires_hierarchy(&self) -> bool {
        !matches!(self, AccessLevel::Individual)
    }
}

impl core::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a role onto its access level.
///
/// Total and pure. Matching is exact on the trimmed, ASCII-lowercased role
/// name; anything unrecognized falls back to [`AccessLevel::Individual`].
pub fn resolve(role: &Role) -> AccessLevel {
    let name = role.as_str().trim();
    if name.eq_ignore_ascii_case("admin") {
        AccessLevel::Tenant
    } else if name.eq_ignore_ascii_case("department_head") {
        AccessLevel::Department
    } else if name.eq_ignore_ascii_case("manager") {
        AccessLevel::ManagerTeam
    } else if name.eq_ignore_ascii_case("team_lead") {
        AccessLevel::Team
    } else {
        AccessLevel::Individual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_roles_map_to_their_levels() {
        assert_eq!(resolve(&Role::ADMIN), AccessLevel::Tenant);
        assert_eq!(resolve(&Role::DEPARTMENT_HEAD), AccessLevel::Department);
        assert_eq!(resolve(&Role::MANAGER), AccessLevel::ManagerTeam);
        assert_eq!(resolve(&Role::TEAM_LEAD), AccessLevel::Team);
        assert_eq!(resolve(&Role::SALES_AGENT), AccessLevel::Individual);
        assert_eq!(resolve(&Role::SUPPORT_AGENT), AccessLevel::Individual);
        assert_eq!(resolve(&Role::PROCESSOR), AccessLevel::Individual);
    }

    #[test]
    fn role_names_are_normalized() {
        assert_eq!(resolve(&Role::new(" Admin ")), AccessLevel::Tenant);
        assert_eq!(resolve(&Role::new("TEAM_LEAD")), AccessLevel::Team);
    }

    #[test]
    fn unknown_roles_fail_closed() {
        assert_eq!(resolve(&Role::new("superuser")), AccessLevel::Individual);
        assert_eq!(resolve(&Role::new("")), AccessLevel::Individual);
        assert_eq!(resolve(&Role::new("team lead")), AccessLevel::Individual);
    }

    #[test]
    fn only_individual_skips_the_hierarchy() {
        assert!(AccessLevel::Tenant.requires_hierarchy());
        assert!(AccessLevel::Team.requires_hierarchy());
        assert!(!AccessLevel::Individual.requires_hierarchy());
    }

    #[test]
    fn access_level_serde_names() {
        let json = serde_json::to_string(&AccessLevel::ManagerTeam).unwrap();
        assert_eq!(json, "\"manager_team\"");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: resolve is total and deterministic for arbitrary input.
        #[test]
        fn resolve_is_total_and_deterministic(name in ".{0,40}") {
            let role = Role::new(name.clone());
            let first = resolve(&role);
            let second = resolve(&Role::new(name));
            prop_assert_eq!(first, second);
        }

        /// Property: names outside the known set always resolve to Individual.
        #[test]
        fn unrecognized_names_resolve_to_individual(name in "[a-z_]{1,24}") {
            let known = ["admin", "department_head", "manager", "team_lead"];
            prop_assume!(!known.contains(&name.as_str()));
            prop_assert_eq!(resolve(&Role::new(name)), AccessLevel::Individual);
        }
    }
}
