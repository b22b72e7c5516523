//! Directory service response schema.
//!
//! Every endpoint answers with a `{"results": [...]}` envelope. There is no
//! fallback for bare arrays or other shapes: anything that does not decode
//! into these types is rejected as [`HierarchyFetchError::Schema`].
//!
//! Inside a tree, child arrays may be missing or null and ids may be null; such
//! partially populated branches are tolerated by the traversal.

use serde::{Deserialize, Deserializer, Serialize};

use crate::HierarchyFetchError;

/// Envelope for `/teams` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamsResponse {
    pub results: Vec<TeamNode>,
}

/// Envelope for the team-lead members endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersResponse {
    pub results: Vec<MemberNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamNode {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub managers: Vec<ManagerNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerNode {
    #[serde(default)]
    pub manager_user_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub team_leads: Vec<TeamLeadNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLeadNode {
    #[serde(default)]
    pub team_lead_user_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub members: Vec<MemberNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberNode {
    #[serde(default)]
    pub member_user_id: Option<String>,
}

/// A child array given as `null` decodes like a missing one. Any other
/// non-array value is still a schema error.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl TeamsResponse {
    pub fn from_json(body: &str) -> Result<Self, HierarchyFetchError> {
        serde_json::from_str(body)
            .map_err(|e| HierarchyFetchError::schema(format!("teams response: {e}")))
    }
}

impl MembersResponse {
    pub fn from_json(body: &str) -> Result<Self, HierarchyFetchError> {
        serde_json::from_str(body)
            .map_err(|e| HierarchyFetchError::schema(format!("members response: {e}")))
    }
}
