//! Per-entity-type field extraction.
//!
//! Entity APIs return loosely shaped JSON: a department may be a plain id, an
//! embedded `{ "id": .. }` object, or live under `details`. Each extractor
//! normalizes one entity type into [`ScopeFields`] so the predicate only ever
//! compares canonical ids. There is no reflection-based fallback: an entity
//! type without a registered extractor is a configuration error.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use orgscope_core::{DepartmentId, TeamId, TenantId, UserId};

use crate::ScopeError;

/// Canonical scoping-relevant fields of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFields {
    pub assigned_user_id: Option<UserId>,
    pub department_id: Option<DepartmentId>,
    pub team_id: Option<TeamId>,
    pub tenant_id: Option<TenantId>,
}

/// Field extraction function for one entity type.
pub type FieldExtractor = Arc<dyn Fn(&Value) -> ScopeFields + Send + Sync>;

pub const LEADS: &str = "leads";
pub const CHATS: &str = "chats";

/// Registry: entity type name → extractor.
#[derive(Clone)]
pub struct EntityFilters {
    extractors: BTreeMap<String, FieldExtractor>,
}

impl EntityFilters {
    /// Registry with no entity types.
    pub fn empty() -> Self {
        Self {
            extractors: BTreeMap::new(),
        }
    }

    /// Registry with the built-in `leads` and `chats` extractors.
    pub fn with_defaults() -> Self {
        let mut filters = Self::empty();
        filters.register(LEADS, lead_fields);
        filters.register(CHATS, chat_fields);
        filters
    }

    /// Register (or replace) the extractor for an entity type.
    pub fn register<F>(&mut self, entity_type: impl Into<String>, extractor: F)
    where
        F: Fn(&Value) -> ScopeFields + Send + Sync + 'static,
    {
        self.extractors.insert(entity_type.into(), Arc::new(extractor));
    }

    pub fn extractor(&self, entity_type: &str) -> Result<FieldExtractor, ScopeError> {
        self.extractors
            .get(entity_type)
            .cloned()
            .ok_or_else(|| ScopeError::UnknownEntityType(entity_type.to_string()))
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.extractors.contains_key(entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }
}

impl Default for EntityFilters {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl core::fmt::Debug for EntityFilters {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityFilters")
            .field("entity_types", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Leads: assignee from `assignedTo`, department from `department` or
/// `details.department`.
pub fn lead_fields(record: &Value) -> ScopeFields {
    ScopeFields {
        assigned_user_id: first_id(record, &["assignedTo", "assigned_to"]).map(UserId::new),
        department_id: department(record),
        team_id: first_id(record, &["team", "team_id"]).map(TeamId::new),
        tenant_id: first_id(record, &["tenant_id", "tenantId"]).map(TenantId::new),
    }
}

/// Chats: assignee from the handling agent.
pub fn chat_fields(record: &Value) -> ScopeFields {
    ScopeFields {
        assigned_user_id: first_id(record, &["agent", "assigned_agent", "assignedTo"])
            .map(UserId::new),
        department_id: department(record),
        team_id: first_id(record, &["team_id"]).map(TeamId::new),
        tenant_id: first_id(record, &["tenant_id", "tenantId"]).map(TenantId::new),
    }
}

fn department(record: &Value) -> Option<DepartmentId> {
    first_id(record, &["department", "department_id"])
        .or_else(|| record.get("details").and_then(|d| first_id(d, &["department"])))
        .map(DepartmentId::new)
}

fn first_id(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| record.get(*key).and_then(id_like))
}

/// An id given as a non-blank string (trimmed), an integer, or an object with
/// `id`.
fn id_like(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let id = s.trim();
            (!id.is_empty()).then(|| id.to_string())
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        Value::Object(map) => match map.get("id") {
            Some(inner @ (Value::String(_) | Value::Number(_))) => id_like(inner),
            _ => None,
        },
        _ => None,
    }
}
