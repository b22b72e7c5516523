use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use orgscope_core::{DepartmentId, TenantId, UserId};

use crate::{AccessLevel, Role};

/// The authenticated actor whose data access is being scoped.
///
/// Created from session storage at login and immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

impl Principal {
    pub fn new(id: UserId, role: Role, tenant_id: TenantId) -> Self {
        Self {
            id,
            role,
            tenant_id,
            department_id: None,
        }
    }

    pub fn with_department(mut self, department_id: DepartmentId) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn access_level(&self) -> AccessLevel {
        self.role.access_level()
    }
}

/// Source of the current session's principal.
///
/// Token issuance and validation happen outside this crate; implementations
/// only expose what the session already holds.
pub trait AuthContext: Send + Sync {
    /// The logged-in principal, or `None` when no session is active.
    fn current_principal(&self) -> Option<Principal>;
}

impl<A> AuthContext for std::sync::Arc<A>
where
    A: AuthContext + ?Sized,
{
    fn current_principal(&self) -> Option<Principal> {
        (**self).current_principal()
    }
}

/// In-memory session holder for tests/dev and embedding applications.
#[derive(Debug, Default)]
pub struct StaticAuthContext {
    inner: RwLock<Option<Principal>>,
}

impl StaticAuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(principal: Principal) -> Self {
        Self {
            inner: RwLock::new(Some(principal)),
        }
    }

    pub fn login(&self, principal: Principal) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(principal);
        }
    }

    pub fn logout(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }
}

impl AuthContext for StaticAuthContext {
    fn current_principal(&self) -> Option<Principal> {
        self.inner.read().ok()?.clone()
    }
}
