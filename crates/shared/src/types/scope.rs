//! Explicit tenant scope.
//!
//! Every engine call receives the scope it runs under. Nothing reads tenant
//! or environment from ambient state.

use serde::{Deserialize, Serialize};

use super::id::{EnvironmentId, TenantId};

/// The tenant and environment a unit of work belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Environment within the tenant (e.g. sandbox, production).
    pub environment_id: EnvironmentId,
}

impl TenantScope {
    /// Creates a new scope.
    #[must_use]
    pub const fn new(tenant_id: TenantId, environment_id: EnvironmentId) -> Self {
        Self {
            tenant_id,
            environment_id,
        }
    }

    /// Returns true if a record owned by `tenant_id`/`environment_id` is visible in this scope.
    #[must_use]
    pub fn contains(&self, tenant_id: TenantId, environment_id: EnvironmentId) -> bool {
        self.tenant_id == tenant_id && self.environment_id == environment_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_contains() {
        let scope = TenantScope::new(TenantId::new(), EnvironmentId::new());
        assert!(scope.contains(scope.tenant_id, scope.environment_id));
        assert!(!scope.contains(TenantId::new(), scope.environment_id));
        assert!(!scope.contains(scope.tenant_id, EnvironmentId::new()));
    }
}
