use crate::error::{RepositoryError, RepositoryResult};

/// Tenant, environment and acting user attached to every request and
/// repository call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    pub tenant_id: String,
    pub environment_id: String,
    pub user_id: Option<String>,
}

impl TenantScope {
    pub fn new(tenant_id: impl Into<String>, environment_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            environment_id: environment_id.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Rejects scopes with an empty tenant or environment.
    pub fn validate(&self) -> RepositoryResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(RepositoryError::validation_error("tenant_id is required"));
        }
        if self.environment_id.trim().is_empty() {
            return Err(RepositoryError::validation_error(
                "environment_id is required",
            ));
        }
        Ok(())
    }

    /// Value stamped into `created_by` / `updated_by`.
    pub fn actor(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tenant_is_rejected() {
        assert!(TenantScope::new("", "env_1").validate().is_err());
        assert!(TenantScope::new("tenant_1", " ").validate().is_err());
        assert!(TenantScope::new("tenant_1", "env_1").validate().is_ok());
    }

    #[test]
    fn actor_comes_from_user() {
        let scope = TenantScope::new("t", "e").with_user("user_7");
        assert_eq!(scope.actor().as_deref(), Some("user_7"));
    }
}
