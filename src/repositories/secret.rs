//! Secret repository. API key lookups by hash are global because the key
//! itself identifies the tenant.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use super::{get_scoped, now, paginate, scoped, soft_delete};
use crate::error::RepositoryResult;
use crate::models::secret::{self, SecretType};
use crate::types::{ListResult, Pagination, Status, TenantScope};

pub struct SecretRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> SecretRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn insert(&self, model: secret::Model) -> RepositoryResult<secret::Model> {
        self.scope.validate()?;
        let model = secret::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?;
        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            secret_id = %model.id,
            display_id = %model.display_id,
            "Created secret"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<secret::Model> {
        get_scoped::<secret::Entity, _>(self.db, self.scope, "secret", id).await
    }

    pub async fn list(
        &self,
        secret_type: Option<SecretType>,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<secret::Model>> {
        let mut select = scoped::<secret::Entity>(self.scope);
        if let Some(secret_type) = secret_type {
            select = select.filter(secret::Column::SecretType.eq(secret_type));
        }
        paginate(self.db, select, page).await
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        soft_delete::<secret::Entity, _>(self.db, self.scope, "secret", id).await
    }
}

/// Published secret whose stored hash equals `value`, in any tenant.
pub async fn find_published_by_value<C: ConnectionTrait>(
    db: &C,
    value: &str,
) -> RepositoryResult<Option<secret::Model>> {
    Ok(secret::Entity::find()
        .filter(secret::Column::Value.eq(value))
        .filter(secret::Column::Status.eq(Status::Published))
        .one(db)
        .await?)
}

pub async fn touch_last_used<C: ConnectionTrait>(db: &C, secret: &secret::Model) -> RepositoryResult<()> {
    let mut model: secret::ActiveModel = secret.clone().into();
    model.last_used_at = Set(Some(now()));
    model.update(db).await?;
    Ok(())
}
