//! Environment repository. Environments are keyed by tenant only.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{now, require};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::environment::{self, EnvironmentType};
use crate::types::{Status, ids};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewEnvironment {
    pub name: String,
    #[serde(default)]
    pub environment_type: EnvironmentType,
}

pub struct EnvironmentRepository<'a, C> {
    db: &'a C,
    tenant_id: &'a str,
}

impl<'a, C: ConnectionTrait> EnvironmentRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: &'a str) -> Self {
        Self { db, tenant_id }
    }

    pub async fn create(
        &self,
        input: NewEnvironment,
        actor: Option<String>,
    ) -> RepositoryResult<environment::Model> {
        require(self.tenant_id, "tenant_id")?;
        require(&input.name, "name")?;

        let now = now();
        let model = environment::ActiveModel {
            id: Set(ids::generate(ids::ENVIRONMENT)),
            tenant_id: Set(self.tenant_id.to_string()),
            status: Set(Status::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(actor.clone()),
            updated_by: Set(actor),
            name: Set(input.name.trim().to_string()),
            environment_type: Set(input.environment_type),
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            tenant_id = %model.tenant_id,
            environment_id = %model.id,
            environment_type = ?model.environment_type,
            "Created environment"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<environment::Model> {
        environment::Entity::find_by_id(id.to_string())
            .filter(environment::Column::TenantId.eq(self.tenant_id))
            .filter(environment::Column::Status.ne(Status::Deleted))
            .one(self.db)
            .await?
            .ok_or_else(|| RepositoryError::not_found("environment", id))
    }

    pub async fn list(&self) -> RepositoryResult<Vec<environment::Model>> {
        Ok(environment::Entity::find()
            .filter(environment::Column::TenantId.eq(self.tenant_id))
            .filter(environment::Column::Status.ne(Status::Deleted))
            .order_by_asc(environment::Column::CreatedAt)
            .all(self.db)
            .await?)
    }
}
