//! Plan repository.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, IntoActiveModel, QueryFilter, Set};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{find_one, get_scoped, now, paginate, require, scoped, soft_delete};
use crate::error::RepositoryResult;
use crate::models::plan;
use crate::types::{ListResult, Pagination, Status, TenantScope, ids};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPlan {
    pub lookup_key: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdatePlan {
    pub lookup_key: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub struct PlanRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> PlanRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create(&self, input: NewPlan) -> RepositoryResult<plan::Model> {
        self.scope.validate()?;
        require(&input.name, "name")?;

        let now = now();
        let model = plan::ActiveModel {
            id: Set(ids::generate(ids::PLAN)),
            tenant_id: Set(self.scope.tenant_id.clone()),
            environment_id: Set(self.scope.environment_id.clone()),
            status: Set(Status::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(self.scope.actor()),
            updated_by: Set(self.scope.actor()),
            lookup_key: Set(input.lookup_key.filter(|k| !k.trim().is_empty())),
            name: Set(input.name),
            description: Set(input.description),
            metadata: Set(input.metadata),
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            plan_id = %model.id,
            "Created plan"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<plan::Model> {
        get_scoped::<plan::Entity, _>(self.db, self.scope, "plan", id).await
    }

    pub async fn get_by_lookup_key(&self, lookup_key: &str) -> RepositoryResult<plan::Model> {
        let select =
            scoped::<plan::Entity>(self.scope).filter(plan::Column::LookupKey.eq(lookup_key));
        find_one(self.db, select, &format!("plan with lookup_key {lookup_key}")).await
    }

    pub async fn list(&self, page: &Pagination) -> RepositoryResult<ListResult<plan::Model>> {
        paginate(self.db, scoped::<plan::Entity>(self.scope), page).await
    }

    pub async fn update(&self, id: &str, input: UpdatePlan) -> RepositoryResult<plan::Model> {
        let mut model = self.get(id).await?.into_active_model();
        if input.lookup_key.is_some() {
            model.lookup_key = Set(input.lookup_key);
        }
        if let Some(name) = input.name {
            require(&name, "name")?;
            model.name = Set(name);
        }
        if input.description.is_some() {
            model.description = Set(input.description);
        }
        if input.metadata.is_some() {
            model.metadata = Set(input.metadata);
        }
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        soft_delete::<plan::Entity, _>(self.db, self.scope, "plan", id).await
    }
}
