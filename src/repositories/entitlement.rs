//! Entitlement repository. Cross-entity rules (plan and feature existence,
//! feature type checks) are enforced by the entitlement service.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, IntoActiveModel, QueryFilter, Set};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{get_scoped, now, paginate, scoped, soft_delete};
use crate::error::RepositoryResult;
use crate::models::entitlement;
use crate::types::{ListResult, Pagination, TenantScope};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEntitlement {
    pub is_enabled: Option<bool>,
    pub usage_limit: Option<i64>,
    pub is_soft_limit: Option<bool>,
    pub static_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct EntitlementQuery {
    pub plan_id: Option<String>,
    pub feature_id: Option<String>,
}

pub struct EntitlementRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> EntitlementRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    /// Inserts a fully built entitlement.
    pub async fn insert(&self, model: entitlement::Model) -> RepositoryResult<entitlement::Model> {
        self.scope.validate()?;
        let model = entitlement::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?;
        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            entitlement_id = %model.id,
            plan_id = %model.plan_id,
            feature_id = %model.feature_id,
            "Created entitlement"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<entitlement::Model> {
        get_scoped::<entitlement::Entity, _>(self.db, self.scope, "entitlement", id).await
    }

    pub async fn list(
        &self,
        query: &EntitlementQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<entitlement::Model>> {
        let mut select = scoped::<entitlement::Entity>(self.scope);
        if let Some(plan_id) = &query.plan_id {
            select = select.filter(entitlement::Column::PlanId.eq(plan_id.as_str()));
        }
        if let Some(feature_id) = &query.feature_id {
            select = select.filter(entitlement::Column::FeatureId.eq(feature_id.as_str()));
        }
        paginate(self.db, select, page).await
    }

    pub async fn list_by_plan_ids(
        &self,
        plan_ids: &[String],
    ) -> RepositoryResult<Vec<entitlement::Model>> {
        if plan_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(scoped::<entitlement::Entity>(self.scope)
            .filter(entitlement::Column::PlanId.is_in(plan_ids.iter().map(String::as_str)))
            .all(self.db)
            .await?)
    }

    pub async fn exists_for_plan_feature(
        &self,
        plan_id: &str,
        feature_id: &str,
    ) -> RepositoryResult<bool> {
        let existing = scoped::<entitlement::Entity>(self.scope)
            .filter(entitlement::Column::PlanId.eq(plan_id))
            .filter(entitlement::Column::FeatureId.eq(feature_id))
            .one(self.db)
            .await?;
        Ok(existing.is_some())
    }

    pub async fn update(
        &self,
        id: &str,
        input: UpdateEntitlement,
    ) -> RepositoryResult<entitlement::Model> {
        let mut model = self.get(id).await?.into_active_model();
        if let Some(is_enabled) = input.is_enabled {
            model.is_enabled = Set(is_enabled);
        }
        if input.usage_limit.is_some() {
            model.usage_limit = Set(input.usage_limit);
        }
        if let Some(is_soft_limit) = input.is_soft_limit {
            model.is_soft_limit = Set(is_soft_limit);
        }
        if input.static_value.is_some() {
            model.static_value = Set(input.static_value);
        }
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        soft_delete::<entitlement::Entity, _>(self.db, self.scope, "entitlement", id).await
    }
}
