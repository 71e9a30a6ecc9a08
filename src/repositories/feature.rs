//! Feature repository.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, IntoActiveModel, QueryFilter, Set};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{find_one, get_scoped, now, paginate, require, scoped, soft_delete};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{feature::{self, FeatureType}, meter};
use crate::types::{ListResult, Pagination, Status, TenantScope, ids};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewFeature {
    pub lookup_key: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub feature_type: FeatureType,
    pub meter_id: Option<String>,
    pub unit_singular: Option<String>,
    pub unit_plural: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateFeature {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_singular: Option<String>,
    pub unit_plural: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct FeatureQuery {
    pub lookup_key: Option<String>,
    pub feature_type: Option<FeatureType>,
}

pub struct FeatureRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> FeatureRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create(&self, input: NewFeature) -> RepositoryResult<feature::Model> {
        self.scope.validate()?;
        require(&input.lookup_key, "lookup_key")?;
        require(&input.name, "name")?;

        match (input.feature_type, &input.meter_id) {
            (FeatureType::Metered, None) => {
                return Err(RepositoryError::validation_error(
                    "meter_id is required for metered features",
                ));
            }
            (FeatureType::Metered, Some(meter_id)) => {
                get_scoped::<meter::Entity, _>(self.db, self.scope, "meter", meter_id).await?;
            }
            (_, Some(_)) => {
                return Err(RepositoryError::validation_error(
                    "meter_id is only allowed for metered features",
                ));
            }
            (_, None) => {}
        }

        let now = now();
        let model = feature::ActiveModel {
            id: Set(ids::generate(ids::FEATURE)),
            tenant_id: Set(self.scope.tenant_id.clone()),
            environment_id: Set(self.scope.environment_id.clone()),
            status: Set(Status::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(self.scope.actor()),
            updated_by: Set(self.scope.actor()),
            lookup_key: Set(input.lookup_key),
            name: Set(input.name),
            description: Set(input.description),
            feature_type: Set(input.feature_type),
            meter_id: Set(input.meter_id),
            unit_singular: Set(input.unit_singular),
            unit_plural: Set(input.unit_plural),
            metadata: Set(input.metadata),
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            feature_id = %model.id,
            lookup_key = %model.lookup_key,
            "Created feature"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<feature::Model> {
        get_scoped::<feature::Entity, _>(self.db, self.scope, "feature", id).await
    }

    pub async fn get_by_lookup_key(&self, lookup_key: &str) -> RepositoryResult<feature::Model> {
        let select = scoped::<feature::Entity>(self.scope)
            .filter(feature::Column::LookupKey.eq(lookup_key));
        find_one(self.db, select, &format!("feature with lookup_key {lookup_key}")).await
    }

    pub async fn list(
        &self,
        query: &FeatureQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<feature::Model>> {
        let mut select = scoped::<feature::Entity>(self.scope);
        if let Some(lookup_key) = &query.lookup_key {
            select = select.filter(feature::Column::LookupKey.eq(lookup_key.as_str()));
        }
        if let Some(feature_type) = query.feature_type {
            select = select.filter(feature::Column::FeatureType.eq(feature_type));
        }
        paginate(self.db, select, page).await
    }

    pub async fn list_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<feature::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(scoped::<feature::Entity>(self.scope)
            .filter(feature::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db)
            .await?)
    }

    pub async fn update(&self, id: &str, input: UpdateFeature) -> RepositoryResult<feature::Model> {
        let mut model = self.get(id).await?.into_active_model();
        if let Some(name) = input.name {
            require(&name, "name")?;
            model.name = Set(name);
        }
        if input.description.is_some() {
            model.description = Set(input.description);
        }
        if input.unit_singular.is_some() {
            model.unit_singular = Set(input.unit_singular);
        }
        if input.unit_plural.is_some() {
            model.unit_plural = Set(input.unit_plural);
        }
        if input.metadata.is_some() {
            model.metadata = Set(input.metadata);
        }
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        soft_delete::<feature::Entity, _>(self.db, self.scope, "feature", id).await
    }
}
