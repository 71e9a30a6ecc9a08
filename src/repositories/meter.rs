//! Meter repository.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, IntoActiveModel, QueryFilter, Set};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{get_scoped, now, paginate, require, scoped, soft_delete};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::meter::{self, Aggregation, MeterFilter, ResetUsage};
use crate::types::{ListResult, Pagination, Status, TenantScope, ids};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewMeter {
    pub event_name: String,
    pub name: String,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub filters: Vec<MeterFilter>,
    #[serde(default)]
    pub reset_usage: ResetUsage,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateMeter {
    pub name: Option<String>,
    pub filters: Option<Vec<MeterFilter>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MeterQuery {
    pub event_name: Option<String>,
}

pub struct MeterRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

fn validate_aggregation(aggregation: &Aggregation) -> RepositoryResult<()> {
    let has_field = aggregation
        .field
        .as_deref()
        .is_some_and(|f| !f.trim().is_empty());
    if aggregation.aggregation_type.requires_field() && !has_field {
        return Err(RepositoryError::validation_error(format!(
            "aggregation {:?} requires a field",
            aggregation.aggregation_type
        )));
    }
    Ok(())
}

fn validate_filters(filters: &[MeterFilter]) -> RepositoryResult<()> {
    for filter in filters {
        require(&filter.key, "filter key")?;
        if filter.values.is_empty() {
            return Err(RepositoryError::validation_error(format!(
                "filter '{}' needs at least one value",
                filter.key
            )));
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> RepositoryResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::validation_error(format!("unserializable value: {e}")))
}

impl<'a, C: ConnectionTrait> MeterRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create(&self, input: NewMeter) -> RepositoryResult<meter::Model> {
        self.scope.validate()?;
        require(&input.event_name, "event_name")?;
        require(&input.name, "name")?;
        validate_aggregation(&input.aggregation)?;
        validate_filters(&input.filters)?;

        let now = now();
        let model = meter::ActiveModel {
            id: Set(ids::generate(ids::METER)),
            tenant_id: Set(self.scope.tenant_id.clone()),
            environment_id: Set(self.scope.environment_id.clone()),
            status: Set(Status::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(self.scope.actor()),
            updated_by: Set(self.scope.actor()),
            event_name: Set(input.event_name),
            name: Set(input.name),
            aggregation: Set(to_json(&input.aggregation)?),
            filters: Set(Some(to_json(&input.filters)?)),
            reset_usage: Set(input.reset_usage),
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            meter_id = %model.id,
            event_name = %model.event_name,
            "Created meter"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<meter::Model> {
        get_scoped::<meter::Entity, _>(self.db, self.scope, "meter", id).await
    }

    pub async fn list(
        &self,
        query: &MeterQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<meter::Model>> {
        let mut select = scoped::<meter::Entity>(self.scope);
        if let Some(event_name) = &query.event_name {
            select = select.filter(meter::Column::EventName.eq(event_name.as_str()));
        }
        paginate(self.db, select, page).await
    }

    pub async fn update(&self, id: &str, input: UpdateMeter) -> RepositoryResult<meter::Model> {
        let mut model = self.get(id).await?.into_active_model();
        if let Some(name) = input.name {
            require(&name, "name")?;
            model.name = Set(name);
        }
        if let Some(filters) = input.filters {
            validate_filters(&filters)?;
            model.filters = Set(Some(to_json(&filters)?));
        }
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        soft_delete::<meter::Entity, _>(self.db, self.scope, "meter", id).await
    }
}
