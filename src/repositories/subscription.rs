//! Subscription repository, including the subscription's line items.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{get_scoped, now, paginate, scoped};
use crate::error::RepositoryResult;
use crate::models::subscription::{self, SubscriptionStatus};
use crate::models::subscription_line_item;
use crate::types::{ListResult, Pagination, TenantScope};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SubscriptionQuery {
    pub customer_id: Option<String>,
    pub plan_id: Option<String>,
    /// Comma separated subscription statuses
    pub subscription_status: Option<String>,
}

impl SubscriptionQuery {
    pub fn statuses(&self) -> Vec<SubscriptionStatus> {
        self.subscription_status
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|s| {
                        serde_json::from_value(serde_json::Value::String(s.trim().to_string()))
                            .ok()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct SubscriptionRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> SubscriptionRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    /// Inserts the subscription and its line items. Callers wrap this in a
    /// transaction.
    pub async fn create_with_line_items(
        &self,
        model: subscription::Model,
        line_items: Vec<subscription_line_item::Model>,
    ) -> RepositoryResult<(subscription::Model, Vec<subscription_line_item::Model>)> {
        self.scope.validate()?;
        let subscription = subscription::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?;

        if !line_items.is_empty() {
            let count = line_items.len();
            subscription_line_item::Entity::insert_many(
                line_items
                    .iter()
                    .cloned()
                    .map(|item| subscription_line_item::ActiveModel::from(item).reset_all()),
            )
            .exec_without_returning(self.db)
            .await?;
            tracing::debug!(
                subscription_id = %subscription.id,
                count,
                "Inserted subscription line items"
            );
        }

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            subscription_id = %subscription.id,
            customer_id = %subscription.customer_id,
            plan_id = %subscription.plan_id,
            "Created subscription"
        );
        Ok((subscription, line_items))
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<subscription::Model> {
        get_scoped::<subscription::Entity, _>(self.db, self.scope, "subscription", id).await
    }

    pub async fn list(
        &self,
        query: &SubscriptionQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<subscription::Model>> {
        let mut select = scoped::<subscription::Entity>(self.scope);
        if let Some(customer_id) = &query.customer_id {
            select = select.filter(subscription::Column::CustomerId.eq(customer_id.as_str()));
        }
        if let Some(plan_id) = &query.plan_id {
            select = select.filter(subscription::Column::PlanId.eq(plan_id.as_str()));
        }
        let statuses = query.statuses();
        if !statuses.is_empty() {
            select = select.filter(subscription::Column::SubscriptionStatus.is_in(statuses));
        }
        paginate(self.db, select, page).await
    }

    /// Live subscriptions of a customer in any of `statuses`.
    pub async fn list_for_customer(
        &self,
        customer_id: &str,
        statuses: &[SubscriptionStatus],
    ) -> RepositoryResult<Vec<subscription::Model>> {
        Ok(scoped::<subscription::Entity>(self.scope)
            .filter(subscription::Column::CustomerId.eq(customer_id))
            .filter(subscription::Column::SubscriptionStatus.is_in(statuses.iter().copied()))
            .order_by_asc(subscription::Column::CreatedAt)
            .all(self.db)
            .await?)
    }

    pub async fn line_items(
        &self,
        subscription_id: &str,
    ) -> RepositoryResult<Vec<subscription_line_item::Model>> {
        Ok(scoped::<subscription_line_item::Entity>(self.scope)
            .filter(subscription_line_item::Column::SubscriptionId.eq(subscription_id))
            .order_by_asc(subscription_line_item::Column::CreatedAt)
            .order_by_asc(subscription_line_item::Column::Id)
            .all(self.db)
            .await?)
    }

    /// Writes the changed fields of `model`, stamping audit columns and
    /// bumping `version`.
    pub async fn update(
        &self,
        mut model: subscription::ActiveModel,
        current_version: i32,
    ) -> RepositoryResult<subscription::Model> {
        model.version = sea_orm::Set(current_version + 1);
        model.updated_at = sea_orm::Set(now());
        model.updated_by = sea_orm::Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }
}
