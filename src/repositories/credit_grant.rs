//! Credit grant repository.

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{get_scoped, now, paginate, require, scoped, soft_delete};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{
    credit_grant::{self, GrantScope},
    plan, subscription,
};
use crate::types::{BillingCadence, ListResult, Pagination, Status, TenantScope, currency, ids};

/// Longest lifetime a granted credit can have.
pub const MAX_EXPIRATION_DAYS: i32 = 36500;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCreditGrant {
    pub name: String,
    pub scope: GrantScope,
    pub plan_id: Option<String>,
    pub subscription_id: Option<String>,
    pub credits: Decimal,
    pub currency: String,
    #[serde(default)]
    pub cadence: Option<BillingCadence>,
    pub expiration_days: Option<i32>,
    pub priority: Option<i32>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CreditGrantQuery {
    pub plan_id: Option<String>,
    pub subscription_id: Option<String>,
}

pub struct CreditGrantRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> CreditGrantRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create(&self, input: NewCreditGrant) -> RepositoryResult<credit_grant::Model> {
        self.scope.validate()?;
        require(&input.name, "name")?;
        let currency = currency::normalize(&input.currency)?;
        if input.credits <= Decimal::ZERO {
            return Err(RepositoryError::validation_error(
                "credits must be greater than zero",
            ));
        }
        if input
            .expiration_days
            .is_some_and(|days| !(1..=MAX_EXPIRATION_DAYS).contains(&days))
        {
            return Err(RepositoryError::validation_error(format!(
                "expiration_days must be between 1 and {MAX_EXPIRATION_DAYS}"
            )));
        }
        match input.scope {
            GrantScope::Plan => {
                let plan_id = input.plan_id.as_deref().ok_or_else(|| {
                    RepositoryError::validation_error("plan_id is required for PLAN grants")
                })?;
                get_scoped::<plan::Entity, _>(self.db, self.scope, "plan", plan_id).await?;
            }
            GrantScope::Subscription => {
                let subscription_id = input.subscription_id.as_deref().ok_or_else(|| {
                    RepositoryError::validation_error(
                        "subscription_id is required for SUBSCRIPTION grants",
                    )
                })?;
                get_scoped::<subscription::Entity, _>(
                    self.db,
                    self.scope,
                    "subscription",
                    subscription_id,
                )
                .await?;
            }
        }

        let now = now();
        let model = credit_grant::ActiveModel {
            id: Set(ids::generate(ids::CREDIT_GRANT)),
            tenant_id: Set(self.scope.tenant_id.clone()),
            environment_id: Set(self.scope.environment_id.clone()),
            status: Set(Status::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(self.scope.actor()),
            updated_by: Set(self.scope.actor()),
            name: Set(input.name),
            grant_scope: Set(input.scope),
            plan_id: Set(input.plan_id),
            subscription_id: Set(input.subscription_id),
            credits: Set(input.credits),
            currency: Set(currency),
            cadence: Set(input.cadence.unwrap_or(BillingCadence::Onetime)),
            expiration_days: Set(input.expiration_days),
            priority: Set(input.priority),
            metadata: Set(input.metadata),
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            credit_grant_id = %model.id,
            credits = %model.credits,
            "Created credit grant"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<credit_grant::Model> {
        get_scoped::<credit_grant::Entity, _>(self.db, self.scope, "credit grant", id).await
    }

    pub async fn list(
        &self,
        query: &CreditGrantQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<credit_grant::Model>> {
        let mut select = scoped::<credit_grant::Entity>(self.scope);
        if let Some(plan_id) = &query.plan_id {
            select = select.filter(credit_grant::Column::PlanId.eq(plan_id.as_str()));
        }
        if let Some(subscription_id) = &query.subscription_id {
            select =
                select.filter(credit_grant::Column::SubscriptionId.eq(subscription_id.as_str()));
        }
        paginate(self.db, select, page).await
    }

    /// Plan grants, highest priority (lowest number) first.
    pub async fn list_for_plan(&self, plan_id: &str) -> RepositoryResult<Vec<credit_grant::Model>> {
        Ok(scoped::<credit_grant::Entity>(self.scope)
            .filter(credit_grant::Column::GrantScope.eq(GrantScope::Plan))
            .filter(credit_grant::Column::PlanId.eq(plan_id))
            .order_by_asc(credit_grant::Column::Priority)
            .order_by_asc(credit_grant::Column::CreatedAt)
            .all(self.db)
            .await?)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        soft_delete::<credit_grant::Entity, _>(self.db, self.scope, "credit grant", id).await
    }
}
