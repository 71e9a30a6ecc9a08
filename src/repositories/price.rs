//! Price repository. Shape rules live in
//! [`crate::services::pricing::validate_price`].

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, IntoActiveModel, QueryFilter, Set};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{get_scoped, now, paginate, scoped, soft_delete};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{
    meter, plan,
    price::{self, PriceTier, TransformQuantity},
};
use crate::services::pricing::validate_price;
use crate::types::{
    BillingCadence, BillingModel, BillingPeriod, InvoiceCadence, ListResult, Pagination,
    PriceType, Status, TenantScope, TierMode, currency, ids,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPrice {
    pub plan_id: String,
    #[serde(default)]
    pub amount: Decimal,
    pub currency: String,
    pub price_type: PriceType,
    pub billing_period: BillingPeriod,
    #[serde(default = "default_period_count")]
    pub billing_period_count: i32,
    #[serde(default)]
    pub billing_model: BillingModel,
    #[serde(default)]
    pub billing_cadence: BillingCadence,
    #[serde(default)]
    pub invoice_cadence: InvoiceCadence,
    pub meter_id: Option<String>,
    pub tier_mode: Option<TierMode>,
    pub tiers: Option<Vec<PriceTier>>,
    pub transform_quantity: Option<TransformQuantity>,
    pub lookup_key: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

fn default_period_count() -> i32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdatePrice {
    pub lookup_key: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PriceQuery {
    pub plan_id: Option<String>,
    pub currency: Option<String>,
}

pub struct PriceRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

fn display_amount(amount: Decimal, currency: &str) -> String {
    format!("{} {}", currency::round(amount, currency), currency.to_ascii_uppercase())
}

impl<'a, C: ConnectionTrait> PriceRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create(&self, input: NewPrice) -> RepositoryResult<price::Model> {
        self.scope.validate()?;
        let currency = currency::normalize(&input.currency)?;
        get_scoped::<plan::Entity, _>(self.db, self.scope, "plan", &input.plan_id).await?;
        if let Some(meter_id) = &input.meter_id {
            get_scoped::<meter::Entity, _>(self.db, self.scope, "meter", meter_id).await?;
        }

        let tiers = input
            .tiers
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| RepositoryError::validation_error(format!("invalid tiers: {e}")))?;
        let transform_quantity = input
            .transform_quantity
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| {
                RepositoryError::validation_error(format!("invalid transform_quantity: {e}"))
            })?;

        let now = now();
        let model = price::Model {
            id: ids::generate(ids::PRICE),
            tenant_id: self.scope.tenant_id.clone(),
            environment_id: self.scope.environment_id.clone(),
            status: Status::Published,
            created_at: now,
            updated_at: now,
            created_by: self.scope.actor(),
            updated_by: self.scope.actor(),
            plan_id: input.plan_id,
            amount: input.amount,
            display_amount: display_amount(input.amount, &currency),
            currency,
            price_type: input.price_type,
            billing_period: input.billing_period,
            billing_period_count: input.billing_period_count,
            billing_model: input.billing_model,
            billing_cadence: input.billing_cadence,
            invoice_cadence: input.invoice_cadence,
            meter_id: input.meter_id,
            tier_mode: input.tier_mode,
            tiers,
            transform_quantity,
            lookup_key: input.lookup_key.filter(|k| !k.trim().is_empty()),
            description: input.description,
            metadata: input.metadata,
        };
        validate_price(&model)?;

        let model = price::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?;

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            price_id = %model.id,
            plan_id = %model.plan_id,
            billing_model = ?model.billing_model,
            "Created price"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<price::Model> {
        get_scoped::<price::Entity, _>(self.db, self.scope, "price", id).await
    }

    pub async fn list(
        &self,
        query: &PriceQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<price::Model>> {
        let mut select = scoped::<price::Entity>(self.scope);
        if let Some(plan_id) = &query.plan_id {
            select = select.filter(price::Column::PlanId.eq(plan_id.as_str()));
        }
        if let Some(code) = &query.currency {
            select = select.filter(price::Column::Currency.eq(currency::normalize(code)?));
        }
        paginate(self.db, select, page).await
    }

    /// Every live price of a plan.
    pub async fn list_by_plan(&self, plan_id: &str) -> RepositoryResult<Vec<price::Model>> {
        Ok(scoped::<price::Entity>(self.scope)
            .filter(price::Column::PlanId.eq(plan_id))
            .all(self.db)
            .await?)
    }

    pub async fn list_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<price::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(scoped::<price::Entity>(self.scope)
            .filter(price::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db)
            .await?)
    }

    pub async fn update(&self, id: &str, input: UpdatePrice) -> RepositoryResult<price::Model> {
        let mut model = self.get(id).await?.into_active_model();
        if input.lookup_key.is_some() {
            model.lookup_key = Set(input.lookup_key);
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
        soft_delete::<price::Entity, _>(self.db, self.scope, "price", id).await
    }
}
