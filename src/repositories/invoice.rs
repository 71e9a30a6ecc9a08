//! Invoice repository: invoices, their line items, and the invoice number
//! and billing sequence counters.

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{get_scoped, now, paginate, scoped};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::invoice::{self, InvoiceStatus};
use crate::models::{billing_sequence, invoice_line_item, invoice_sequence};
use crate::types::{ListResult, Pagination, PaymentStatus, TenantScope};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct InvoiceQuery {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    /// Comma separated invoice statuses, e.g. `DRAFT,FINALIZED`
    pub invoice_status: Option<String>,
    /// Comma separated payment statuses
    pub payment_status: Option<String>,
}

fn parse_list<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Vec<T> {
    raw.map(|raw| {
        raw.split(',')
            .filter_map(|s| {
                serde_json::from_value(serde_json::Value::String(s.trim().to_string())).ok()
            })
            .collect()
    })
    .unwrap_or_default()
}

impl InvoiceQuery {
    pub fn invoice_statuses(&self) -> Vec<InvoiceStatus> {
        parse_list(self.invoice_status.as_deref())
    }

    pub fn payment_statuses(&self) -> Vec<PaymentStatus> {
        parse_list(self.payment_status.as_deref())
    }
}

pub struct InvoiceRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> InvoiceRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    /// Inserts the invoice and bulk inserts its line items.
    pub async fn create_with_line_items(
        &self,
        model: invoice::Model,
        line_items: Vec<invoice_line_item::Model>,
    ) -> RepositoryResult<invoice::Model> {
        self.scope.validate()?;
        let invoice = invoice::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?;

        if !line_items.is_empty() {
            let count = line_items.len();
            invoice_line_item::Entity::insert_many(
                line_items
                    .into_iter()
                    .map(|item| invoice_line_item::ActiveModel::from(item).reset_all()),
            )
            .exec_without_returning(self.db)
            .await?;
            tracing::debug!(invoice_id = %invoice.id, count, "Inserted invoice line items");
        }

        Ok(invoice)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<invoice::Model> {
        get_scoped::<invoice::Entity, _>(self.db, self.scope, "invoice", id).await
    }

    pub async fn line_items(
        &self,
        invoice_id: &str,
    ) -> RepositoryResult<Vec<invoice_line_item::Model>> {
        Ok(scoped::<invoice_line_item::Entity>(self.scope)
            .filter(invoice_line_item::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(invoice_line_item::Column::CreatedAt)
            .order_by_asc(invoice_line_item::Column::Id)
            .all(self.db)
            .await?)
    }

    pub async fn line_items_for_invoices(
        &self,
        invoice_ids: &[String],
    ) -> RepositoryResult<Vec<invoice_line_item::Model>> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(scoped::<invoice_line_item::Entity>(self.scope)
            .filter(invoice_line_item::Column::InvoiceId.is_in(invoice_ids.iter().map(String::as_str)))
            .all(self.db)
            .await?)
    }

    pub async fn list(
        &self,
        query: &InvoiceQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<invoice::Model>> {
        let mut select = scoped::<invoice::Entity>(self.scope);
        if let Some(customer_id) = &query.customer_id {
            select = select.filter(invoice::Column::CustomerId.eq(customer_id.as_str()));
        }
        if let Some(subscription_id) = &query.subscription_id {
            select = select.filter(invoice::Column::SubscriptionId.eq(subscription_id.as_str()));
        }
        let invoice_statuses = query.invoice_statuses();
        if !invoice_statuses.is_empty() {
            select = select.filter(invoice::Column::InvoiceStatus.is_in(invoice_statuses));
        }
        let payment_statuses = query.payment_statuses();
        if !payment_statuses.is_empty() {
            select = select.filter(invoice::Column::PaymentStatus.is_in(payment_statuses));
        }
        paginate(self.db, select, page).await
    }

    /// Live, non-voided invoices of a customer, optionally limited to one
    /// currency.
    pub async fn list_open_for_customer(
        &self,
        customer_id: &str,
        currency: Option<&str>,
    ) -> RepositoryResult<Vec<invoice::Model>> {
        let mut select = scoped::<invoice::Entity>(self.scope)
            .filter(invoice::Column::CustomerId.eq(customer_id))
            .filter(invoice::Column::InvoiceStatus.ne(InvoiceStatus::Voided));
        if let Some(currency) = currency {
            select = select.filter(invoice::Column::Currency.eq(currency));
        }
        Ok(select.all(self.db).await?)
    }

    /// Voided invoices do not hold their key.
    pub async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> RepositoryResult<Option<invoice::Model>> {
        Ok(scoped::<invoice::Entity>(self.scope)
            .filter(invoice::Column::IdempotencyKey.eq(key))
            .filter(invoice::Column::InvoiceStatus.ne(InvoiceStatus::Voided))
            .one(self.db)
            .await?)
    }

    /// A live, non-voided invoice already covering this subscription period.
    pub async fn find_for_period(
        &self,
        subscription_id: &str,
        period_start: DateTimeWithTimeZone,
        period_end: DateTimeWithTimeZone,
    ) -> RepositoryResult<Option<invoice::Model>> {
        Ok(scoped::<invoice::Entity>(self.scope)
            .filter(invoice::Column::SubscriptionId.eq(subscription_id))
            .filter(invoice::Column::PeriodStart.eq(period_start))
            .filter(invoice::Column::PeriodEnd.eq(period_end))
            .filter(invoice::Column::InvoiceStatus.ne(InvoiceStatus::Voided))
            .one(self.db)
            .await?)
    }

    /// Writes the changed fields of `model`, stamping audit columns and
    /// bumping `version`.
    pub async fn update(
        &self,
        mut model: invoice::ActiveModel,
        current_version: i32,
    ) -> RepositoryResult<invoice::Model> {
        model.version = Set(current_version + 1);
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    /// Atomically increments the monthly counter of the scope and returns
    /// the new value, starting at 1.
    pub async fn next_invoice_sequence(&self, at: DateTime<Utc>) -> RepositoryResult<i64> {
        let year_month = at.format("%Y%m").to_string();
        let now = now();
        let row = invoice_sequence::ActiveModel {
            tenant_id: Set(self.scope.tenant_id.clone()),
            environment_id: Set(self.scope.environment_id.clone()),
            year_month: Set(year_month.clone()),
            last_value: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };

        invoice_sequence::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    invoice_sequence::Column::TenantId,
                    invoice_sequence::Column::EnvironmentId,
                    invoice_sequence::Column::YearMonth,
                ])
                .value(
                    invoice_sequence::Column::LastValue,
                    Expr::col((
                        invoice_sequence::Entity,
                        invoice_sequence::Column::LastValue,
                    ))
                    .add(1),
                )
                .value(invoice_sequence::Column::UpdatedAt, Expr::value(now))
                .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;

        let sequence = invoice_sequence::Entity::find_by_id((
            self.scope.tenant_id.clone(),
            self.scope.environment_id.clone(),
            year_month.clone(),
        ))
        .one(self.db)
        .await?
        .ok_or_else(|| RepositoryError::not_found("invoice sequence", &year_month))?;

        Ok(sequence.last_value)
    }

    /// Atomically increments the per-subscription billing sequence.
    pub async fn next_billing_sequence(&self, subscription_id: &str) -> RepositoryResult<i32> {
        let now = now();
        let row = billing_sequence::ActiveModel {
            tenant_id: Set(self.scope.tenant_id.clone()),
            subscription_id: Set(subscription_id.to_string()),
            last_sequence: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };

        billing_sequence::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    billing_sequence::Column::TenantId,
                    billing_sequence::Column::SubscriptionId,
                ])
                .value(
                    billing_sequence::Column::LastSequence,
                    Expr::col((
                        billing_sequence::Entity,
                        billing_sequence::Column::LastSequence,
                    ))
                    .add(1),
                )
                .value(billing_sequence::Column::UpdatedAt, Expr::value(now))
                .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;

        let sequence = billing_sequence::Entity::find_by_id((
            self.scope.tenant_id.clone(),
            subscription_id.to_string(),
        ))
        .one(self.db)
        .await?
        .ok_or_else(|| RepositoryError::not_found("billing sequence", subscription_id))?;

        Ok(sequence.last_sequence)
    }
}
