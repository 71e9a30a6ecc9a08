//! Payment repository: payments and their attempts.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{get_scoped, now, paginate, scoped};
use crate::error::RepositoryResult;
use crate::models::payment::{self, PaymentDestinationType};
use crate::models::payment_attempt;
use crate::types::{ListResult, Pagination, PaymentStatus, TenantScope};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PaymentQuery {
    pub destination_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

pub struct PaymentRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> PaymentRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn insert(&self, model: payment::Model) -> RepositoryResult<payment::Model> {
        self.scope.validate()?;
        let model = payment::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?;
        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            payment_id = %model.id,
            destination_id = %model.destination_id,
            amount = %model.amount,
            "Created payment"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<payment::Model> {
        get_scoped::<payment::Entity, _>(self.db, self.scope, "payment", id).await
    }

    pub async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> RepositoryResult<Option<payment::Model>> {
        Ok(scoped::<payment::Entity>(self.scope)
            .filter(payment::Column::IdempotencyKey.eq(key))
            .one(self.db)
            .await?)
    }

    pub async fn list(
        &self,
        query: &PaymentQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<payment::Model>> {
        let mut select = scoped::<payment::Entity>(self.scope);
        if let Some(destination_id) = &query.destination_id {
            select = select.filter(payment::Column::DestinationId.eq(destination_id.as_str()));
        }
        if let Some(status) = query.payment_status {
            select = select.filter(payment::Column::PaymentStatus.eq(status));
        }
        paginate(self.db, select, page).await
    }

    /// Succeeded payments applied to an invoice.
    pub async fn succeeded_for_invoice(
        &self,
        invoice_id: &str,
    ) -> RepositoryResult<Vec<payment::Model>> {
        Ok(scoped::<payment::Entity>(self.scope)
            .filter(payment::Column::DestinationType.eq(PaymentDestinationType::Invoice))
            .filter(payment::Column::DestinationId.eq(invoice_id))
            .filter(payment::Column::PaymentStatus.eq(PaymentStatus::Succeeded))
            .all(self.db)
            .await?)
    }

    pub async fn update(&self, mut model: payment::ActiveModel) -> RepositoryResult<payment::Model> {
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    pub async fn insert_attempt(
        &self,
        model: payment_attempt::Model,
    ) -> RepositoryResult<payment_attempt::Model> {
        Ok(payment_attempt::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?)
    }

    /// Number the next attempt of a payment will get.
    pub async fn next_attempt_number(&self, payment_id: &str) -> RepositoryResult<i32> {
        let last = payment_attempt::Entity::find()
            .filter(payment_attempt::Column::PaymentId.eq(payment_id))
            .order_by_desc(payment_attempt::Column::AttemptNumber)
            .limit(1)
            .one(self.db)
            .await?;
        Ok(last.map_or(1, |attempt| attempt.attempt_number + 1))
    }

    pub async fn attempts(&self, payment_id: &str) -> RepositoryResult<Vec<payment_attempt::Model>> {
        Ok(scoped::<payment_attempt::Entity>(self.scope)
            .filter(payment_attempt::Column::PaymentId.eq(payment_id))
            .order_by_asc(payment_attempt::Column::AttemptNumber)
            .all(self.db)
            .await?)
    }
}
