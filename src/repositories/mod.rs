//! # Repositories
//!
//! Typed data access, one repository per aggregate. Every repository borrows
//! a connection `C: ConnectionTrait`, so the same code runs against the pool
//! or inside an open transaction, plus the [`TenantScope`] of the caller.
//! Reads never see rows of another tenant or environment, nor soft deleted
//! rows.

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};

use crate::error::{RepositoryError, RepositoryResult};
use crate::types::{ListResult, Pagination, Status, TenantScope};

pub mod credit_grant;
pub mod customer;
pub mod entitlement;
pub mod environment;
pub mod feature;
pub mod invoice;
pub mod meter;
pub mod payment;
pub mod plan;
pub mod price;
pub mod secret;
pub mod subscription;
pub mod subscription_schedule;
pub mod task;
pub mod wallet;

pub use credit_grant::CreditGrantRepository;
pub use customer::CustomerRepository;
pub use entitlement::EntitlementRepository;
pub use environment::EnvironmentRepository;
pub use feature::FeatureRepository;
pub use invoice::InvoiceRepository;
pub use meter::MeterRepository;
pub use payment::PaymentRepository;
pub use plan::PlanRepository;
pub use price::PriceRepository;
pub use secret::SecretRepository;
pub use subscription::SubscriptionRepository;
pub use subscription_schedule::SubscriptionScheduleRepository;
pub use task::TaskRepository;
pub use wallet::WalletRepository;

/// Current time as stored in `timestamptz` columns.
pub fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

/// Entities carrying the tenancy, lifecycle and audit columns.
pub trait ScopedEntity: EntityTrait {
    fn id_column() -> Self::Column;
    fn tenant_column() -> Self::Column;
    fn environment_column() -> Self::Column;
    fn status_column() -> Self::Column;
    fn created_at_column() -> Self::Column;
    fn updated_at_column() -> Self::Column;
    fn updated_by_column() -> Self::Column;
}

macro_rules! scoped_entities {
    ($($module:ident),+ $(,)?) => {
        $(
            impl ScopedEntity for crate::models::$module::Entity {
                fn id_column() -> Self::Column {
                    crate::models::$module::Column::Id
                }
                fn tenant_column() -> Self::Column {
                    crate::models::$module::Column::TenantId
                }
                fn environment_column() -> Self::Column {
                    crate::models::$module::Column::EnvironmentId
                }
                fn status_column() -> Self::Column {
                    crate::models::$module::Column::Status
                }
                fn created_at_column() -> Self::Column {
                    crate::models::$module::Column::CreatedAt
                }
                fn updated_at_column() -> Self::Column {
                    crate::models::$module::Column::UpdatedAt
                }
                fn updated_by_column() -> Self::Column {
                    crate::models::$module::Column::UpdatedBy
                }
            }
        )+
    };
}

scoped_entities!(
    credit_grant,
    customer,
    entitlement,
    feature,
    invoice,
    invoice_line_item,
    meter,
    payment,
    payment_attempt,
    plan,
    price,
    secret,
    subscription,
    subscription_line_item,
    subscription_schedule,
    subscription_schedule_phase,
    task,
    wallet,
    wallet_transaction,
);

/// Select over the live rows of `scope`.
pub fn scoped<E: ScopedEntity>(scope: &TenantScope) -> Select<E> {
    E::find()
        .filter(E::tenant_column().eq(scope.tenant_id.as_str()))
        .filter(E::environment_column().eq(scope.environment_id.as_str()))
        .filter(E::status_column().ne(Status::Deleted))
}

/// Fetches one live row by id.
pub async fn get_scoped<E, C>(
    db: &C,
    scope: &TenantScope,
    entity: &str,
    id: &str,
) -> RepositoryResult<E::Model>
where
    E: ScopedEntity,
    C: ConnectionTrait,
{
    scoped::<E>(scope)
        .filter(E::id_column().eq(id))
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found(entity, id))
}

/// Counts the rows matched by `select`, then returns one page of them,
/// newest first.
pub async fn paginate<E, C>(
    db: &C,
    select: Select<E>,
    page: &Pagination,
) -> RepositoryResult<ListResult<E::Model>>
where
    E: ScopedEntity,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let total = select.clone().count(db).await?;
    let items = select
        .order_by_desc(E::created_at_column())
        .order_by_desc(E::id_column())
        .offset(page.offset())
        .limit(page.limit())
        .all(db)
        .await?;

    Ok(ListResult {
        items,
        pagination: page.info(total),
    })
}

/// Returns the single row matched by `select`. No match is `NotFound`, more
/// than one is `NotSingular`.
pub async fn find_one<E, C>(db: &C, select: Select<E>, what: &str) -> RepositoryResult<E::Model>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let mut rows = select.limit(2).all(db).await?;
    match rows.len() {
        0 => Err(RepositoryError::NotFound(format!("{what} not found"))),
        1 => Ok(rows.remove(0)),
        _ => Err(RepositoryError::NotSingular(format!(
            "more than one {what} matched"
        ))),
    }
}

/// Marks a live row as deleted.
pub async fn soft_delete<E, C>(
    db: &C,
    scope: &TenantScope,
    entity: &str,
    id: &str,
) -> RepositoryResult<()>
where
    E: ScopedEntity,
    C: ConnectionTrait,
{
    let result = E::update_many()
        .col_expr(E::status_column(), Expr::value(Status::Deleted))
        .col_expr(E::updated_at_column(), Expr::value(now()))
        .col_expr(E::updated_by_column(), Expr::value(scope.actor()))
        .filter(E::id_column().eq(id))
        .filter(E::tenant_column().eq(scope.tenant_id.as_str()))
        .filter(E::environment_column().eq(scope.environment_id.as_str()))
        .filter(E::status_column().ne(Status::Deleted))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(RepositoryError::not_found(entity, id));
    }
    tracing::debug!(
        tenant_id = %scope.tenant_id,
        entity,
        id,
        "Soft deleted record"
    );
    Ok(())
}

/// Rejects blank required strings.
pub fn require(value: &str, field: &str) -> RepositoryResult<()> {
    if value.trim().is_empty() {
        return Err(RepositoryError::validation_error(format!(
            "{field} is required"
        )));
    }
    Ok(())
}
