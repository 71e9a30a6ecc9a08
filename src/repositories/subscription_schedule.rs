//! Subscription schedule repository, including phases.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{get_scoped, now, scoped};
use crate::error::RepositoryResult;
use crate::models::{subscription_schedule, subscription_schedule_phase};
use crate::types::TenantScope;

pub struct SubscriptionScheduleRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> SubscriptionScheduleRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create_with_phases(
        &self,
        schedule: subscription_schedule::Model,
        phases: Vec<subscription_schedule_phase::Model>,
    ) -> RepositoryResult<subscription_schedule::Model> {
        self.scope.validate()?;
        let schedule = subscription_schedule::ActiveModel::from(schedule)
            .reset_all()
            .insert(self.db)
            .await?;

        if !phases.is_empty() {
            subscription_schedule_phase::Entity::insert_many(
                phases
                    .into_iter()
                    .map(|phase| subscription_schedule_phase::ActiveModel::from(phase).reset_all()),
            )
            .exec_without_returning(self.db)
            .await?;
        }

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            schedule_id = %schedule.id,
            subscription_id = %schedule.subscription_id,
            "Created subscription schedule"
        );
        Ok(schedule)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<subscription_schedule::Model> {
        get_scoped::<subscription_schedule::Entity, _>(
            self.db,
            self.scope,
            "subscription schedule",
            id,
        )
        .await
    }

    pub async fn list_for_subscription(
        &self,
        subscription_id: &str,
    ) -> RepositoryResult<Vec<subscription_schedule::Model>> {
        Ok(scoped::<subscription_schedule::Entity>(self.scope)
            .filter(subscription_schedule::Column::SubscriptionId.eq(subscription_id))
            .order_by_desc(subscription_schedule::Column::CreatedAt)
            .all(self.db)
            .await?)
    }

    /// Phases ordered by `phase_index`.
    pub async fn phases(
        &self,
        schedule_id: &str,
    ) -> RepositoryResult<Vec<subscription_schedule_phase::Model>> {
        Ok(scoped::<subscription_schedule_phase::Entity>(self.scope)
            .filter(subscription_schedule_phase::Column::ScheduleId.eq(schedule_id))
            .order_by_asc(subscription_schedule_phase::Column::PhaseIndex)
            .all(self.db)
            .await?)
    }

    pub async fn update(
        &self,
        mut model: subscription_schedule::ActiveModel,
    ) -> RepositoryResult<subscription_schedule::Model> {
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }
}
