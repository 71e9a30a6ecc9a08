//! Task repository and the import/export task state machine.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, QueryFilter, Set};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{get_scoped, now, paginate, require, scoped};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::task::{self, FileType, TaskStatus, TaskType};
use crate::types::{ListResult, Pagination, Status, TenantScope, ids};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTask {
    pub task_type: TaskType,
    pub entity_type: String,
    pub file_url: String,
    pub file_name: Option<String>,
    pub file_type: FileType,
    pub total_records: Option<i32>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct TaskProgress {
    pub processed_records: i32,
    pub successful_records: i32,
    pub failed_records: i32,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TaskQuery {
    pub task_type: Option<TaskType>,
    pub task_status: Option<TaskStatus>,
}

pub struct TaskRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> TaskRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create(&self, input: NewTask) -> RepositoryResult<task::Model> {
        self.scope.validate()?;
        require(&input.entity_type, "entity_type")?;
        require(&input.file_url, "file_url")?;
        if input.total_records.is_some_and(|total| total < 0) {
            return Err(RepositoryError::validation_error(
                "total_records must not be negative",
            ));
        }

        let now = now();
        let model = task::ActiveModel {
            id: Set(ids::generate(ids::TASK)),
            tenant_id: Set(self.scope.tenant_id.clone()),
            environment_id: Set(self.scope.environment_id.clone()),
            status: Set(Status::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(self.scope.actor()),
            updated_by: Set(self.scope.actor()),
            task_type: Set(input.task_type),
            entity_type: Set(input.entity_type.to_ascii_uppercase()),
            file_url: Set(input.file_url),
            file_name: Set(input.file_name),
            file_type: Set(input.file_type),
            task_status: Set(TaskStatus::Pending),
            total_records: Set(input.total_records),
            processed_records: Set(0),
            successful_records: Set(0),
            failed_records: Set(0),
            error_summary: Set(None),
            metadata: Set(input.metadata),
            started_at: Set(None),
            completed_at: Set(None),
            failed_at: Set(None),
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            task_id = %model.id,
            task_type = ?model.task_type,
            "Created task"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<task::Model> {
        get_scoped::<task::Entity, _>(self.db, self.scope, "task", id).await
    }

    pub async fn list(
        &self,
        query: &TaskQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<task::Model>> {
        let mut select = scoped::<task::Entity>(self.scope);
        if let Some(task_type) = query.task_type {
            select = select.filter(task::Column::TaskType.eq(task_type));
        }
        if let Some(task_status) = query.task_status {
            select = select.filter(task::Column::TaskStatus.eq(task_status));
        }
        paginate(self.db, select, page).await
    }

    /// PENDING -> PROCESSING.
    pub async fn start(&self, id: &str) -> RepositoryResult<task::Model> {
        let task = self.get(id).await?;
        let mut model = self.transition(&task, TaskStatus::Processing)?;
        model.started_at = Set(Some(now()));
        self.save(model).await
    }

    pub async fn update_progress(
        &self,
        id: &str,
        progress: TaskProgress,
    ) -> RepositoryResult<task::Model> {
        let task = self.get(id).await?;
        if task.task_status != TaskStatus::Processing {
            return Err(RepositoryError::invalid_operation(format!(
                "task {id} is not processing"
            )));
        }
        let TaskProgress {
            processed_records,
            successful_records,
            failed_records,
        } = progress;
        if processed_records < 0 || successful_records < 0 || failed_records < 0 {
            return Err(RepositoryError::validation_error(
                "record counters must not be negative",
            ));
        }
        if successful_records + failed_records > processed_records {
            return Err(RepositoryError::validation_error(
                "successful and failed records exceed processed records",
            ));
        }
        if let Some(total) = task.total_records
            && processed_records > total
        {
            return Err(RepositoryError::validation_error(format!(
                "processed records {processed_records} exceed total {total}"
            )));
        }

        let mut model: task::ActiveModel = task.into();
        model.processed_records = Set(processed_records);
        model.successful_records = Set(successful_records);
        model.failed_records = Set(failed_records);
        self.save(model).await
    }

    /// PROCESSING -> COMPLETED.
    pub async fn complete(&self, id: &str) -> RepositoryResult<task::Model> {
        let task = self.get(id).await?;
        let mut model = self.transition(&task, TaskStatus::Completed)?;
        model.completed_at = Set(Some(now()));
        let model = self.save(model).await?;
        tracing::info!(
            task_id = %model.id,
            processed = model.processed_records,
            failed = model.failed_records,
            "Task completed"
        );
        Ok(model)
    }

    /// PENDING or PROCESSING -> FAILED.
    pub async fn fail(&self, id: &str, error_summary: String) -> RepositoryResult<task::Model> {
        let task = self.get(id).await?;
        let mut model = self.transition(&task, TaskStatus::Failed)?;
        model.failed_at = Set(Some(now()));
        model.error_summary = Set(Some(error_summary));
        let model = self.save(model).await?;
        tracing::warn!(task_id = %model.id, "Task failed");
        Ok(model)
    }

    fn transition(
        &self,
        task: &task::Model,
        next: TaskStatus,
    ) -> RepositoryResult<task::ActiveModel> {
        if !task.task_status.can_transition_to(next) {
            return Err(RepositoryError::invalid_operation(format!(
                "task {} cannot move from {:?} to {:?}",
                task.id, task.task_status, next
            )));
        }
        let mut model: task::ActiveModel = task.clone().into();
        model.task_status = Set(next);
        Ok(model)
    }

    async fn save(&self, mut model: task::ActiveModel) -> RepositoryResult<task::Model> {
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }
}
