use crate::core::models::{
    ActionFilter, ActionStatus, BULK_UPDATE, BulkAction, CounterDelta, NewBulkAction, Page,
    Pagination,
};
use crate::utils::error::{PipelineError, Result, error_text};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::debug;

use super::super::entities::{self, bulk_action};
use super::convert::{action_from_model, now, to_db_time};
use super::types::{IngestionSummary, SeaOrmDatabase};

/// Update of one action, applied only while it is in one of `sources`
fn guarded_update(id: &str, sources: &[ActionStatus]) -> UpdateMany<entities::BulkAction> {
    entities::BulkAction::update_many()
        .col_expr(bulk_action::Column::UpdatedAt, Expr::value(now()))
        .filter(bulk_action::Column::Id.eq(id))
        .filter(bulk_action::Column::Status.is_in(sources.iter().map(|s| s.as_str())))
}

fn set_status(
    update: UpdateMany<entities::BulkAction>,
    status: ActionStatus,
) -> UpdateMany<entities::BulkAction> {
    update.col_expr(bulk_action::Column::Status, Expr::value(status.as_str()))
}

impl SeaOrmDatabase {
    /// Insert a new action
    pub async fn create_action(
        &self,
        action_id: &str,
        new: &NewBulkAction,
        status: ActionStatus,
    ) -> Result<BulkAction> {
        debug!("Creating bulk action: {} ({})", action_id, status);

        let created_at = now();
        let active_model = bulk_action::ActiveModel {
            id: Set(action_id.to_string()),
            account_id: Set(new.account_id.clone()),
            action_type: Set(new
                .action_type
                .clone()
                .unwrap_or_else(|| BULK_UPDATE.to_string())),
            entity_type: Set(new.entity_type.clone()),
            status: Set(status.as_str().to_string()),
            original_file_name: Set(new.file.as_ref().map(|f| f.original_name.clone())),
            file_path: Set(new.file.as_ref().map(|f| f.path.clone())),
            total_entities: Set(0),
            processed_entities: Set(0),
            success_count: Set(0),
            failed_count: Set(0),
            skipped_count: Set(0),
            rejected_rows: Set(0),
            scheduled_at: Set(new.scheduled_at.map(to_db_time)),
            processing_started_at: Set(None),
            processing_completed_at: Set(None),
            ingested_at: Set(None),
            error_message: Set(None),
            created_by: Set(new.created_by.clone()),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        action_from_model(model)
    }

    /// Find an action by id
    pub async fn find_action(&self, action_id: &str) -> Result<Option<BulkAction>> {
        entities::BulkAction::find_by_id(action_id)
            .one(&self.db)
            .await
            .map_err(PipelineError::Database)?
            .map(action_from_model)
            .transpose()
    }

    /// Get an action by id, failing when it does not exist
    pub async fn get_action(&self, action_id: &str) -> Result<BulkAction> {
        self.find_action(action_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("Bulk action not found"))
    }

    /// List actions newest first
    pub async fn list_actions(
        &self,
        filter: &ActionFilter,
        pagination: Pagination,
    ) -> Result<Page<BulkAction>> {
        let pagination = pagination.normalized();
        debug!("Listing bulk actions: {:?} {:?}", filter, pagination);

        let mut query = entities::BulkAction::find();
        if let Some(account_id) = &filter.account_id {
            query = query.filter(bulk_action::Column::AccountId.eq(account_id.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(bulk_action::Column::Status.eq(status.as_str()));
        }
        if let Some(entity_type) = &filter.entity_type {
            query = query.filter(bulk_action::Column::EntityType.eq(entity_type.as_str()));
        }

        let paginator = query
            .order_by_desc(bulk_action::Column::CreatedAt)
            .order_by_desc(bulk_action::Column::Id)
            .paginate(&self.db, pagination.per_page);

        let total = paginator.num_items().await.map_err(PipelineError::Database)?;
        let items = paginator
            .fetch_page(pagination.index())
            .await
            .map_err(PipelineError::Database)?
            .into_iter()
            .map(action_from_model)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, pagination))
    }

    /// PENDING/SCHEDULED -> PROCESSING, stamping the start time
    ///
    /// Returns false when another delivery already claimed the action.
    pub async fn claim_for_ingestion(&self, action_id: &str) -> Result<bool> {
        let sources = ActionStatus::sources_of(ActionStatus::Processing);
        let result = set_status(guarded_update(action_id, &sources), ActionStatus::Processing)
            .col_expr(
                bulk_action::Column::ProcessingStartedAt,
                Expr::value(Some(now())),
            )
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// Record totals once the source file has been read to the end
    ///
    /// Rejected rows are counted as failed and processed right away.
    pub async fn record_ingestion(
        &self,
        action_id: &str,
        summary: &IngestionSummary,
    ) -> Result<bool> {
        use bulk_action::Column;

        let result = guarded_update(
            action_id,
            &[ActionStatus::Processing, ActionStatus::PartiallyCompleted],
        )
        .col_expr(Column::TotalEntities, Expr::value(summary.total_rows))
        .col_expr(Column::RejectedRows, Expr::value(summary.rejected_rows))
        .col_expr(
            Column::FailedCount,
            Expr::col(Column::FailedCount).add(summary.rejected_rows),
        )
        .col_expr(
            Column::ProcessedEntities,
            Expr::col(Column::ProcessedEntities).add(summary.rejected_rows),
        )
        .col_expr(Column::IngestedAt, Expr::value(Some(now())))
        .exec(&self.db)
        .await
        .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// Any non-terminal status -> FAILED with an error text
    pub async fn fail_action(&self, action_id: &str, message: &str) -> Result<bool> {
        let sources = ActionStatus::sources_of(ActionStatus::Failed);
        let result = set_status(guarded_update(action_id, &sources), ActionStatus::Failed)
            .col_expr(
                bulk_action::Column::ErrorMessage,
                Expr::value(Some(error_text(message))),
            )
            .col_expr(
                bulk_action::Column::ProcessingCompletedAt,
                Expr::value(Some(now())),
            )
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// Add batch tallies to the action counters in one statement
    pub async fn increment_action_counters(
        &self,
        action_id: &str,
        delta: CounterDelta,
    ) -> Result<()> {
        use bulk_action::Column;

        if delta.is_empty() {
            return Ok(());
        }

        entities::BulkAction::update_many()
            .col_expr(
                Column::SuccessCount,
                Expr::col(Column::SuccessCount).add(delta.success),
            )
            .col_expr(
                Column::FailedCount,
                Expr::col(Column::FailedCount).add(delta.failed),
            )
            .col_expr(
                Column::SkippedCount,
                Expr::col(Column::SkippedCount).add(delta.skipped),
            )
            .col_expr(
                Column::ProcessedEntities,
                Expr::col(Column::ProcessedEntities).add(delta.processed()),
            )
            .col_expr(Column::UpdatedAt, Expr::value(now()))
            .filter(Column::Id.eq(action_id))
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(())
    }

    /// Replace the counters with values recounted from job state
    pub async fn overwrite_action_counters(
        &self,
        action_id: &str,
        success: i64,
        failed: i64,
        skipped: i64,
    ) -> Result<()> {
        use bulk_action::Column;

        entities::BulkAction::update_many()
            .col_expr(Column::SuccessCount, Expr::value(success))
            .col_expr(Column::FailedCount, Expr::value(failed))
            .col_expr(Column::SkippedCount, Expr::value(skipped))
            .col_expr(
                Column::ProcessedEntities,
                Expr::value(success + failed + skipped),
            )
            .col_expr(Column::UpdatedAt, Expr::value(now()))
            .filter(Column::Id.eq(action_id))
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(())
    }

    /// PROCESSING/PARTIALLY_COMPLETED -> COMPLETED, only after ingestion finished
    pub async fn complete_action(&self, action_id: &str) -> Result<bool> {
        let sources = ActionStatus::sources_of(ActionStatus::Completed);
        let result = set_status(guarded_update(action_id, &sources), ActionStatus::Completed)
            .col_expr(
                bulk_action::Column::ProcessingCompletedAt,
                Expr::value(Some(now())),
            )
            .filter(bulk_action::Column::IngestedAt.is_not_null())
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// PROCESSING -> PARTIALLY_COMPLETED, only after ingestion finished
    pub async fn mark_partially_completed(&self, action_id: &str) -> Result<bool> {
        let sources = ActionStatus::sources_of(ActionStatus::PartiallyCompleted);
        let result = set_status(
            guarded_update(action_id, &sources),
            ActionStatus::PartiallyCompleted,
        )
        .filter(bulk_action::Column::IngestedAt.is_not_null())
        .exec(&self.db)
        .await
        .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// SCHEDULED -> PENDING, stamping the start time
    pub async fn promote_scheduled_action(&self, action_id: &str) -> Result<bool> {
        let result = set_status(
            guarded_update(action_id, &[ActionStatus::Scheduled]),
            ActionStatus::Pending,
        )
        .col_expr(
            bulk_action::Column::ProcessingStartedAt,
            Expr::value(Some(now())),
        )
        .exec(&self.db)
        .await
        .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// Scheduled actions whose start time has passed, oldest first
    pub async fn find_due_scheduled_actions(&self, at: DateTime<Utc>) -> Result<Vec<BulkAction>> {
        entities::BulkAction::find()
            .filter(bulk_action::Column::Status.eq(ActionStatus::Scheduled.as_str()))
            .filter(bulk_action::Column::ScheduledAt.lte(to_db_time(at)))
            .order_by_asc(bulk_action::Column::ScheduledAt)
            .all(&self.db)
            .await
            .map_err(PipelineError::Database)?
            .into_iter()
            .map(action_from_model)
            .collect()
    }
}
