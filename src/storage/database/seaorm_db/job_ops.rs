use crate::core::models::{
    JobCounts, JobFilter, JobStatus, NewPushJob, Page, Pagination, PushJob,
};
use crate::utils::error::{PipelineError, Result, error_text};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::super::entities::{self, push_job};
use super::convert::{job_from_model, now};
use super::types::SeaOrmDatabase;

/// Update of one job, applied only while it is in `source`
fn guarded_update(job_id: &str, source: JobStatus) -> UpdateMany<entities::PushJob> {
    entities::PushJob::update_many()
        .col_expr(push_job::Column::UpdatedAt, Expr::value(now()))
        .filter(push_job::Column::Id.eq(job_id))
        .filter(push_job::Column::Status.eq(source.as_str()))
}

impl SeaOrmDatabase {
    /// Insert READY jobs, returning their ids in input order
    pub async fn insert_jobs(&self, jobs: &[NewPushJob]) -> Result<Vec<String>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let created_at = now();
        let ids: Vec<String> = jobs.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let models = jobs.iter().zip(&ids).map(|(job, id)| push_job::ActiveModel {
            id: Set(id.clone()),
            action_id: Set(job.action_id.clone()),
            account_id: Set(job.account_id.clone()),
            entity_type: Set(job.entity_type.clone()),
            external_id: Set(job.external_id.clone()),
            payload: Set(serde_json::Value::Object(job.payload.clone())),
            status: Set(JobStatus::Ready.as_str().to_string()),
            error_message: Set(None),
            processed_at: Set(None),
            attempts: Set(0),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        });

        entities::PushJob::insert_many(models)
            .exec_without_returning(&self.db)
            .await
            .map_err(PipelineError::Database)?;

        debug!("Inserted {} jobs", ids.len());
        Ok(ids)
    }

    /// Find a job by id
    pub async fn find_job(&self, job_id: &str) -> Result<Option<PushJob>> {
        entities::PushJob::find_by_id(job_id)
            .one(&self.db)
            .await
            .map_err(PipelineError::Database)?
            .map(job_from_model)
            .transpose()
    }

    /// Jobs among `job_ids` currently in one of `statuses`, in the order of `job_ids`
    pub async fn find_jobs_in_status(
        &self,
        job_ids: &[String],
        statuses: &[JobStatus],
    ) -> Result<Vec<PushJob>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        let position: HashMap<&str, usize> = job_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut jobs = entities::PushJob::find()
            .filter(push_job::Column::Id.is_in(job_ids.iter().map(String::as_str)))
            .filter(push_job::Column::Status.is_in(statuses.iter().map(|s| s.as_str())))
            .all(&self.db)
            .await
            .map_err(PipelineError::Database)?
            .into_iter()
            .map(job_from_model)
            .collect::<Result<Vec<_>>>()?;

        jobs.sort_by_key(|job| position.get(job.job_id.as_str()).copied());
        Ok(jobs)
    }

    /// READY -> SKIPPED with a reason
    pub async fn skip_job(&self, job_id: &str, reason: &str) -> Result<bool> {
        let result = guarded_update(job_id, JobStatus::Ready)
            .col_expr(
                push_job::Column::Status,
                Expr::value(JobStatus::Skipped.as_str()),
            )
            .col_expr(
                push_job::Column::ErrorMessage,
                Expr::value(Some(error_text(reason))),
            )
            .col_expr(push_job::Column::ProcessedAt, Expr::value(Some(now())))
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// READY -> PROCESSING, counting the attempt
    pub async fn promote_job(&self, job_id: &str) -> Result<bool> {
        let result = guarded_update(job_id, JobStatus::Ready)
            .col_expr(
                push_job::Column::Status,
                Expr::value(JobStatus::Processing.as_str()),
            )
            .col_expr(
                push_job::Column::Attempts,
                Expr::col(push_job::Column::Attempts).add(1),
            )
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// PROCESSING -> SUCCESS/FAILED, stamping the processed time
    pub async fn finish_job(
        &self,
        job_id: &str,
        outcome: JobStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        if !outcome.is_terminal() {
            return Err(PipelineError::internal(format!(
                "Job cannot finish as {}",
                outcome
            )));
        }

        let result = guarded_update(job_id, JobStatus::Processing)
            .col_expr(push_job::Column::Status, Expr::value(outcome.as_str()))
            .col_expr(
                push_job::Column::ErrorMessage,
                Expr::value(error.map(|e| error_text(e))),
            )
            .col_expr(push_job::Column::ProcessedAt, Expr::value(Some(now())))
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(result.rows_affected > 0)
    }

    /// Fail every job among `job_ids` still in PROCESSING, returning how many changed
    pub async fn fail_processing_jobs(&self, job_ids: &[String], reason: &str) -> Result<u64> {
        if job_ids.is_empty() {
            return Ok(0);
        }

        let result = entities::PushJob::update_many()
            .col_expr(
                push_job::Column::Status,
                Expr::value(JobStatus::Failed.as_str()),
            )
            .col_expr(
                push_job::Column::ErrorMessage,
                Expr::value(Some(error_text(reason))),
            )
            .col_expr(push_job::Column::ProcessedAt, Expr::value(Some(now())))
            .col_expr(push_job::Column::UpdatedAt, Expr::value(now()))
            .filter(push_job::Column::Id.is_in(job_ids.iter().map(String::as_str)))
            .filter(push_job::Column::Status.eq(JobStatus::Processing.as_str()))
            .exec(&self.db)
            .await
            .map_err(PipelineError::Database)?;
        Ok(result.rows_affected)
    }

    /// Job counts per status for one action
    pub async fn count_jobs_by_status(&self, action_id: &str) -> Result<JobCounts> {
        let rows: Vec<(String, i64)> = entities::PushJob::find()
            .select_only()
            .column(push_job::Column::Status)
            .column_as(push_job::Column::Id.count(), "count")
            .filter(push_job::Column::ActionId.eq(action_id))
            .group_by(push_job::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(PipelineError::Database)?;

        let mut counts = JobCounts::default();
        for (status, count) in rows {
            counts.add(status.parse()?, count);
        }
        Ok(counts)
    }

    /// Jobs of one action still READY or PROCESSING
    pub async fn count_pending_jobs(&self, action_id: &str) -> Result<u64> {
        entities::PushJob::find()
            .filter(push_job::Column::ActionId.eq(action_id))
            .filter(push_job::Column::Status.is_in(JobStatus::PENDING.iter().map(|s| s.as_str())))
            .count(&self.db)
            .await
            .map_err(PipelineError::Database)
    }

    /// Page through the jobs of one action, oldest first
    pub async fn list_jobs(
        &self,
        action_id: &str,
        filter: &JobFilter,
        pagination: Pagination,
    ) -> Result<Page<PushJob>> {
        let pagination = pagination.normalized();

        let mut query =
            entities::PushJob::find().filter(push_job::Column::ActionId.eq(action_id));
        if let Some(status) = filter.status {
            query = query.filter(push_job::Column::Status.eq(status.as_str()));
        }
        if let Some(external_id) = &filter.external_id {
            query = query.filter(push_job::Column::ExternalId.eq(external_id.as_str()));
        }

        let paginator = query
            .order_by_asc(push_job::Column::CreatedAt)
            .order_by_asc(push_job::Column::Id)
            .paginate(&self.db, pagination.per_page);

        let total = paginator.num_items().await.map_err(PipelineError::Database)?;
        let items = paginator
            .fetch_page(pagination.index())
            .await
            .map_err(PipelineError::Database)?
            .into_iter()
            .map(job_from_model)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, pagination))
    }
}
