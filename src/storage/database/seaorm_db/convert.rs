//! Model to domain conversions

use crate::core::models::{BulkAction, Payload, PushJob};
use crate::utils::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;

use super::super::entities::{bulk_action, push_job};

pub(super) fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

pub(super) fn to_db_time(time: DateTime<Utc>) -> DateTimeWithTimeZone {
    time.into()
}

fn to_utc(time: DateTimeWithTimeZone) -> DateTime<Utc> {
    time.with_timezone(&Utc)
}

pub(super) fn action_from_model(model: bulk_action::Model) -> Result<BulkAction> {
    Ok(BulkAction {
        status: model.status.parse()?,
        action_id: model.id,
        account_id: model.account_id,
        action_type: model.action_type,
        entity_type: model.entity_type,
        original_file_name: model.original_file_name,
        file_path: model.file_path,
        total_entities: model.total_entities,
        processed_entities: model.processed_entities,
        success_count: model.success_count,
        failed_count: model.failed_count,
        skipped_count: model.skipped_count,
        rejected_rows: model.rejected_rows,
        scheduled_at: model.scheduled_at.map(to_utc),
        processing_started_at: model.processing_started_at.map(to_utc),
        processing_completed_at: model.processing_completed_at.map(to_utc),
        ingested_at: model.ingested_at.map(to_utc),
        error_message: model.error_message,
        created_by: model.created_by,
        created_at: to_utc(model.created_at),
        updated_at: to_utc(model.updated_at),
    })
}

pub(super) fn job_from_model(model: push_job::Model) -> Result<PushJob> {
    let payload: Payload = match model.payload {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(PipelineError::internal(format!(
                "Job {} payload is not an object: {}",
                model.id, other
            )));
        }
    };

    Ok(PushJob {
        status: model.status.parse()?,
        job_id: model.id,
        action_id: model.action_id,
        account_id: model.account_id,
        entity_type: model.entity_type,
        external_id: model.external_id,
        payload,
        error_message: model.error_message,
        processed_at: model.processed_at.map(to_utc),
        attempts: model.attempts,
        created_at: to_utc(model.created_at),
        updated_at: to_utc(model.updated_at),
    })
}
