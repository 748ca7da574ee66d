use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::expressions::repo_types::{Job, JobStatus};

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub id: i64,
    pub status: JobStatus,
}

/// One history entry as returned to its owner.
#[derive(Debug, Serialize)]
pub struct ExpressionView {
    pub id: i64,
    pub expression: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Job> for ExpressionView {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            expression: job.expression,
            status: job.status,
            result: job.result,
            created_at: job.created_at,
        }
    }
}
