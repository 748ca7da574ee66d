use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::storage::StoreError;

/// Lifecycle of a submitted expression: `pending` moves once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status {other:?}")),
        }
    }
}

/// How a job ends. A result exists only for completed jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobOutcome {
    Completed(f64),
    Error,
}

impl JobOutcome {
    pub fn status(self) -> JobStatus {
        match self {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Error => JobStatus::Error,
        }
    }

    pub fn result(self) -> Option<f64> {
        match self {
            JobOutcome::Completed(value) => Some(value),
            JobOutcome::Error => None,
        }
    }
}

/// One expression submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: i64,
    pub user_id: i64,
    pub expression: String,
    pub status: JobStatus,
    pub result: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Row shape of the `expressions` table.
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub user_id: i64,
    pub expression: String,
    pub status: String,
    pub result: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(r: JobRow) -> Result<Self, Self::Error> {
        let status = r.status.parse::<JobStatus>().map_err(StoreError::Corrupt)?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            expression: r.expression,
            status,
            result: if status == JobStatus::Completed { r.result } else { None },
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
