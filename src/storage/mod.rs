//! Durable mapping of users and expression jobs.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::auth::repo_types::User;
use crate::expressions::repo_types::{Job, JobOutcome};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("expression not found")]
    JobNotFound,
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence shared by request handlers and background evaluations.
///
/// Implementations serialize writes to the same job; writes to different jobs
/// never interfere.
#[async_trait]
pub trait Store: Send + Sync {
    /// Registers a login. Uniqueness is checked and enforced atomically.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, StoreError>;

    async fn get_user_by_login(&self, login: &str) -> Result<User, StoreError>;

    /// Inserts a `pending` job whose `updated_at` equals `created_at`.
    async fn create_job(&self, user_id: i64, expression: &str) -> Result<Job, StoreError>;

    /// Moves a job from `pending` to the outcome's status. A job that is not
    /// pending is left untouched; the number of rows changed is returned.
    async fn update_job_terminal(&self, job_id: i64, outcome: JobOutcome)
        -> Result<u64, StoreError>;

    /// All jobs of a user in ascending id order; empty when there are none.
    async fn list_jobs_by_user(&self, user_id: i64) -> Result<Vec<Job>, StoreError>;

    async fn get_job(&self, user_id: i64, job_id: i64) -> Result<Job, StoreError>;

    /// Jobs still awaiting a result, for the startup recovery sweep.
    async fn get_pending_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Releases connections on shutdown.
    async fn close(&self) {}
}
