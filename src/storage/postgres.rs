use async_trait::async_trait;
use sqlx::PgPool;

use super::{Store, StoreError};
use crate::auth::repo_types::User;
use crate::expressions::repo;
use crate::expressions::repo_types::{Job, JobOutcome, JobRow};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, StoreError> {
    rows.into_iter().map(Job::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, StoreError> {
        match User::create(&self.db, login, password_hash).await? {
            Some(user) => Ok(user.id),
            None => Err(StoreError::UserExists),
        }
    }

    async fn get_user_by_login(&self, login: &str) -> Result<User, StoreError> {
        User::find_by_login(&self.db, login)
            .await?
            .ok_or(StoreError::UserNotFound)
    }

    async fn create_job(&self, user_id: i64, expression: &str) -> Result<Job, StoreError> {
        match repo::insert(&self.db, user_id, expression).await {
            Ok(row) => Job::try_from(row),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(StoreError::UserNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_job_terminal(
        &self,
        job_id: i64,
        outcome: JobOutcome,
    ) -> Result<u64, StoreError> {
        let affected =
            repo::mark_terminal(&self.db, job_id, outcome.status().as_str(), outcome.result())
                .await?;
        Ok(affected)
    }

    async fn list_jobs_by_user(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        into_jobs(repo::list_by_user(&self.db, user_id).await?)
    }

    async fn get_job(&self, user_id: i64, job_id: i64) -> Result<Job, StoreError> {
        repo::find_for_user(&self.db, user_id, job_id)
            .await?
            .ok_or(StoreError::JobNotFound)
            .and_then(Job::try_from)
    }

    async fn get_pending_jobs(&self) -> Result<Vec<Job>, StoreError> {
        into_jobs(repo::list_pending(&self.db).await?)
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
