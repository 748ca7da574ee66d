use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{Store, StoreError};
use crate::auth::repo_types::User;
use crate::expressions::repo_types::{Job, JobOutcome, JobStatus};

/// Process-local store with the same guarantees as the database one.
///
/// A single mutex makes every operation atomic; ids are handed out
/// monotonically, starting at 1.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    next_user_id: i64,
    jobs: BTreeMap<i64, Job>,
    next_job_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, StoreError> {
        let mut inner = self.lock();
        if inner.users.contains_key(login) {
            return Err(StoreError::UserExists);
        }
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        inner.users.insert(
            login.to_string(),
            User {
                id,
                login: login.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(id)
    }

    async fn get_user_by_login(&self, login: &str) -> Result<User, StoreError> {
        self.lock()
            .users
            .get(login)
            .cloned()
            .ok_or(StoreError::UserNotFound)
    }

    async fn create_job(&self, user_id: i64, expression: &str) -> Result<Job, StoreError> {
        let mut inner = self.lock();
        if !inner.users.values().any(|u| u.id == user_id) {
            return Err(StoreError::UserNotFound);
        }
        inner.next_job_id += 1;
        let now = OffsetDateTime::now_utc();
        let job = Job {
            id: inner.next_job_id,
            user_id,
            expression: expression.to_string(),
            status: JobStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_job_terminal(
        &self,
        job_id: i64,
        outcome: JobOutcome,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        match inner.jobs.get_mut(&job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = outcome.status();
                job.result = outcome.result();
                job.updated_at = OffsetDateTime::now_utc().max(job.created_at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn list_jobs_by_user(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_job(&self, user_id: i64, job_id: i64) -> Result<Job, StoreError> {
        self.lock()
            .jobs
            .get(&job_id)
            .filter(|job| job.user_id == user_id)
            .cloned()
            .ok_or(StoreError::JobNotFound)
    }

    async fn get_pending_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect())
    }
}
