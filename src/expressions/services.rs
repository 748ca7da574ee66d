use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::calculator::{self, EvalError};
use crate::expressions::repo_types::{Job, JobOutcome};
use crate::grpc::ComputeClient;
use crate::storage::{Store, StoreError};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("expression is empty")]
    Empty,
    #[error("invalid expression: {0}")]
    Invalid(#[from] EvalError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persists submissions and drives each one to a terminal state in the
/// background.
///
/// Evaluations are detached from the request that submitted them and carry
/// their own deadline. The outcome write only succeeds while the job is still
/// `pending`, so a job dispatched twice is finished once.
#[derive(Clone)]
pub struct JobCoordinator {
    store: Arc<dyn Store>,
    compute: Arc<dyn ComputeClient>,
    job_timeout: Duration,
    tasks: TaskTracker,
}

impl JobCoordinator {
    pub fn new(store: Arc<dyn Store>, compute: Arc<dyn ComputeClient>, job_timeout: Duration) -> Self {
        Self {
            store,
            compute,
            job_timeout,
            tasks: TaskTracker::new(),
        }
    }

    #[instrument(skip(self, expression))]
    pub async fn submit(&self, user_id: i64, expression: &str) -> Result<Job, SubmitError> {
        if expression.trim().is_empty() {
            return Err(SubmitError::Empty);
        }
        calculator::validate(expression)?;

        let job = self.store.create_job(user_id, expression).await?;
        info!(job_id = job.id, "job accepted");
        self.dispatch(job.clone());
        Ok(job)
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        self.store.list_jobs_by_user(user_id).await
    }

    pub async fn get(&self, user_id: i64, job_id: i64) -> Result<Job, StoreError> {
        self.store.get_job(user_id, job_id).await
    }

    /// Re-dispatches every job left `pending` by a previous run.
    pub async fn recover_pending(&self) -> Result<usize, StoreError> {
        let pending = self.store.get_pending_jobs().await?;
        let mut dispatched = 0;
        for job in pending {
            if self.dispatch(job) {
                dispatched += 1;
            }
        }
        if dispatched > 0 {
            info!(count = dispatched, "re-dispatched pending jobs");
        }
        Ok(dispatched)
    }

    /// Number of evaluations still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Stops dispatching and waits up to `grace` for running evaluations.
    /// Returns `false` if some were still running when the grace ran out;
    /// those jobs stay `pending` for the next start's recovery sweep.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tasks.close();
        let in_flight = self.tasks.len();
        if in_flight > 0 {
            info!(in_flight, ?grace, "waiting for background evaluations");
        }
        let drained = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();
        if !drained {
            warn!(remaining = self.tasks.len(), "shutdown grace elapsed");
        }
        drained
    }

    fn dispatch(&self, job: Job) -> bool {
        if self.tasks.is_closed() {
            warn!(job_id = job.id, "shutting down; job left pending");
            return false;
        }
        let this = self.clone();
        self.tasks.spawn(async move { this.process(job).await });
        true
    }

    async fn process(&self, job: Job) {
        let call = self
            .compute
            .evaluate(&job.expression, job.user_id, self.job_timeout);

        let outcome = match tokio::time::timeout(self.job_timeout, call).await {
            Ok(Ok(value)) if value.is_finite() => JobOutcome::Completed(value),
            Ok(Ok(value)) => {
                warn!(job_id = job.id, %value, "result is not a finite number");
                JobOutcome::Error
            }
            Ok(Err(e)) => {
                warn!(job_id = job.id, error = %e, "evaluation failed");
                JobOutcome::Error
            }
            Err(_) => {
                warn!(job_id = job.id, timeout = ?self.job_timeout, "evaluation timed out");
                JobOutcome::Error
            }
        };

        match self.store.update_job_terminal(job.id, outcome).await {
            Ok(0) => debug!(job_id = job.id, "job already terminal"),
            Ok(_) => info!(job_id = job.id, status = %outcome.status(), "job finished"),
            Err(e) => error!(job_id = job.id, error = %e, "failed to record job outcome"),
        }
    }
}
