use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

/// Tracks jobs that currently have a live runner.
#[derive(Debug, Default, Clone)]
pub struct InFlightRuns {
    jobs: Arc<DashMap<Uuid, ()>>,
}

#[derive(Debug, Error)]
pub enum InFlightError {
    #[error("a runner is already active for job {job_id}")]
    AlreadyRunning { job_id: Uuid },
}

impl InFlightRuns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, job_id: Uuid) -> Result<RunGuard, InFlightError> {
        use dashmap::mapref::entry::Entry;

        match self.jobs.entry(job_id) {
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(RunGuard {
                    job_id,
                    jobs: Arc::clone(&self.jobs),
                })
            }
            Entry::Occupied(_) => Err(InFlightError::AlreadyRunning { job_id }),
        }
    }

    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.jobs.contains_key(&job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Releases the job's runner slot on drop.
#[derive(Debug)]
pub struct RunGuard {
    job_id: Uuid,
    jobs: Arc<DashMap<Uuid, ()>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.jobs.remove(&self.job_id);
    }
}
