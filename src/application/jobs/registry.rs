//! Job lifecycle: creation, polling, pause/resume and idle eviction.

use std::{sync::Arc, time::Duration};

use metrics::{counter, gauge};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    application::{
        convert::ConversionChain,
        mail::{Mailer, MessageTemplate},
        resolve::ResolveOptions,
    },
    domain::{naming::NameTemplate, types::JobStatus},
};
use docbatch_api_types::{JobCreated, JobStatusView};

use super::{
    error::JobError,
    model::{JobOutput, JobRecord},
    repository::{InMemoryJobRepository, JobRepository},
    request::{JobRequest, validate},
    inflight::{InFlightRuns, RunGuard},
    runner::{JobRunner, RunError},
};

const METRIC_JOBS_EVICTED: &str = "docbatch_jobs_evicted_total";
const METRIC_JOBS_ACTIVE: &str = "docbatch_jobs_active";

/// Collaborators shared by every runner.
#[derive(Clone)]
pub struct JobServices {
    pub conversion: ConversionChain,
    pub mailer: Arc<dyn Mailer>,
    pub message: MessageTemplate,
    pub resolve: ResolveOptions,
    pub name_template: NameTemplate,
    pub fallback_primary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Idle time after which a job is discarded, whatever its status.
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct JobRegistry {
    repo: Arc<dyn JobRepository>,
    runs: InFlightRuns,
    services: Arc<JobServices>,
    settings: RegistrySettings,
}

impl JobRegistry {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        services: JobServices,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            repo,
            runs: InFlightRuns::new(),
            services: Arc::new(services),
            settings,
        }
    }

    pub fn in_memory(services: JobServices, settings: RegistrySettings) -> Self {
        Self::new(Arc::new(InMemoryJobRepository::new()), services, settings)
    }

    pub fn settings(&self) -> RegistrySettings {
        self.settings
    }

    /// Validates the request, records the job and starts its runner. Must be
    /// called from within a Tokio runtime.
    pub fn create(&self, request: JobRequest) -> Result<JobCreated, JobError> {
        let job = validate(
            request,
            &self.services.name_template,
            !self.services.conversion.is_empty(),
        )?;

        let id = Uuid::new_v4();
        let total = job.dataset.len();
        let record = JobRecord::new(id, job.kind, total);
        let pause = record.pause.clone();
        self.repo.insert(record)?;

        let guard = match self.runs.acquire(id) {
            Ok(guard) => guard,
            Err(err) => {
                self.repo.update(id, &mut |record| record.fail(err.to_string()));
                return Err(err.into());
            }
        };

        info!(
            target = "application::jobs::registry",
            job_id = %id,
            kind = job.kind.as_str(),
            total,
            "job created"
        );

        let runner = JobRunner::new(
            id,
            job,
            Arc::clone(&self.repo),
            Arc::clone(&self.services),
            pause,
        );
        supervise(Arc::clone(&self.repo), id, guard, tokio::spawn(runner.run()));

        self.record_active_gauge();
        Ok(JobCreated { job_id: id, total })
    }

    pub fn status(&self, id: Uuid) -> Result<JobStatusView, JobError> {
        self.repo
            .get(id)
            .map(|record| record.view())
            .ok_or(JobError::NotFound { id })
    }

    /// The result payload; only available once the job is `done`.
    pub fn result(&self, id: Uuid) -> Result<Arc<JobOutput>, JobError> {
        let record = self.repo.get(id).ok_or(JobError::NotFound { id })?;
        match (&record.status, &record.result) {
            (JobStatus::Done, Some(output)) => Ok(Arc::clone(output)),
            (status, _) => Err(JobError::NotReady {
                id,
                status: *status,
            }),
        }
    }

    /// Arms the job's pause signal; the runner stops before its next row.
    /// No-op on terminal jobs.
    pub fn pause(&self, id: Uuid) -> Result<JobStatusView, JobError> {
        let record = self.repo.get(id).ok_or(JobError::NotFound { id })?;
        if record.is_terminal() {
            return Ok(record.view());
        }
        record.pause.pause();
        let updated = self
            .repo
            .update(id, &mut |record| record.mark_paused())
            .ok_or(JobError::NotFound { id })?;
        info!(
            target = "application::jobs::registry",
            job_id = %id,
            current = updated.current,
            "job paused"
        );
        Ok(updated.view())
    }

    pub fn resume(&self, id: Uuid) -> Result<JobStatusView, JobError> {
        let record = self.repo.get(id).ok_or(JobError::NotFound { id })?;
        if record.is_terminal() {
            return Ok(record.view());
        }
        record.pause.resume();
        let updated = self
            .repo
            .update(id, &mut |record| record.mark_resumed())
            .ok_or(JobError::NotFound { id })?;
        info!(
            target = "application::jobs::registry",
            job_id = %id,
            current = updated.current,
            "job resumed"
        );
        Ok(updated.view())
    }

    /// Whether a runner task still holds the job's run slot.
    pub fn has_runner(&self, id: Uuid) -> bool {
        self.runs.is_running(id)
    }

    pub fn list(&self) -> Vec<JobStatusView> {
        self.repo.list().iter().map(JobRecord::view).collect()
    }

    /// Drops jobs idle past the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let evicted = self.repo.evict_idle(Instant::now(), self.settings.ttl);
        for record in &evicted {
            // A paused runner must wake up to notice it was evicted.
            record.pause.resume();
            info!(
                target = "application::jobs::registry",
                job_id = %record.id,
                status = record.status.as_str(),
                "job evicted after idle ttl"
            );
        }
        if !evicted.is_empty() {
            counter!(METRIC_JOBS_EVICTED).increment(evicted.len() as u64);
        }
        self.record_active_gauge();
        evicted.len()
    }

    /// Runs [`JobRegistry::sweep`] every `sweep_interval` until aborted.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let registry = self.clone();
        let period = self.settings.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                interval.tick().await;
                registry.sweep();
            }
        })
    }

    fn record_active_gauge(&self) {
        let active = self
            .repo
            .list()
            .iter()
            .filter(|record| !record.is_terminal())
            .count();
        gauge!(METRIC_JOBS_ACTIVE).set(active as f64);
    }
}

/// Waits for a runner and makes sure its job ends terminal: an error or a
/// panic becomes the job-fatal `error` state. The run slot is released once
/// the runner is gone.
fn supervise(
    repo: Arc<dyn JobRepository>,
    id: Uuid,
    guard: RunGuard,
    runner: JoinHandle<Result<(), RunError>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _guard = guard;
        let failure = match runner.await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(join) if join.is_panic() => Some("runner panicked".to_string()),
            Err(join) => Some(format!("runner stopped: {join}")),
        };
        if let Some(message) = failure {
            error!(
                target = "application::jobs::registry",
                job_id = %id,
                error = %message,
                "job failed"
            );
            repo.update(id, &mut |record| record.fail(message.clone()));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{application::template::TemplateError, domain::types::JobKind};

    fn tracked_job(repo: &Arc<dyn JobRepository>) -> Uuid {
        let record = JobRecord::new(Uuid::new_v4(), JobKind::Generate, 2);
        let id = record.id;
        repo.insert(record).expect("insert");
        id
    }

    #[tokio::test]
    async fn runner_error_moves_the_job_to_error_and_frees_the_slot() {
        let repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let id = tracked_job(&repo);
        let runs = InFlightRuns::new();
        let guard = runs.acquire(id).expect("run slot");

        let runner = tokio::spawn(async {
            Err(RunError::Template(TemplateError::MissingPart {
                part: "word/document.xml",
            }))
        });
        supervise(Arc::clone(&repo), id, guard, runner)
            .await
            .expect("supervisor");

        let record = repo.get(id).expect("record");
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(
            record.error.as_deref(),
            Some("template rendering failed: template package has no `word/document.xml` part")
        );
        assert!(record.result.is_none());
        assert!(!runs.is_running(id));
    }

    #[tokio::test]
    async fn runner_panic_from_paused_moves_the_job_to_error() {
        let repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let id = tracked_job(&repo);
        repo.update(id, &mut |record| record.mark_paused())
            .expect("record");
        let runs = InFlightRuns::new();
        let guard = runs.acquire(id).expect("run slot");

        async fn crash() -> Result<(), RunError> {
            panic!("converter crashed")
        }

        supervise(Arc::clone(&repo), id, guard, tokio::spawn(crash()))
            .await
            .expect("supervisor");

        let record = repo.get(id).expect("record");
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.error.as_deref(), Some("runner panicked"));
    }

    #[tokio::test]
    async fn finished_jobs_are_left_alone() {
        let repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let id = tracked_job(&repo);
        let runs = InFlightRuns::new();
        let guard = runs.acquire(id).expect("run slot");

        supervise(Arc::clone(&repo), id, guard, tokio::spawn(async { Ok(()) }))
            .await
            .expect("supervisor");

        let record = repo.get(id).expect("record");
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.error.is_none());
        assert!(!runs.is_running(id));
    }
}
