//! Storage seam for job records.

use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use super::model::JobRecord;

#[derive(Debug, Error)]
pub enum JobRepoError {
    #[error("job {id} already exists")]
    Duplicate { id: Uuid },
}

/// Job state store. An `update` whose closure reports a change refreshes the
/// record's activity stamps.
pub trait JobRepository: Send + Sync {
    fn insert(&self, record: JobRecord) -> Result<(), JobRepoError>;

    fn get(&self, id: Uuid) -> Option<JobRecord>;

    /// Applies `apply` in place and returns the updated snapshot, or `None`
    /// when the job no longer exists. `apply` returns whether it changed the
    /// record.
    fn update(
        &self,
        id: Uuid,
        apply: &mut dyn FnMut(&mut JobRecord) -> bool,
    ) -> Option<JobRecord>;

    fn list(&self) -> Vec<JobRecord>;

    /// Removes every record idle for longer than `ttl` as of `now`.
    fn evict_idle(&self, now: Instant, ttl: Duration) -> Vec<JobRecord>;
}

#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<Uuid, JobRecord>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRepository for InMemoryJobRepository {
    fn insert(&self, record: JobRecord) -> Result<(), JobRepoError> {
        use dashmap::mapref::entry::Entry;

        match self.jobs.entry(record.id) {
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(())
            }
            Entry::Occupied(occupied) => Err(JobRepoError::Duplicate { id: *occupied.key() }),
        }
    }

    fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.get(&id).map(|record| record.value().clone())
    }

    fn update(
        &self,
        id: Uuid,
        apply: &mut dyn FnMut(&mut JobRecord) -> bool,
    ) -> Option<JobRecord> {
        let mut record = self.jobs.get_mut(&id)?;
        if apply(record.value_mut()) {
            record.touch();
        }
        Some(record.value().clone())
    }

    fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .iter()
            .map(|record| record.value().clone())
            .collect();
        records.sort_by_key(|record| record.created_at);
        records
    }

    fn evict_idle(&self, now: Instant, ttl: Duration) -> Vec<JobRecord> {
        let stale: Vec<Uuid> = self
            .jobs
            .iter()
            .filter(|record| now.saturating_duration_since(record.last_activity) > ttl)
            .map(|record| *record.key())
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.jobs.remove(&id).map(|(_, record)| record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::JobKind;

    #[tokio::test(start_paused = true)]
    async fn idle_records_are_evicted_and_updates_keep_records_alive() {
        let repo = InMemoryJobRepository::new();
        let idle = JobRecord::new(Uuid::new_v4(), JobKind::Generate, 1);
        let busy = JobRecord::new(Uuid::new_v4(), JobKind::Send, 1);
        let (idle_id, busy_id) = (idle.id, busy.id);
        repo.insert(idle).expect("insert idle");
        repo.insert(busy).expect("insert busy");

        tokio::time::advance(Duration::from_secs(50)).await;
        repo.update(busy_id, &mut |record| record.advance(1, "row 1"))
            .expect("busy exists");
        tokio::time::advance(Duration::from_secs(20)).await;

        let evicted = repo.evict_idle(Instant::now(), Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, idle_id);
        assert!(repo.get(idle_id).is_none());
        assert!(repo.get(busy_id).is_some());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let repo = InMemoryJobRepository::new();
        let record = JobRecord::new(Uuid::new_v4(), JobKind::Generate, 1);
        repo.insert(record.clone()).expect("first");
        assert!(matches!(
            repo.insert(record),
            Err(JobRepoError::Duplicate { .. })
        ));
        assert!(repo.update(Uuid::new_v4(), &mut |_| true).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn updates_that_change_nothing_do_not_delay_eviction() {
        let repo = InMemoryJobRepository::new();
        let record = JobRecord::new(Uuid::new_v4(), JobKind::Generate, 1);
        let id = record.id;
        repo.insert(record).expect("insert");
        repo.update(id, &mut |record| record.mark_paused())
            .expect("exists");

        // Re-pausing and failing a terminal job are not activity.
        tokio::time::advance(Duration::from_secs(50)).await;
        let snapshot = repo
            .update(id, &mut |record| record.mark_paused())
            .expect("exists");
        assert_eq!(snapshot.status, crate::domain::types::JobStatus::Paused);
        repo.update(id, &mut |record| record.fail("boom")).expect("exists");
        tokio::time::advance(Duration::from_secs(50)).await;
        repo.update(id, &mut |record| record.fail("late")).expect("exists");
        tokio::time::advance(Duration::from_secs(20)).await;

        let evicted = repo.evict_idle(Instant::now(), Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].error.as_deref(), Some("boom"));
    }
}
