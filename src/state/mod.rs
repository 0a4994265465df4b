mod types;

pub use types::*;

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// In-memory job registry.
///
/// Owns every [`Job`] for the lifetime of the process. Handlers and workers
/// only ever see cloned snapshots; all mutation goes through the methods
/// below so that a terminal transition (status + filename/error + percent)
/// is a single write-lock acquisition and can never be observed torn.
pub struct AppState {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
        })
    }

    /// Create a new job in `processing` state and return a snapshot of it.
    pub fn create_job(&self) -> Job {
        let job = Job::new();
        let mut jobs = self.jobs.write();
        jobs.insert(job.id, job.clone());
        job
    }

    /// Get a snapshot of a job by ID.
    pub fn get_job(&self, id: Uuid) -> Option<Job> {
        let jobs = self.jobs.read();
        jobs.get(&id).cloned()
    }

    /// Update download progress. Ignored for unknown ids and terminal jobs.
    pub fn update_percent(&self, id: Uuid, percent: f32) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&id) {
            job.update_progress(percent);
        }
    }

    /// Mark a job as finished with the produced artifact name.
    pub fn finish_job(&self, id: Uuid, filename: String) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&id) {
            job.finish(filename);
        }
    }

    /// Mark a job as failed with a descriptive message.
    pub fn fail_job(&self, id: Uuid, error: &str) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&id) {
            job.fail(error);
        }
    }

    /// Remove terminal jobs whose completion is older than `retention`.
    ///
    /// Returns the number of jobs removed. In-flight jobs are never touched.
    pub fn sweep_terminal(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(retention).unwrap_or_default();
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| match job.completed_at {
            Some(done) if job.is_terminal() => done > cutoff,
            _ => true,
        });
        before - jobs.len()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }
}

/// Periodically evict old terminal jobs so the registry doesn't grow without
/// bound over the process lifetime.
pub fn start_sweep_task(
    state: Arc<AppState>,
    interval_secs: u64,
    retention: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let removed = state.sweep_terminal(retention);
            if removed > 0 {
                tracing::debug!("Swept {} completed jobs from registry", removed);
            }
        }
    })
}
