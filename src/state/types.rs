use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One tracked download request and its evolving state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub percent: f32,
    pub filename: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Finished,
    Error,
}

impl Job {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Processing,
            percent: 0.0,
            filename: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Terminal jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Finished | JobStatus::Error)
    }

    pub fn update_progress(&mut self, percent: f32) {
        if self.is_terminal() {
            return;
        }
        self.percent = percent.clamp(0.0, 100.0);
    }

    pub fn finish(&mut self, filename: String) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Finished;
        self.percent = 100.0;
        self.filename = Some(filename);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &str) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Error;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}
