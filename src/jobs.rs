//! Job manager: an in-process registry of processing jobs with a state
//! machine, progress reporting, and cooperative cancellation.
//!
//! The processor stays synchronous; the manager is the asynchronous facade
//! that drives it on blocking tasks and publishes status.

use crate::error::{Error, Result};
use crate::models::processing::{BatchProcessingResult, ProcessingResult};
use crate::models::profile::RedactionProfile;
use crate::processor::{CancelFlag, DocumentProcessor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Kind of work a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SingleDocument,
    BatchProcessing,
}

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Result payload attached to a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    Single(Box<ProcessingResult>),
    Batch(Box<BatchProcessingResult>),
}

/// An externally addressable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier
    pub job_id: Uuid,
    /// Kind of work
    pub job_type: JobType,
    /// Current lifecycle state
    pub status: JobStatus,
    /// Progress in `[0, 100]`
    pub progress: f64,
    /// Stage currently executing, for status displays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job started running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Result payload, present only in `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Error string, present only in `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    fn new(job_type: JobType) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            job_type,
            status: JobStatus::Pending,
            progress: 0.0,
            step: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Redacted output of a completed single-document job.
    pub fn output_path(&self) -> Option<PathBuf> {
        if self.status != JobStatus::Completed {
            return None;
        }
        match &self.result {
            Some(JobResult::Single(result)) => result.output_path.clone(),
            _ => None,
        }
    }
}

/// Registry of jobs guarded by one mutex; per-job cancellation flags are
/// shared with the processor driving the work.
pub struct JobManager {
    jobs: Mutex<JobTable>,
}

struct JobTable {
    by_id: HashMap<Uuid, Job>,
    order: Vec<Uuid>,
    cancel_flags: HashMap<Uuid, CancelFlag>,
}

impl JobManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(JobTable {
                by_id: HashMap::new(),
                order: Vec::new(),
                cancel_flags: HashMap::new(),
            }),
        }
    }

    fn with_table<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut JobTable) -> T,
    {
        let mut table = self.jobs.lock().expect("job table lock poisoned");
        f(&mut table)
    }

    /// Create a pending job and return its ID.
    pub fn create_job(&self, job_type: JobType) -> Uuid {
        let job = Job::new(job_type);
        let id = job.job_id;
        self.with_table(|table| {
            table.by_id.insert(id, job);
            table.order.push(id);
        });
        id
    }

    /// Associate a cancellation flag with a job.
    pub fn attach_cancel_flag(&self, job_id: Uuid, flag: CancelFlag) {
        self.with_table(|table| {
            table.cancel_flags.insert(job_id, flag);
        });
    }

    /// Snapshot of one job.
    pub fn get_job(&self, job_id: Uuid) -> Option<Job> {
        self.with_table(|table| table.by_id.get(&job_id).cloned())
    }

    /// Jobs in reverse-chronological creation order.
    pub fn list_jobs(&self, limit: usize, offset: usize) -> Vec<Job> {
        self.with_table(|table| {
            table
                .order
                .iter()
                .rev()
                .skip(offset)
                .take(limit)
                .filter_map(|id| table.by_id.get(id).cloned())
                .collect()
        })
    }

    /// Number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.with_table(|table| table.by_id.len())
    }

    /// Transition a pending job to running.
    pub fn start_job(&self, job_id: Uuid) -> Result<()> {
        self.with_table(|table| {
            let job = table
                .by_id
                .get_mut(&job_id)
                .ok_or_else(|| Error::Internal(format!("unknown job {}", job_id)))?;
            if job.status != JobStatus::Pending {
                return Err(Error::Internal(format!(
                    "job {} cannot start from {:?}",
                    job_id, job.status
                )));
            }
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Complete a running job: progress snaps to 100 and the completion
    /// time is recorded. A no-op for jobs already terminal (e.g. cancelled
    /// while the final stage drained).
    pub fn complete_job(&self, job_id: Uuid, result: JobResult) {
        self.with_table(|table| {
            if let Some(job) = table.by_id.get_mut(&job_id) {
                if job.status.is_terminal() {
                    return;
                }
                job.status = JobStatus::Completed;
                job.progress = 100.0;
                job.result = Some(result);
                job.completed_at = Some(Utc::now());
            }
        });
    }

    /// Fail a running job with a non-empty error string.
    pub fn fail_job(&self, job_id: Uuid, error: impl Into<String>) {
        self.with_table(|table| {
            if let Some(job) = table.by_id.get_mut(&job_id) {
                if job.status.is_terminal() {
                    return;
                }
                job.status = JobStatus::Failed;
                job.error = Some(error.into());
                job.completed_at = Some(Utc::now());
            }
        });
    }

    /// Cancel a pending or running job.
    ///
    /// Returns `false` from a terminal state. For running jobs the shared
    /// flag is raised so inflight stages finish and stop cooperatively.
    pub fn cancel_job(&self, job_id: Uuid) -> bool {
        self.with_table(|table| {
            let Some(job) = table.by_id.get_mut(&job_id) else {
                return false;
            };
            if job.status.is_terminal() {
                return false;
            }
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
            if let Some(flag) = table.cancel_flags.get(&job_id) {
                flag.cancel();
            }
            info!("Job {} cancelled", job_id);
            true
        })
    }

    /// Update progress, clamped to `[0, 100]`. Progress never decreases.
    pub fn update_progress(&self, job_id: Uuid, progress: f64) {
        self.with_table(|table| {
            if let Some(job) = table.by_id.get_mut(&job_id) {
                if !job.status.is_terminal() {
                    job.progress = job.progress.max(progress.clamp(0.0, 100.0));
                }
            }
        });
    }

    /// Record the stage a job is currently in.
    pub fn set_step(&self, job_id: Uuid, step: impl Into<String>) {
        self.with_table(|table| {
            if let Some(job) = table.by_id.get_mut(&job_id) {
                if !job.status.is_terminal() {
                    job.step = Some(step.into());
                }
            }
        });
    }

    /// Submit and drive a single-document job on a blocking task.
    pub async fn run_single_document(
        self: &Arc<Self>,
        processor: Arc<DocumentProcessor>,
        path: PathBuf,
        profile: RedactionProfile,
    ) -> Uuid {
        let job_id = self.create_job(JobType::SingleDocument);
        self.attach_cancel_flag(job_id, processor.cancel_flag());
        self.spawn_job(job_id, move || {
            let result = processor.process_document(&path, &profile);
            let success = result.success;
            let cancelled = result.status == crate::models::processing::ProcessingStatus::Cancelled;
            let error = result.errors.first().cloned();
            (JobResult::Single(Box::new(result)), success, cancelled, error)
        })
        .await;
        job_id
    }

    /// Submit and drive a batch job on a blocking task.
    pub async fn run_batch(
        self: &Arc<Self>,
        processor: Arc<DocumentProcessor>,
        input_dir: PathBuf,
        profile: RedactionProfile,
        recursive: bool,
    ) -> Uuid {
        let job_id = self.create_job(JobType::BatchProcessing);
        self.attach_cancel_flag(job_id, processor.cancel_flag());
        self.spawn_job(job_id, move || {
            let batch = processor.batch_process(&input_dir, &profile, recursive, true);
            let success = batch.statistics.failed == 0 && batch.statistics.cancelled == 0;
            let cancelled = batch.statistics.cancelled > 0;
            let error = (!success && !cancelled)
                .then(|| format!("{} documents failed", batch.statistics.failed));
            (JobResult::Batch(Box::new(batch)), success, cancelled, error)
        })
        .await;
        job_id
    }

    async fn spawn_job<F>(self: &Arc<Self>, job_id: Uuid, work: F)
    where
        F: FnOnce() -> (JobResult, bool, bool, Option<String>) + Send + 'static,
    {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if manager.start_job(job_id).is_err() {
                // Cancelled before it ever ran.
                return;
            }
            manager.set_step(job_id, "processing");
            manager.update_progress(job_id, 5.0);

            let outcome = tokio::task::spawn_blocking(work).await;
            match outcome {
                Ok((result, success, cancelled, error)) => {
                    if cancelled {
                        manager.cancel_job(job_id);
                    } else if success {
                        manager.complete_job(job_id, result);
                    } else {
                        manager
                            .fail_job(job_id, error.unwrap_or_else(|| "processing failed".into()));
                    }
                }
                Err(e) => {
                    warn!("Job {} worker panicked: {}", job_id, e);
                    manager.fail_job(job_id, format!("worker panic: {}", e));
                }
            }
        });
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::detection::HybridDetectionEngine;
    use pretty_assertions::assert_eq;

    fn manager() -> JobManager {
        JobManager::new()
    }

    #[test]
    fn test_create_and_get() {
        let m = manager();
        let id = m.create_job(JobType::SingleDocument);
        let job = m.get_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert_eq!(m.job_count(), 1);
        assert!(m.get_job(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_state_machine_happy_path() {
        let m = manager();
        let id = m.create_job(JobType::SingleDocument);

        m.start_job(id).unwrap();
        assert_eq!(m.get_job(id).unwrap().status, JobStatus::Running);

        m.complete_job(
            id,
            JobResult::Single(Box::new(ProcessingResult::new("/tmp/x.pdf"))),
        );
        let job = m.get_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_cancel_transitions() {
        let m = manager();

        // Pending jobs cancel directly.
        let pending = m.create_job(JobType::SingleDocument);
        assert!(m.cancel_job(pending));
        assert_eq!(m.get_job(pending).unwrap().status, JobStatus::Cancelled);

        // Running jobs cancel and raise the shared flag.
        let running = m.create_job(JobType::SingleDocument);
        let flag = CancelFlag::new();
        m.attach_cancel_flag(running, flag.clone());
        m.start_job(running).unwrap();
        assert!(m.cancel_job(running));
        assert!(flag.is_cancelled());

        // Cancel from a terminal state is a no-op returning false.
        assert!(!m.cancel_job(pending));
        assert!(!m.cancel_job(running));
    }

    #[test]
    fn test_complete_after_cancel_is_noop() {
        let m = manager();
        let id = m.create_job(JobType::SingleDocument);
        m.start_job(id).unwrap();
        m.cancel_job(id);

        m.complete_job(
            id,
            JobResult::Single(Box::new(ProcessingResult::new("/tmp/x.pdf"))),
        );
        assert_eq!(m.get_job(id).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_failed_job_has_error() {
        let m = manager();
        let id = m.create_job(JobType::BatchProcessing);
        m.start_job(id).unwrap();
        m.fail_job(id, "decode exploded");

        let job = m.get_job(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("decode exploded"));
        assert!(job.output_path().is_none());
    }

    #[test]
    fn test_progress_clamped_and_monotonic() {
        let m = manager();
        let id = m.create_job(JobType::SingleDocument);
        m.start_job(id).unwrap();

        m.update_progress(id, 150.0);
        assert_eq!(m.get_job(id).unwrap().progress, 100.0);

        // Progress never decreases
        m.update_progress(id, 40.0);
        assert_eq!(m.get_job(id).unwrap().progress, 100.0);

        let id2 = m.create_job(JobType::SingleDocument);
        m.update_progress(id2, -10.0);
        assert_eq!(m.get_job(id2).unwrap().progress, 0.0);
    }

    #[test]
    fn test_list_reverse_chronological() {
        let m = manager();
        let first = m.create_job(JobType::SingleDocument);
        let second = m.create_job(JobType::SingleDocument);
        let third = m.create_job(JobType::BatchProcessing);

        let listed = m.list_jobs(10, 0);
        assert_eq!(
            listed.iter().map(|j| j.job_id).collect::<Vec<_>>(),
            vec![third, second, first]
        );

        let page = m.list_jobs(1, 1);
        assert_eq!(page[0].job_id, second);
    }

    #[tokio::test]
    async fn test_run_single_document_job() {
        use image::{Rgb, RgbImage};

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("job.png");
        RgbImage::from_pixel(64, 64, Rgb([255u8, 255, 255]))
            .save(&input)
            .unwrap();

        let config = EngineConfig::default();
        let processor = Arc::new(DocumentProcessor::new(
            config.clone(),
            Some(HybridDetectionEngine::from_engine_config(&config)),
            None,
        ));
        let manager = Arc::new(JobManager::new());

        let profile = RedactionProfile::named("empty-rules");
        let job_id = manager
            .run_single_document(processor, input, profile)
            .await;

        // Poll until the spawned task drives the job to a terminal state.
        for _ in 0..200 {
            if manager.get_job(job_id).unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let job = manager.get_job(job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert!(job.output_path().is_some());
    }
}
