//! Scheduler adapter that records instead of submitting

use super::api::{
    ApiError, ApiResult, Credentials, JobProperties, RemoteJobId, SchedulerApi, ServerVersion,
    REQUIRED_SERVER_VERSION,
};
use crate::graph::Task;
use std::time::Duration;

/// A job captured by [`DryRunScheduler`]
#[derive(Debug, Clone)]
pub struct RecordedJob {
    /// Assigned id
    pub id: RemoteJobId,
    /// Job-level properties
    pub properties: JobProperties,
    /// Tasks in creation order
    pub tasks: Vec<Task>,
    /// Whether submit was called
    pub submitted: bool,
}

/// Accepts everything, logs what a real scheduler would receive
#[derive(Debug, Default)]
pub struct DryRunScheduler {
    host: Option<String>,
    next_id: u64,
    jobs: Vec<RecordedJob>,
}

impl DryRunScheduler {
    /// Create a dry-run scheduler whose first job id is 1
    pub fn new() -> Self {
        Self {
            host: None,
            next_id: 1,
            jobs: Vec::new(),
        }
    }

    /// Jobs captured so far
    pub fn jobs(&self) -> &[RecordedJob] {
        &self.jobs
    }

    fn job_mut(&mut self, id: RemoteJobId) -> ApiResult<&mut RecordedJob> {
        self.jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| ApiError::new(format!("unknown job {}", id)))
    }
}

impl SchedulerApi for DryRunScheduler {
    fn connect(&mut self, host: &str, _timeout: Duration) -> ApiResult<()> {
        tracing::info!("[dry-run] connect to {}", host);
        self.host = Some(host.to_string());
        Ok(())
    }

    fn server_version(&mut self) -> ApiResult<ServerVersion> {
        Ok(REQUIRED_SERVER_VERSION)
    }

    fn create_job(&mut self, properties: &JobProperties) -> ApiResult<RemoteJobId> {
        if self.host.is_none() {
            return Err(ApiError::new("not connected"));
        }
        let id = RemoteJobId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        tracing::info!(
            "[dry-run] job {} '{}' unit type {} exclusive {}",
            id,
            properties.name,
            properties.unit_type,
            properties.exclusive
        );
        self.jobs.push(RecordedJob {
            id,
            properties: properties.clone(),
            tasks: Vec::new(),
            submitted: false,
        });
        Ok(id)
    }

    fn create_task(&mut self, job: RemoteJobId, task: &Task) -> ApiResult<()> {
        tracing::info!("[dry-run] job {} task [{}] {}: {}", job, task.kind, task.name, task.command_line);
        self.job_mut(job)?.tasks.push(task.clone());
        Ok(())
    }

    fn submit_job(&mut self, job: RemoteJobId, credentials: &Credentials, _timeout: Duration) -> ApiResult<u64> {
        let user = credentials.user.as_deref().unwrap_or("<current user>");
        tracing::info!("[dry-run] submit job {} as {}", job, user);
        self.job_mut(job)?.submitted = true;
        Ok(job.0)
    }

    fn close(&mut self) {
        self.host = None;
    }
}
