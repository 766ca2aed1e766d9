//! Remote scheduler RPC surface

use crate::graph::{JobGraph, Task};
use crate::job::UnitType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Scheduler version the spooler was written against
pub const REQUIRED_SERVER_VERSION: ServerVersion = ServerVersion::new(3, 0, 2369, 0);

/// Four-part scheduler version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    /// Major
    pub major: u32,
    /// Minor
    pub minor: u32,
    /// Build
    pub build: u32,
    /// Revision
    pub revision: u32,
}

impl ServerVersion {
    /// Create a version
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

impl FromStr for ServerVersion {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        let parts: Vec<u32> = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ApiError::new(format!("invalid version '{}'", s.trim())))?;

        match parts.as_slice() {
            [major, minor, build, revision] => Ok(Self::new(*major, *minor, *build, *revision)),
            _ => Err(ApiError::new(format!("invalid version '{}'", s.trim()))),
        }
    }
}

/// Failure reported by a scheduler adapter
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    message: String,
}

impl ApiError {
    /// Create an error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type for scheduler adapters
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Job-level properties set at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProperties {
    /// Display name
    pub name: String,
    /// Scheduling granularity
    pub unit_type: UnitType,
    /// No co-scheduling with other jobs
    pub exclusive: bool,
}

impl From<&JobGraph> for JobProperties {
    fn from(graph: &JobGraph) -> Self {
        Self {
            name: graph.name.clone(),
            unit_type: graph.unit_type,
            exclusive: graph.exclusive,
        }
    }
}

/// Scheduler-assigned job id before submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteJobId(pub u64);

impl fmt::Display for RemoteJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run-as account; `None` submits as the current user
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Account name
    pub user: Option<String>,
    /// Account password
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The scheduler's job API
///
/// Implementations own one connection. Calls arrive in order: `connect`,
/// `server_version`, `create_job`, one `create_task` per task, `submit_job`,
/// and `close` last, which may also follow any earlier call that failed.
pub trait SchedulerApi {
    /// Open a connection to the head node
    fn connect(&mut self, host: &str, timeout: Duration) -> ApiResult<()>;

    /// Version reported by the connected scheduler
    fn server_version(&mut self) -> ApiResult<ServerVersion>;

    /// Create an empty job
    fn create_job(&mut self, properties: &JobProperties) -> ApiResult<RemoteJobId>;

    /// Attach a task to a job
    fn create_task(&mut self, job: RemoteJobId, task: &Task) -> ApiResult<()>;

    /// Queue the job, returning its final id
    fn submit_job(&mut self, job: RemoteJobId, credentials: &Credentials, timeout: Duration) -> ApiResult<u64>;

    /// Release the connection
    fn close(&mut self);
}
