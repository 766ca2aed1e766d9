//! Connection lifecycle and job submission

use super::api::{Credentials, JobProperties, SchedulerApi, ServerVersion, REQUIRED_SERVER_VERSION};
use crate::error::{Result, SpoolError};
use crate::graph::JobGraph;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a submission stands with respect to the head node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection opened yet
    Disconnected,
    /// Connected, version not yet checked
    Connected,
    /// Version matches; remote objects may be created
    VersionChecked,
    /// Job queued on the cluster
    Submitted,
    /// Connection released
    Closed,
}

/// Connection parameters for one head node
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Head node host name
    pub host: String,
    /// Exact scheduler version required
    pub required_version: ServerVersion,
    /// Bound on establishing the connection
    pub connect_timeout: Duration,
    /// Bound on the submit call
    pub submit_timeout: Duration,
    /// Run-as account
    pub credentials: Credentials,
}

impl ClientSettings {
    /// Settings for `host` with default timeouts and the current user
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim().to_string(),
            required_version: REQUIRED_SERVER_VERSION,
            connect_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(120),
            credentials: Credentials::default(),
        }
    }
}

/// A job accepted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Scheduler job id
    pub id: u64,
    /// Head node that accepted the job
    pub host: String,
    /// Display name
    pub name: String,
    /// Spooler job id
    pub uuid: String,
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} on {}", self.id, self.host)
    }
}

/// Anything that can take a job graph to the cluster
pub trait JobSubmitter {
    /// Submit `graph`, returning the scheduler's handle
    fn submit(&mut self, graph: &JobGraph) -> Result<JobHandle>;
}

/// Submits job graphs through a [`SchedulerApi`], one connection per job
pub struct SchedulerClient<A> {
    api: A,
    settings: ClientSettings,
    state: ConnectionState,
}

/// Closes the connection when dropped, on every exit path
struct Connection<'a, A: SchedulerApi> {
    api: &'a mut A,
    state: &'a mut ConnectionState,
    host: &'a str,
}

impl<A: SchedulerApi> Drop for Connection<'_, A> {
    fn drop(&mut self) {
        if *self.state != ConnectionState::Closed {
            self.api.close();
            tracing::debug!("Closed connection to {} from state {:?}", self.host, self.state);
            *self.state = ConnectionState::Closed;
        }
    }
}

impl<A: SchedulerApi> SchedulerClient<A> {
    /// Create a client
    pub fn new(api: A, settings: ClientSettings) -> Self {
        Self {
            api,
            settings,
            state: ConnectionState::Disconnected,
        }
    }

    /// Connection settings
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// State after the last call
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The wrapped adapter
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Consume the client, returning the adapter
    pub fn into_api(self) -> A {
        self.api
    }

    /// Connect, check the version, create the job and its tasks, and submit
    pub fn submit(&mut self, graph: &JobGraph) -> Result<JobHandle> {
        let settings = &self.settings;
        let host = settings.host.as_str();
        self.state = ConnectionState::Disconnected;

        let conn = Connection {
            api: &mut self.api,
            state: &mut self.state,
            host,
        };

        tracing::info!("Connecting to cluster at: {}", host);
        conn.api.connect(host, settings.connect_timeout).map_err(|e| {
            tracing::error!("Unable to reach cluster head node: {}: {}", host, e);
            SpoolError::connect(host, e.to_string())
        })?;
        *conn.state = ConnectionState::Connected;

        let actual = conn.api.server_version().map_err(|e| {
            tracing::error!("Unable to read scheduler version from {}: {}", host, e);
            SpoolError::connect(host, format!("version query failed: {}", e))
        })?;
        if actual != settings.required_version {
            tracing::error!(
                "HPC API mismatch on {}: got {}, but required {}",
                host,
                actual,
                settings.required_version
            );
            return Err(SpoolError::VersionMismatch {
                host: host.to_string(),
                actual: actual.to_string(),
                required: settings.required_version.to_string(),
            });
        }
        *conn.state = ConnectionState::VersionChecked;

        let submit_error = |stage: &str, e: super::api::ApiError| {
            tracing::error!(
                "{} failed for job '{}' ({}) on {}: {}",
                stage,
                graph.name,
                graph.uuid,
                host,
                e
            );
            SpoolError::Submit {
                host: host.to_string(),
                job: graph.name.clone(),
                uuid: graph.uuid.clone(),
                message: format!("{}: {}", stage, e),
            }
        };

        let job = conn
            .api
            .create_job(&JobProperties::from(graph))
            .map_err(|e| submit_error("create job", e))?;
        for task in &graph.tasks {
            conn.api
                .create_task(job, task)
                .map_err(|e| submit_error("create task", e))?;
        }
        let id = conn
            .api
            .submit_job(job, &settings.credentials, settings.submit_timeout)
            .map_err(|e| submit_error("submit job", e))?;
        *conn.state = ConnectionState::Submitted;

        tracing::info!("Submitted job {} to {}.", id, host);
        Ok(JobHandle {
            id,
            host: host.to_string(),
            name: graph.name.clone(),
            uuid: graph.uuid.clone(),
        })
    }
}

impl<A: SchedulerApi> JobSubmitter for SchedulerClient<A> {
    fn submit(&mut self, graph: &JobGraph) -> Result<JobHandle> {
        SchedulerClient::submit(self, graph)
    }
}
