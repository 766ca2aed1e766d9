//! Cluster scheduler integration
//!
//! The scheduler's object-graph API is reached only through the narrow
//! [`SchedulerApi`] trait. [`SchedulerClient`] drives one submission through
//! connect, version check and submit, and always releases the connection.

mod api;
mod client;
mod dry_run;
mod hpcpack;

pub use api::{
    ApiError, ApiResult, Credentials, JobProperties, RemoteJobId, SchedulerApi, ServerVersion,
    REQUIRED_SERVER_VERSION,
};
pub use client::{ClientSettings, ConnectionState, JobHandle, JobSubmitter, SchedulerClient};
pub use dry_run::DryRunScheduler;
pub use hpcpack::{parse_created_job, parse_server_version, HpcPackCli, DEFAULT_SCHEDULER_PORT};
