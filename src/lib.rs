//! # hpc-spool - render job spooler for HPC Pack clusters
//!
//! hpc-spool turns a render job file into a three-task cluster job and submits
//! it to a Microsoft HPC Pack head node:
//!
//! 1. a node preparation task that maps the project share on every node,
//! 2. a parametric sweep that renders one frame per instance,
//! 3. a node release task that unmaps the share, even if rendering failed.
//!
//! ## Job files
//!
//! ```text
//! # Created for jdoe
//! renderer = maya_render_sw
//! name = shot010
//! scene = S:\projects\shot010\scenes\shot010.mb
//! output = \\fs01\output\jdoe\20240102030405
//! start = 1
//! end = 240
//! threads = 8
//! ```
//!
//! ## Spooling a job
//!
//! ```no_run
//! use hpcspool::graph::{BuildSettings, TaskGraphBuilder};
//! use hpcspool::paths::{NetUseLookup, PathResolver};
//! use hpcspool::scheduler::{ClientSettings, HpcPackCli, SchedulerClient};
//! use hpcspool::spool::Spooler;
//! use std::path::Path;
//!
//! let builder = TaskGraphBuilder::new(
//!     BuildSettings::from_env(),
//!     PathResolver::new(NetUseLookup::new()),
//! );
//! let client = SchedulerClient::new(HpcPackCli::new(), ClientSettings::new("headnode"));
//! let mut spooler = Spooler::new(builder, client);
//!
//! let outcome = spooler.spool_file(Path::new(r"D:\hpc\jdoe\scripts\job.ini")).unwrap();
//! println!("Submitted job {} ({})", outcome.job_id, outcome.uuid);
//! ```
//!
//! ## Building a graph without submitting
//!
//! ```
//! use hpcspool::prelude::*;
//!
//! let shares = StaticShareTable::new().with_share("S", r"\\fs01\projects");
//! let builder = TaskGraphBuilder::new(BuildSettings::new("jdoe"), PathResolver::new(shares));
//!
//! let spec = JobSpec::parse(
//!     "uuid = 1\nrenderer = max\nname = demo\nproject = S:\\demo.zip\n\
//!      scene = demo.max\noutput = \\\\fs01\\out\\demo.png\nstart = 1\nend = 10\n",
//! ).unwrap();
//! let graph = builder.build(&spec).unwrap();
//! assert_eq!(graph.tasks.len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod graph;
pub mod job;
pub mod paths;
pub mod scheduler;
pub mod spool;
pub mod submit;

// Re-export commonly used types
pub use error::{Result, SpoolError};
pub use graph::{JobGraph, TaskGraphBuilder};
pub use job::{JobSpec, Renderer};
pub use spool::{SpoolOutcome, Spooler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```rust
    //! use hpcspool::prelude::*;
    //! ```

    pub use crate::error::{Result, SpoolError};
    pub use crate::graph::{BuildSettings, JobGraph, Task, TaskGraphBuilder, TaskKind};
    pub use crate::job::{IdentityGenerator, JobSpec, Renderer, UnitType};
    pub use crate::paths::{NetUseLookup, PathResolver, ShareLookup, StaticShareTable};
    pub use crate::scheduler::{
        ClientSettings, DryRunScheduler, HpcPackCli, JobSubmitter, SchedulerApi, SchedulerClient,
    };
    pub use crate::spool::{AuditRecord, SpoolOutcome, Spooler};
    pub use crate::submit::{SubmissionForm, SubmitController};
}
