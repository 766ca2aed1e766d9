//! Task graph construction
//!
//! Every job becomes exactly three tasks: node preparation, the parametric
//! render sweep, and node release. Release undoes the drive mapping made by
//! preparation and runs whether or not the sweep succeeded.

mod builder;
mod task;
mod template;

pub use builder::{BuildSettings, TaskGraphBuilder, DEFAULT_MAX_THREADS, DEFAULT_NODE_JOB_DIR};
pub use task::{
    CoreBounds, Dependency, IoRedirect, JobGraph, SweepRange, Task, TaskKind, Trigger,
};
pub use template::{render_template, CLEANUP_TEMPLATE, SETUP_TEMPLATE};
