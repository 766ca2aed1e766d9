//! Job description module
//!
//! Provides the typed job description ([`JobSpec`]) parsed from flat job files,
//! the renderer set, and the timestamp-based job identity.

mod identity;
mod renderer;
mod spec;

pub use identity::{Clock, FixedClock, IdentityGenerator, SystemClock};
pub use renderer::{Renderer, UnitType};
pub use spec::{JobSpec, DEFAULT_STEP, DEFAULT_THREADS};
