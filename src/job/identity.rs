//! Job identity generation
//!
//! Job ids are the submission timestamp at second resolution with every
//! separator removed, so `2024-01-02 03:04:05` becomes `20240102030405`. They
//! sort chronologically and are safe in file names and shell arguments. Two
//! submissions in the same second share an id.

use chrono::{Local, NaiveDateTime};

/// Source of the current time
pub trait Clock {
    /// Current local time
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the submitting machine's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Produces job ids from a clock
pub struct IdentityGenerator {
    clock: Box<dyn Clock>,
}

impl IdentityGenerator {
    /// Generator backed by the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Generator backed by an arbitrary clock
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }

    /// Create a new job id
    pub fn new_id(&self) -> String {
        format_id(self.clock.now())
    }
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityGenerator").finish_non_exhaustive()
    }
}

fn format_id(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M:%S")
        .to_string()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != ':')
        .collect()
}
