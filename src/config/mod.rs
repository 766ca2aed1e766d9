//! Configuration for the spooler binary
//!
//! Command-line arguments and environment variables are parsed into
//! [`CliArgs`] and resolved into a [`SpoolConfig`].

mod settings;

pub use settings::{CliArgs, LogFormat, SpoolConfig};
