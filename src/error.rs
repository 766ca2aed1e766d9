//! Error types for hpc-spool
//!
//! Every stage of the spooling pipeline reports through [`SpoolError`]. Errors
//! raised before the scheduler is contacted are validation problems the user
//! can fix; errors raised by the scheduler client carry the host, job name and
//! uuid so a partially created job can be tracked down by hand.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for spooling operations
#[derive(Error, Debug)]
pub enum SpoolError {
    /// The job configuration file does not exist
    #[error("Unable to locate job file '{0}'")]
    ConfigNotFound(PathBuf),

    /// A known key could not be coerced to its type, or a value is malformed
    #[error("Invalid value for '{key}': {message}")]
    Parse {
        /// Offending key
        key: String,
        /// What is wrong with its value
        message: String,
    },

    /// A key needed to build the task graph was never set
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// A path could not be mapped to a network share
    #[error("Unable to resolve a network share for '{path}': {reason}")]
    UnresolvedPath {
        /// Path as given
        path: String,
        /// Why no share matched
        reason: String,
    },

    /// A command template still contains a placeholder after substitution
    #[error("Command template for {template} has no value for '{{{placeholder}}}'")]
    IncompleteTemplate {
        /// Template name
        template: String,
        /// Placeholder left without a value
        placeholder: String,
    },

    /// Frame step is zero or negative
    #[error("Frame step must be a positive integer, got {0}")]
    InvalidStep(i64),

    /// Submission form failed validation
    #[error("Invalid submission: {0}")]
    Validation(String),

    /// HEAD_NODE is not set
    #[error("HEAD_NODE is not set - please set HEAD_NODE")]
    MissingHeadNode,

    /// The head node could not be reached
    #[error("Unable to reach cluster head node '{host}': {message}")]
    Connect {
        /// Head node
        host: String,
        /// Underlying failure
        message: String,
    },

    /// The head node runs an unsupported scheduler version
    #[error("HPC API mismatch on '{host}': got {actual}, but required {required}")]
    VersionMismatch {
        /// Head node
        host: String,
        /// Version the head node reported
        actual: String,
        /// Version this build talks to
        required: String,
    },

    /// The scheduler rejected or failed the job after the version check
    #[error("Submission of job '{job}' ({uuid}) to '{host}' failed: {message}")]
    Submit {
        /// Head node
        host: String,
        /// Job display name
        job: String,
        /// Spooler job id
        uuid: String,
        /// Stage and underlying failure
        message: String,
    },

    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Audit copy could not be written or read
    #[error("Audit record error: {0}")]
    Audit(String),
}

impl SpoolError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error for a configuration key
    pub fn parse(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an unresolved path error
    pub fn unresolved(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection error
    pub fn connect(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Check if this error is worth retrying later without changing the job
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }

    /// Check if this error was raised before the scheduler was contacted
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_)
                | Self::Parse { .. }
                | Self::MissingField(_)
                | Self::UnresolvedPath { .. }
                | Self::IncompleteTemplate { .. }
                | Self::InvalidStep(_)
                | Self::Validation(_)
        )
    }

    /// Process exit code for the standalone spooler
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingHeadNode => 1,
            Self::Connect { .. } => 2,
            Self::VersionMismatch { .. } | Self::Submit { .. } => 5,
            e if e.is_validation_error() => 4,
            _ => 5,
        }
    }
}

/// Result type alias for spooling operations
pub type Result<T> = std::result::Result<T, SpoolError>;

impl From<serde_json::Error> for SpoolError {
    fn from(err: serde_json::Error) -> Self {
        SpoolError::Audit(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| SpoolError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(SpoolError::MissingHeadNode.exit_code(), 1);
        assert_eq!(SpoolError::connect("head", "refused").exit_code(), 2);
        assert_eq!(SpoolError::MissingField("scene").exit_code(), 4);
        assert_eq!(SpoolError::InvalidStep(0).exit_code(), 4);
        let mismatch = SpoolError::VersionMismatch {
            host: "head".into(),
            actual: "4.0.0.0".into(),
            required: "3.0.2369.0".into(),
        };
        assert_eq!(mismatch.exit_code(), 5);
    }

    #[test]
    fn test_recoverability() {
        assert!(SpoolError::connect("head", "timed out").is_recoverable());
        assert!(!SpoolError::InvalidStep(-1).is_recoverable());
    }

    #[test]
    fn test_incomplete_template_message() {
        let err = SpoolError::IncompleteTemplate {
            template: "max".into(),
            placeholder: "scene".into(),
        };
        assert_eq!(
            err.to_string(),
            "Command template for max has no value for '{scene}'"
        );
    }

    #[test]
    fn test_submit_error_names_host_job_and_uuid() {
        let err = SpoolError::Submit {
            host: "head".into(),
            job: "Shot010".into(),
            uuid: "20240102030405".into(),
            message: "submit job: access denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "Submission of job 'Shot010' (20240102030405) to 'head' failed: submit job: access denied"
        );
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Result<()> = Err(io_err).with_path("/jobs/a.ini");
        match err {
            Err(SpoolError::Io { path, .. }) => assert_eq!(path, PathBuf::from("/jobs/a.ini")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
