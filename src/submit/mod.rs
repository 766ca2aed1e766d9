//! Front-end submission support
//!
//! A submit window collects a [`SubmissionForm`], which becomes a job file in
//! the job script directory and is then spooled like any other job file.

mod controller;
mod form;

pub use controller::{Submission, SubmitController};
pub use form::{
    filter_title, maya_job_type, SubmissionForm, ALLOWED_PATH_PUNCTUATION, IMAGE_EXTENSIONS,
};
