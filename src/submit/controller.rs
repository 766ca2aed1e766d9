//! Owner of the open submission form

use super::form::SubmissionForm;
use crate::error::{Result, SpoolError};
use crate::paths::{file_stem, ShareLookup};
use crate::scheduler::JobSubmitter;
use crate::spool::{SpoolOutcome, Spooler};
use std::path::{Path, PathBuf};

/// Result of a front-end submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Job file written to the job script directory
    pub job_file: PathBuf,
    /// What the spooler submitted
    pub outcome: SpoolOutcome,
}

/// Holds at most one open form and submits it through a [`Spooler`]
///
/// Opening a form replaces the previous one, matching a submit window that
/// is rebuilt whenever a new scene is opened.
pub struct SubmitController<L, S> {
    spooler: Spooler<L, S>,
    job_dir: PathBuf,
    form: Option<SubmissionForm>,
}

impl<L: ShareLookup, S: JobSubmitter> SubmitController<L, S> {
    /// Controller writing job files into `job_dir`
    pub fn new(spooler: Spooler<L, S>, job_dir: impl Into<PathBuf>) -> Self {
        Self {
            spooler,
            job_dir: job_dir.into(),
            form: None,
        }
    }

    /// Directory job files are written to
    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// The spooler
    pub fn spooler(&self) -> &Spooler<L, S> {
        &self.spooler
    }

    /// Open `form`, discarding any form already open
    pub fn open(&mut self, form: SubmissionForm) -> &mut SubmissionForm {
        if let Some(old) = self.form.take() {
            tracing::debug!("Replacing open form for '{}'", old.scene);
        }
        self.form.insert(form)
    }

    /// Close the open form, if any
    pub fn close(&mut self) -> Option<SubmissionForm> {
        self.form.take()
    }

    /// The open form
    pub fn current(&self) -> Option<&SubmissionForm> {
        self.form.as_ref()
    }

    /// The open form, for editing
    pub fn current_mut(&mut self) -> Option<&mut SubmissionForm> {
        self.form.as_mut()
    }

    /// Write the open form as a job file and spool it
    ///
    /// The form stays open when anything fails so it can be corrected and
    /// submitted again; it is closed after a successful submission.
    pub fn submit(&mut self) -> Result<Submission> {
        let form = self
            .form
            .as_ref()
            .ok_or_else(|| SpoolError::Validation("no submission form is open".into()))?;

        tracing::info!("Validating submission for '{}'", form.scene);
        let spec = form.to_job_spec(
            self.spooler.identity_generator(),
            self.spooler.builder().resolver(),
        )?;

        let job_file = spec.write_job_file(&self.job_dir, file_stem(&form.scene))?;

        let outcome = self.spooler.spool_file(&job_file)?;
        self.form = None;
        Ok(Submission { job_file, outcome })
    }
}
