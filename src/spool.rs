//! The spooling pipeline: parse, build, audit, submit

use crate::error::{IoResultExt, Result, SpoolError};
use crate::graph::{JobGraph, TaskGraphBuilder};
use crate::job::{IdentityGenerator, JobSpec};
use crate::paths::ShareLookup;
use crate::scheduler::JobSubmitter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What was submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolOutcome {
    /// Scheduler job id
    pub job_id: u64,
    /// Spooler job id
    pub uuid: String,
    /// Display name
    pub name: String,
}

/// JSON copy of a spooled job, kept for later inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Parsed job description
    pub spec: JobSpec,
    /// Graph handed to the scheduler
    pub graph: JobGraph,
    /// Submitting user
    pub submitted_by: String,
    /// Submitting host
    pub host: String,
    /// When the record was first written
    pub created_at: DateTime<Utc>,
    /// Scheduler job id, once submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<u64>,
}

impl AuditRecord {
    /// Record for a job about to be submitted
    pub fn new(spec: JobSpec, graph: JobGraph, submitted_by: impl Into<String>) -> Self {
        Self {
            spec,
            graph,
            submitted_by: submitted_by.into(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_default(),
            created_at: Utc::now(),
            job_id: None,
        }
    }

    /// Path of the record for `uuid` under `dir`
    pub fn path_in(dir: &Path, uuid: &str) -> PathBuf {
        dir.join(format!("{}.json", uuid))
    }

    /// Write `<uuid>.json` under `dir`, replacing any previous copy
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_path(dir)?;
        let path = Self::path_in(dir, self.spec.uuid());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json).with_path(&tmp)?;
        fs::rename(&tmp, &path).with_path(&path)?;
        Ok(path)
    }

    /// Load a record
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_path(path)?;
        serde_json::from_str(&content).map_err(|e| SpoolError::Audit(format!("{}: {}", path.display(), e)))
    }
}

/// Runs job files through graph construction and submission
pub struct Spooler<L, S> {
    builder: TaskGraphBuilder<L>,
    submitter: S,
    ids: IdentityGenerator,
    audit_dir: Option<PathBuf>,
}

impl<L: ShareLookup, S: JobSubmitter> Spooler<L, S> {
    /// Create a spooler
    pub fn new(builder: TaskGraphBuilder<L>, submitter: S) -> Self {
        Self {
            builder,
            submitter,
            ids: IdentityGenerator::new(),
            audit_dir: None,
        }
    }

    /// Keep a JSON copy of every job under `dir`
    pub fn with_audit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audit_dir = Some(dir.into());
        self
    }

    /// Use `ids` for job files without a uuid
    pub fn with_identity_generator(mut self, ids: IdentityGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// The submitter
    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// The graph builder
    pub fn builder(&self) -> &TaskGraphBuilder<L> {
        &self.builder
    }

    /// Generator for job ids
    pub fn identity_generator(&self) -> &IdentityGenerator {
        &self.ids
    }

    /// Parse and spool a job file
    pub fn spool_file(&mut self, path: &Path) -> Result<SpoolOutcome> {
        tracing::info!("Loading job file: {}", path.display());
        let spec = JobSpec::from_file_with(path, &self.ids)?;
        self.spool(spec)
    }

    /// Build, audit and submit a parsed job
    pub fn spool(&mut self, spec: JobSpec) -> Result<SpoolOutcome> {
        let graph = self.builder.build(&spec)?;

        let mut audit = match &self.audit_dir {
            Some(dir) => {
                let record = AuditRecord::new(spec, graph.clone(), self.builder.settings().owner.clone());
                let path = record.save(dir)?;
                tracing::debug!("Wrote audit copy {}", path.display());
                Some((dir, record))
            }
            None => None,
        };

        let handle = self.submitter.submit(&graph)?;

        if let Some((dir, record)) = audit.as_mut() {
            record.job_id = Some(handle.id);
            if let Err(e) = record.save(dir.as_path()) {
                tracing::warn!("Job {} submitted but audit copy not updated: {}", handle.id, e);
            }
        }

        Ok(SpoolOutcome {
            job_id: handle.id,
            uuid: graph.uuid,
            name: graph.name,
        })
    }
}
