//! Job files and the typed job description
//!
//! A job file is plain text with one `key = value` pair per line. A `#` starts
//! a comment that runs to the end of the line; blank lines and lines without
//! `=` are skipped. Keys the spooler does not know are kept and written back
//! out unchanged.
//!
//! Parsing is permissive: a job file missing `renderer`, `scene` or `output`
//! still parses, and the gap is reported when the task graph is built. Values
//! that are present but malformed (a non-numeric frame, an unknown renderer)
//! fail the parse immediately.

use super::identity::IdentityGenerator;
use super::renderer::Renderer;
use crate::error::{IoResultExt, Result, SpoolError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Frame step used when the job file does not set one
pub const DEFAULT_STEP: i64 = 1;

/// Render threads used when the job file does not set them
pub const DEFAULT_THREADS: u32 = 4;

/// Typed job description
///
/// Built once per submission attempt and never mutated afterwards. Whenever
/// both frame bounds are known, `frame_start <= frame_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    uuid: String,
    renderer: Option<Renderer>,
    name: Option<String>,
    project: Option<String>,
    scene: Option<String>,
    output: Option<String>,
    logs: Option<String>,
    frame_start: Option<i64>,
    frame_end: Option<i64>,
    frame_step: i64,
    threads: u32,
    net_share: Option<String>,
    net_drive: Option<String>,
    extra: BTreeMap<String, String>,
}

impl JobSpec {
    /// Empty job description with the given identity
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            renderer: None,
            name: None,
            project: None,
            scene: None,
            output: None,
            logs: None,
            frame_start: None,
            frame_end: None,
            frame_step: DEFAULT_STEP,
            threads: DEFAULT_THREADS,
            net_share: None,
            net_drive: None,
            extra: BTreeMap::new(),
        }
    }

    /// Parse a job file body, generating a uuid from the system clock if absent
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with(source, &IdentityGenerator::new())
    }

    /// Parse a job file body, generating a uuid from `ids` if absent
    pub fn parse_with(source: &str, ids: &IdentityGenerator) -> Result<Self> {
        let mut spec = Self::new(String::new());

        for (key, value) in pairs(source) {
            spec.set(key, value)?;
        }

        if spec.uuid.is_empty() {
            spec.uuid = ids.new_id();
        }
        spec.normalize_frames();

        for (key, value) in spec.fields() {
            tracing::debug!("{} = {}", key, value);
        }

        Ok(spec)
    }

    /// Read and parse a job file
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with(path, &IdentityGenerator::new())
    }

    /// Read and parse a job file with an explicit identity source
    pub fn from_file_with(path: &Path, ids: &IdentityGenerator) -> Result<Self> {
        if !path.is_file() {
            return Err(SpoolError::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).with_path(path)?;
        Self::parse_with(&content, ids)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let text = (!value.is_empty()).then(|| value.to_string());

        match key {
            "uuid" => self.uuid = value.to_string(),
            "renderer" => {
                self.renderer = if value.is_empty() {
                    None
                } else {
                    Some(value.parse()?)
                }
            }
            "name" | "title" => self.name = text,
            "project" => self.project = text,
            "scene" => self.scene = text,
            "output" => self.output = text,
            "logs" => self.logs = text,
            "start" | "frame_start" => self.frame_start = parse_opt_int(key, value)?,
            "end" | "frame_end" => self.frame_end = parse_opt_int(key, value)?,
            "step" | "frame_step" => {
                self.frame_step = parse_opt_int(key, value)?.unwrap_or(DEFAULT_STEP)
            }
            "threads" => {
                self.threads = match value {
                    "" => DEFAULT_THREADS,
                    v => v
                        .parse()
                        .map_err(|_| SpoolError::parse(key, format!("'{}' is not a thread count", v)))?,
                }
            }
            "net_share" => self.net_share = text,
            "net_drive" => self.net_drive = text,
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    fn normalize_frames(&mut self) {
        if let (Some(a), Some(b)) = (self.frame_start, self.frame_end) {
            self.frame_start = Some(a.min(b));
            self.frame_end = Some(a.max(b));
        }
    }

    /// Set fields in job file order, as `(key, value)` pairs
    pub fn fields(&self) -> Vec<(&str, String)> {
        let mut out: Vec<(&str, String)> = Vec::new();
        let mut push = |k: &'static str, v: Option<String>| {
            if let Some(v) = v {
                out.push((k, v));
            }
        };

        push("renderer", self.renderer.map(|r| r.to_string()));
        push("name", self.name.clone());
        push("project", self.project.clone());
        push("output", self.output.clone());
        push("scene", self.scene.clone());
        push("logs", self.logs.clone());
        push("start", self.frame_start.map(|v| v.to_string()));
        push("end", self.frame_end.map(|v| v.to_string()));
        push("threads", Some(self.threads.to_string()));
        push("step", Some(self.frame_step.to_string()));
        push("uuid", Some(self.uuid.clone()));
        push("net_drive", self.net_drive.clone());
        push("net_share", self.net_share.clone());

        out.extend(self.extra.iter().map(|(k, v)| (k.as_str(), v.clone())));
        out
    }

    /// Serialize to the job file format
    ///
    /// Fails with a `Parse` error naming the key when a key or value would not
    /// read back unchanged: a `#`, a line break, surrounding whitespace, or an
    /// empty value for a typed field.
    pub fn to_config_string(&self) -> Result<String> {
        let mut out = String::new();
        for (key, value) in self.fields() {
            let unknown = self.extra.contains_key(key);
            if unknown {
                check_key(key)?;
            }
            check_value(key, &value, unknown)?;
            let _ = writeln!(out, "{} = {}", key, value);
        }
        Ok(format!("# Job {} written by hpc-spool {}\n{}", self.uuid, crate::VERSION, out))
    }

    /// Write the job file to `<dir>/<uuid>_<scene_name>.ini`, creating `dir`
    pub fn write_job_file(&self, dir: &Path, scene_name: &str) -> Result<PathBuf> {
        let body = self.to_config_string()?;
        std::fs::create_dir_all(dir).with_path(dir)?;
        let path = dir.join(format!("{}_{}.ini", self.uuid, scene_name));
        std::fs::write(&path, body).with_path(&path)?;
        tracing::debug!("Wrote job file {:?}", path);
        Ok(path)
    }

    // Builder-style setters used by front-ends

    /// Set the renderer
    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the project path
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the scene path
    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }

    /// Set the output destination
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the log destination
    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }

    /// Set the frame range; bounds may be given in either order
    pub fn with_frames(mut self, start: i64, end: i64) -> Self {
        self.frame_start = Some(start);
        self.frame_end = Some(end);
        self.normalize_frames();
        self
    }

    /// Set the frame step
    pub fn with_step(mut self, step: i64) -> Self {
        self.frame_step = step;
        self
    }

    /// Set the render thread count
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Set the network share and the drive it is mapped to on the nodes
    pub fn with_network(mut self, net_share: impl Into<String>, net_drive: impl Into<String>) -> Self {
        self.net_share = Some(net_share.into());
        self.net_drive = Some(net_drive.into());
        self
    }

    /// Store an additional key
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    // Accessors

    /// Job id
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Renderer, if set
    pub fn renderer(&self) -> Option<Renderer> {
        self.renderer
    }

    /// Display name, if set
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Project path, if set
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Scene path, if set
    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    /// Output destination, if set
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Log destination, if set
    pub fn logs(&self) -> Option<&str> {
        self.logs.as_deref()
    }

    /// First frame, if set
    pub fn frame_start(&self) -> Option<i64> {
        self.frame_start
    }

    /// Last frame, if set
    pub fn frame_end(&self) -> Option<i64> {
        self.frame_end
    }

    /// Frame step as written; validated when the graph is built
    pub fn frame_step(&self) -> i64 {
        self.frame_step
    }

    /// Requested render threads
    pub fn threads(&self) -> u32 {
        self.threads
    }

    /// Network share, if set
    pub fn net_share(&self) -> Option<&str> {
        self.net_share.as_deref()
    }

    /// Node drive mapping, if set
    pub fn net_drive(&self) -> Option<&str> {
        self.net_drive.as_deref()
    }

    /// Keys the spooler does not interpret
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    // Lazily validated fields

    /// Renderer, or `MissingField`
    pub fn require_renderer(&self) -> Result<Renderer> {
        self.renderer.ok_or(SpoolError::MissingField("renderer"))
    }

    /// Non-empty display name, or `MissingField`
    pub fn require_name(&self) -> Result<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or(SpoolError::MissingField("name"))
    }

    /// Scene path, or `MissingField`
    pub fn require_scene(&self) -> Result<&str> {
        self.scene().ok_or(SpoolError::MissingField("scene"))
    }

    /// Output destination, or `MissingField`
    pub fn require_output(&self) -> Result<&str> {
        self.output().ok_or(SpoolError::MissingField("output"))
    }

    /// Normalized `(start, end)` frame range, or `MissingField`
    pub fn require_frames(&self) -> Result<(i64, i64)> {
        let start = self.frame_start.ok_or(SpoolError::MissingField("start"))?;
        let end = self.frame_end.ok_or(SpoolError::MissingField("end"))?;
        Ok((start.min(end), start.max(end)))
    }
}

/// Split a job file body into trimmed `(key, value)` pairs
fn pairs(source: &str) -> impl Iterator<Item = (&str, &str)> {
    source.lines().filter_map(|line| {
        let line = line.split('#').next().unwrap_or_default().trim();
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        (!key.is_empty()).then(|| (key, value.trim()))
    })
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key != key.trim() || key.contains(['=', '#', '\r', '\n']) {
        return Err(SpoolError::parse(
            key,
            "keys must be non-empty and free of '=', '#', line breaks and surrounding whitespace",
        ));
    }
    Ok(())
}

fn check_value(key: &str, value: &str, allow_empty: bool) -> Result<()> {
    let problem = if value.contains('#') {
        "contains '#', which starts a comment"
    } else if value.contains(['\r', '\n']) {
        "contains a line break"
    } else if value != value.trim() {
        "has leading or trailing whitespace"
    } else if value.is_empty() && !allow_empty {
        "is empty"
    } else {
        return Ok(());
    };
    Err(SpoolError::parse(key, format!("'{}' {}", value.escape_debug(), problem)))
}

fn parse_opt_int(key: &str, value: &str) -> Result<Option<i64>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| SpoolError::parse(key, format!("'{}' is not an integer", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FixedClock;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    const SAMPLE: &str = r"
# Created for artist on 2024-01-02 by rrt
renderer = maya_render_sw
name = Shot010
project = S:\projects\shot010
output = \\fs01\output\artist\20240102030405
scene = S:\projects\shot010\scenes\shot010.mb
logs = \\fs01\logs\artist\20240102030405\Shot010.*.txt
start = 42
end = 10
threads = 8   # eight cores per frame
step = 2
uuid = 20240102030405
net_drive = S:
net_share = \\fs01\projects
";

    fn fixed_ids() -> IdentityGenerator {
        let at = NaiveDate::from_ymd_opt(2025, 6, 7)
            .unwrap()
            .and_hms_opt(8, 9, 10)
            .unwrap();
        IdentityGenerator::with_clock(FixedClock(at))
    }

    #[test]
    fn test_parse_sample() {
        let spec = JobSpec::parse(SAMPLE).unwrap();
        assert_eq!(spec.renderer(), Some(Renderer::MayaRenderSw));
        assert_eq!(spec.name(), Some("Shot010"));
        assert_eq!(spec.threads(), 8);
        assert_eq!(spec.frame_step(), 2);
        assert_eq!(spec.uuid(), "20240102030405");
        assert_eq!(spec.net_share(), Some(r"\\fs01\projects"));
        assert_eq!(spec.net_drive(), Some("S:"));
    }

    #[test]
    fn test_reversed_frames_are_normalized() {
        let spec = JobSpec::parse(SAMPLE).unwrap();
        assert_eq!(spec.frame_start(), Some(10));
        assert_eq!(spec.frame_end(), Some(42));
        assert_eq!(spec.require_frames().unwrap(), (10, 42));
    }

    #[test]
    fn test_comments_blank_and_bare_lines_ignored() {
        let spec = JobSpec::parse_with(
            "\n   \n# whole line comment\njust some words\nname = A # trailing\n=orphan\n",
            &fixed_ids(),
        )
        .unwrap();
        assert_eq!(spec.name(), Some("A"));
        assert!(spec.extra().is_empty());
    }

    #[test]
    fn test_missing_uuid_uses_generator() {
        let spec = JobSpec::parse_with("name = A", &fixed_ids()).unwrap();
        assert_eq!(spec.uuid(), "20250607080910");
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let spec = JobSpec::parse_with("pool = gpu\nname = A", &fixed_ids()).unwrap();
        assert_eq!(spec.extra().get("pool").map(String::as_str), Some("gpu"));
    }

    #[test]
    fn test_bad_integer_names_key() {
        match JobSpec::parse_with("start = one", &fixed_ids()) {
            Err(SpoolError::Parse { key, .. }) => assert_eq!(key, "start"),
            other => panic!("unexpected {:?}", other),
        }
        match JobSpec::parse_with("threads = -2", &fixed_ids()) {
            Err(SpoolError::Parse { key, .. }) => assert_eq!(key, "threads"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_renderer_fails_parse() {
        assert!(matches!(
            JobSpec::parse_with("renderer = povray", &fixed_ids()),
            Err(SpoolError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_required_keys_are_lazy() {
        let spec = JobSpec::parse_with("name = partial", &fixed_ids()).unwrap();
        assert!(matches!(spec.require_renderer(), Err(SpoolError::MissingField("renderer"))));
        assert!(matches!(spec.require_scene(), Err(SpoolError::MissingField("scene"))));
        assert!(matches!(spec.require_output(), Err(SpoolError::MissingField("output"))));
        assert!(matches!(spec.require_frames(), Err(SpoolError::MissingField("start"))));
    }

    #[test]
    fn test_defaults() {
        let spec = JobSpec::parse_with("", &fixed_ids()).unwrap();
        assert_eq!(spec.frame_step(), DEFAULT_STEP);
        assert_eq!(spec.threads(), DEFAULT_THREADS);
        assert!(matches!(spec.require_name(), Err(SpoolError::MissingField("name"))));
    }

    #[test]
    fn test_aliases() {
        let spec = JobSpec::parse_with(
            "title = Alias\nframe_start = 5\nframe_end = 1\nframe_step = 3",
            &fixed_ids(),
        )
        .unwrap();
        assert_eq!(spec.name(), Some("Alias"));
        assert_eq!(spec.require_frames().unwrap(), (1, 5));
        assert_eq!(spec.frame_step(), 3);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let spec = JobSpec::parse_with("output = X:\\a=b", &fixed_ids()).unwrap();
        assert_eq!(spec.output(), Some("X:\\a=b"));
    }

    #[test]
    fn test_round_trip() {
        let spec = JobSpec::parse(SAMPLE).unwrap().with_extra("pool", "gpu");
        let text = spec.to_config_string().unwrap();
        let again = JobSpec::parse_with(&text, &fixed_ids()).unwrap();
        assert_eq!(spec, again);
        assert_eq!(again.uuid(), "20240102030405");
    }

    #[test]
    fn test_round_trip_keeps_empty_unknown_value() {
        let spec = JobSpec::new("7").with_name("A").with_extra("pool", "");
        let again = JobSpec::parse_with(&spec.to_config_string().unwrap(), &fixed_ids()).unwrap();
        assert_eq!(again, spec);
    }

    fn rejected_key(spec: &JobSpec) -> String {
        match spec.to_config_string() {
            Err(SpoolError::Parse { key, .. }) => key,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_values_that_would_not_read_back_are_rejected() {
        let base = || JobSpec::new("20240102030405").with_name("A");

        assert_eq!(rejected_key(&base().with_output(r"\\fs01\out\take#2")), "output");
        assert_eq!(rejected_key(&base().with_name("a\nrenderer = max")), "name");
        assert_eq!(rejected_key(&base().with_logs("x\r")), "logs");
        assert_eq!(rejected_key(&base().with_scene(" S:\\a.mb")), "scene");
        assert_eq!(rejected_key(&base().with_project("S:\\proj\t")), "project");
        assert_eq!(rejected_key(&base().with_name("")), "name");
        assert_eq!(rejected_key(&base().with_extra("pool", "gpu # fast")), "pool");
        assert_eq!(rejected_key(&base().with_extra("a=b", "1")), "a=b");
        assert_eq!(rejected_key(&base().with_extra("", "1")), "");
    }

    #[test]
    fn test_rejected_job_file_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        let spec = JobSpec::new("1").with_output(r"\\fs01\renders#A");

        assert!(matches!(
            spec.write_job_file(&scripts, "shot"),
            Err(SpoolError::Parse { .. })
        ));
        assert!(!scripts.exists());
    }

    #[test]
    fn test_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ini");
        match JobSpec::from_file(&missing) {
            Err(SpoolError::ConfigNotFound(p)) => assert_eq!(p, missing),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_write_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("hpc").join("artist").join("scripts");
        let spec = JobSpec::new("20240102030405").with_name("A").with_frames(1, 3);

        let path = spec.write_job_file(&scripts, "shot010").unwrap();
        assert_eq!(path.file_name().unwrap(), "20240102030405_shot010.ini");

        let read_back = JobSpec::from_file_with(&path, &fixed_ids()).unwrap();
        assert_eq!(read_back, spec);
    }

    proptest! {
        #[test]
        fn prop_frames_always_ordered(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            let text = format!("start = {}\nend = {}", a, b);
            let spec = JobSpec::parse_with(&text, &fixed_ids()).unwrap();
            let (start, end) = spec.require_frames().unwrap();
            prop_assert!(start <= end);
            prop_assert_eq!(start, a.min(b));
            prop_assert_eq!(end, a.max(b));
        }
    }
}
